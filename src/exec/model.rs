use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::exec::buffer::{FrameRGBA, RegionBuffer};
use crate::exec::context::ExecutionContext;
use crate::exec::executor::Executor;
use crate::exec::operation::{ExecutionGroup, Operation, OperationId};
use crate::foundation::core::Region;
use crate::foundation::error::TesseraResult;

/// Strategy governing how the compiled graph is walked.
///
/// The executor selects exactly one model at construction and never switches
/// mid-run. Models drive all region work through
/// [`Executor::execute_work`] and hold no per-run state of their own.
pub trait ExecutionModel: Send + Sync {
    /// Walk the graph and produce the final frame.
    ///
    /// Returns whatever pixels were produced when cancellation cuts the run
    /// short; a cancelled run is not an error.
    fn execute(&self, exec: &Executor) -> TesseraResult<FrameRGBA>;
}

type SharedTiles = Arc<Mutex<Vec<RegionBuffer>>>;

fn push_tile(sink: &SharedTiles, tile: RegionBuffer) {
    sink.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(tile);
}

fn drain_tiles(sink: SharedTiles) -> Vec<RegionBuffer> {
    // After execute_work returns every worker closure is gone, so the sink is
    // normally uniquely owned again; the fallback covers schedulers that kept
    // a package alive without running it.
    match Arc::try_unwrap(sink) {
        Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
        Err(shared) => shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone(),
    }
}

/// Buffer cache shared across execution groups, keyed by operation and
/// region. Lets a later group reuse tiles an earlier group already computed.
#[derive(Default)]
struct RegionCache {
    entries: Mutex<HashMap<(OperationId, Region), Arc<RegionBuffer>>>,
}

impl RegionCache {
    fn get(&self, op: OperationId, region: Region) -> Option<Arc<RegionBuffer>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(op, region))
            .cloned()
    }

    fn insert(&self, op: OperationId, region: Region, buffer: Arc<RegionBuffer>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((op, region), buffer);
    }
}

/// Evaluate one group's operations for `region`, inputs before consumers.
fn evaluate_group_region(
    ctx: &ExecutionContext,
    operations: &[Arc<dyn Operation>],
    group: &ExecutionGroup,
    region: Region,
    cache: Option<&RegionCache>,
) -> RegionBuffer {
    let mut local: HashMap<OperationId, Arc<RegionBuffer>> = HashMap::new();
    for &op_id in &group.operations {
        if let Some(cache) = cache
            && let Some(hit) = cache.get(op_id, region)
        {
            local.insert(op_id, hit);
            continue;
        }

        let op = &operations[op_id.0 as usize];
        let input_buffers: Vec<Arc<RegionBuffer>> = op
            .inputs()
            .iter()
            .filter_map(|input| local.get(input).cloned())
            .collect();
        debug_assert_eq!(
            input_buffers.len(),
            op.inputs().len(),
            "group members must include every transitive input"
        );
        let input_refs: Vec<&RegionBuffer> = input_buffers.iter().map(Arc::as_ref).collect();

        let out = Arc::new(op.evaluate(ctx, region, &input_refs));
        if let Some(cache) = cache {
            cache.insert(op_id, region, Arc::clone(&out));
        }
        local.insert(op_id, out);
    }

    match local.remove(&group.output) {
        Some(out) => Arc::try_unwrap(out).unwrap_or_else(|shared| (*shared).clone()),
        None => RegionBuffer::new(region),
    }
}

/// Walks the graph group by group, tile by tile.
///
/// Each group's output area is split through the executor's parallel
/// primitive; a sub-task evaluates the whole group for its tile. Tiles
/// already computed for an earlier group are reused through a cache shared
/// across groups.
pub struct TiledExecutionModel;

impl ExecutionModel for TiledExecutionModel {
    fn execute(&self, exec: &Executor) -> TesseraResult<FrameRGBA> {
        let canvas = exec.context().graph().canvas;
        let full = Region::of_canvas(canvas);
        let cache = Arc::new(RegionCache::default());

        let mut final_tiles = None;
        for group in exec.groups() {
            let tiles: SharedTiles = Arc::new(Mutex::new(Vec::new()));

            let ctx = exec.shared_context();
            let operations = exec.operations().to_vec();
            let group = group.clone();
            let cache = Arc::clone(&cache);
            let sink = Arc::clone(&tiles);
            exec.execute_work(full, move |tile| {
                let out = evaluate_group_region(&ctx, &operations, &group, tile, Some(&cache));
                push_tile(&sink, out);
            });

            final_tiles = Some(tiles);
        }

        let mut frame = RegionBuffer::new(full);
        if let Some(tiles) = final_tiles {
            for tile in drain_tiles(tiles) {
                frame.blit_from(&tile);
            }
        }
        Ok(frame.into_frame(canvas))
    }
}

/// Walks every operation over the whole frame.
///
/// Operations run in topological order against a shared active-buffer set of
/// full-frame buffers; each operation's buffer is still produced tile by tile
/// through the executor's parallel primitive. Input buffers are released as
/// soon as their last consumer has run.
pub struct FullFrameExecutionModel;

impl ExecutionModel for FullFrameExecutionModel {
    fn execute(&self, exec: &Executor) -> TesseraResult<FrameRGBA> {
        let canvas = exec.context().graph().canvas;
        let full = Region::of_canvas(canvas);
        let operations = exec.operations();

        let mut remaining_uses = vec![0usize; operations.len()];
        for op in operations {
            for input in op.inputs() {
                remaining_uses[input.0 as usize] += 1;
            }
        }

        let mut active: HashMap<OperationId, Arc<RegionBuffer>> = HashMap::new();
        let mut final_buffer: Option<Arc<RegionBuffer>> = None;

        for (index, op) in operations.iter().enumerate() {
            let op_id = OperationId(index as u32);
            let input_buffers: Vec<Arc<RegionBuffer>> = op
                .inputs()
                .iter()
                .filter_map(|input| active.get(input).cloned())
                .collect();
            debug_assert_eq!(
                input_buffers.len(),
                op.inputs().len(),
                "active buffers must cover every input of the next operation"
            );

            let tiles: SharedTiles = Arc::new(Mutex::new(Vec::new()));
            {
                let ctx = exec.shared_context();
                let op = Arc::clone(op);
                let inputs = input_buffers.clone();
                let sink = Arc::clone(&tiles);
                exec.execute_work(full, move |tile| {
                    let input_refs: Vec<&RegionBuffer> =
                        inputs.iter().map(Arc::as_ref).collect();
                    push_tile(&sink, op.evaluate(&ctx, tile, &input_refs));
                });
            }

            let mut whole = RegionBuffer::new(full);
            for tile in drain_tiles(tiles) {
                whole.blit_from(&tile);
            }
            let whole = Arc::new(whole);

            for input in op.inputs() {
                let uses = &mut remaining_uses[input.0 as usize];
                *uses = uses.saturating_sub(1);
                if *uses == 0 {
                    active.remove(input);
                }
            }
            if op.is_output() {
                final_buffer = Some(Arc::clone(&whole));
            }
            active.insert(op_id, whole);
        }

        let frame = match final_buffer {
            Some(buffer) => (*buffer).clone(),
            None => RegionBuffer::new(full),
        };
        Ok(frame.into_frame(canvas))
    }
}
