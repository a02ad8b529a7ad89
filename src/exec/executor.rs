use std::sync::{Arc, Condvar, Mutex, PoisonError};

use crate::compile::builder::GraphBuilder;
use crate::exec::buffer::FrameRGBA;
use crate::exec::context::{ExecuteOpts, ExecutionContext};
use crate::exec::model::{ExecutionModel, FullFrameExecutionModel, TiledExecutionModel};
use crate::exec::operation::{ExecutionGroup, Operation};
use crate::exec::scheduler::{WorkPackage, WorkScheduler};
use crate::foundation::core::Region;
use crate::foundation::error::TesseraResult;
use crate::scene::cancel::CancelToken;
use crate::scene::model::{ExecutionModelKind, GraphDescription};

/// Count of finished sub-tasks for one split call, plus the condition the
/// calling thread blocks on. A fresh instance is allocated per call, so no
/// state leaks across calls.
struct CompletionState {
    expected: usize,
    finished: Mutex<usize>,
    all_finished: Condvar,
}

impl CompletionState {
    fn new(expected: usize) -> Self {
        Self {
            expected,
            finished: Mutex::new(0),
            all_finished: Condvar::new(),
        }
    }

    fn mark_finished(&self) {
        let mut finished = self
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *finished += 1;
        if *finished == self.expected {
            self.all_finished.notify_one();
        }
    }

    fn wait_all_finished(&self) {
        let mut finished = self
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *finished < self.expected {
            finished = self
                .all_finished
                .wait(finished)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Split `region` into at most `capacity` row bands, taller bands first.
///
/// The bands tile `region` contiguously from `y_min` up, with no gaps,
/// overlaps, or empty members. An empty region (either axis) yields no bands.
fn split_rows(region: Region, capacity: usize) -> Vec<Region> {
    if region.is_empty() {
        return Vec::new();
    }
    let height = region.height() as usize;
    let num_sub_works = capacity.min(height);
    if num_sub_works == 0 {
        return Vec::new();
    }
    let split_height = height / num_sub_works;
    let mut remaining_rows = height - split_height * num_sub_works;

    let mut out = Vec::with_capacity(num_sub_works);
    let mut y = region.y_min;
    for _ in 0..num_sub_works {
        let mut band_height = split_height;
        if remaining_rows > 0 {
            band_height += 1;
            remaining_rows -= 1;
        }
        out.push(Region::new(
            region.x_min,
            region.x_max,
            y,
            y + band_height as i32,
        ));
        y += band_height as i32;
    }
    debug_assert_eq!(y, region.y_max);
    out
}

/// Orchestrates execution of one compiled compositing graph.
///
/// The executor owns the compiled operations and execution groups for its
/// lifetime, selects the execution model once at construction, and provides
/// the parallel split-and-join primitive ([`Executor::execute_work`]) that
/// models drive all region work through.
pub struct Executor {
    context: Arc<ExecutionContext>,
    operations: Vec<Arc<dyn Operation>>,
    groups: Vec<ExecutionGroup>,
    model: Box<dyn ExecutionModel>,
    scheduler: Arc<dyn WorkScheduler>,
    worker_capacity: usize,
}

impl Executor {
    /// Construct an executor for `graph`.
    ///
    /// Compiles the description, selects the execution model named by the
    /// description's selector, and caches the scheduler's worker capacity
    /// for split sizing. Fails on invalid descriptions; never on anything
    /// the graph does at run time.
    pub fn new(
        graph: Arc<GraphDescription>,
        opts: ExecuteOpts,
        cancel: CancelToken,
        scheduler: Arc<dyn WorkScheduler>,
    ) -> TesseraResult<Self> {
        let accelerated = scheduler.has_accelerated_devices() && graph.use_accelerated;
        let context = Arc::new(ExecutionContext::new(
            Arc::clone(&graph),
            opts,
            cancel,
            accelerated,
        ));

        let (operations, groups) = GraphBuilder::new(&context).build()?;

        let model: Box<dyn ExecutionModel> = match graph.execution_model {
            ExecutionModelKind::Tiled => Box::new(TiledExecutionModel),
            ExecutionModelKind::FullFrame => Box::new(FullFrameExecutionModel),
        };

        let worker_capacity = scheduler.capacity().max(1);
        Ok(Self {
            context,
            operations,
            groups,
            model,
            scheduler,
            worker_capacity,
        })
    }

    #[tracing::instrument(skip(self))]
    /// Run the graph to completion (or until cancellation) and return the
    /// frame.
    ///
    /// Establishes every operation's derived state exactly once, then
    /// delegates to the selected execution model. The call is synchronous:
    /// it returns only after the whole graph has produced its output or
    /// cancellation unwound all in-flight work. A cancelled run returns `Ok`
    /// with whatever pixels were produced.
    pub fn execute(&mut self) -> TesseraResult<FrameRGBA> {
        for op in &mut self.operations {
            let op =
                Arc::get_mut(op).expect("operations are uniquely owned before execution starts");
            op.init_data(&self.context);
        }

        tracing::debug!(
            operations = self.operations.len(),
            groups = self.groups.len(),
            view = self.context.view_name(),
            "execution started"
        );

        let this: &Executor = self;
        this.model.execute(this)
    }

    /// Process `work_rect` by splitting it row-wise across the worker pool,
    /// calling `work_fn` once per sub-region, and returning only after every
    /// sub-region has been observed complete.
    ///
    /// Returns immediately, without invoking `work_fn`, when cancellation is
    /// already signaled or the region is empty. Sub-regions may run in any
    /// interleaving; each payload re-checks cancellation before invoking
    /// `work_fn`, since an abort may arrive between submission and execution
    /// on a worker thread. Skipped payloads still count completion, so this
    /// call never blocks on cancelled work.
    pub fn execute_work<F>(&self, work_rect: Region, work_fn: F)
    where
        F: Fn(Region) + Send + Sync + 'static,
    {
        if self.is_cancelled() {
            return;
        }

        // Split along rows to keep each sub-task's pixel accesses contiguous.
        let splits = split_rows(work_rect, self.worker_capacity);
        if splits.is_empty() {
            return;
        }

        let num_sub_works = splits.len();
        tracing::trace!(?work_rect, num_sub_works, "splitting work region");

        let state = Arc::new(CompletionState::new(num_sub_works));
        let work_fn = Arc::new(work_fn);
        for split_rect in splits {
            let cancel = self.context.cancel().clone();
            let work_fn = Arc::clone(&work_fn);
            let on_finished = Arc::clone(&state);
            self.scheduler.submit(WorkPackage::custom_function(
                move || {
                    if cancel.is_cancelled() {
                        return;
                    }
                    work_fn(split_rect);
                },
                move || on_finished.mark_finished(),
            ));
        }

        self.scheduler.drain();

        // drain() is only a hint; the completion count is authoritative.
        state.wait_all_finished();
    }

    /// Whether an abort has been requested for this execution.
    pub fn is_cancelled(&self) -> bool {
        self.context.cancel().is_cancelled()
    }

    /// The immutable execution configuration.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// The execution configuration as a shareable handle, for worker
    /// closures.
    pub fn shared_context(&self) -> Arc<ExecutionContext> {
        Arc::clone(&self.context)
    }

    /// Compiled operations in topological order.
    pub fn operations(&self) -> &[Arc<dyn Operation>] {
        &self.operations
    }

    /// Execution groups, one per output node.
    pub fn groups(&self) -> &[ExecutionGroup] {
        &self.groups
    }
}
