use smallvec::SmallVec;

use crate::exec::buffer::RegionBuffer;
use crate::exec::context::ExecutionContext;
use crate::foundation::core::Region;

/// Identifier of a compiled operation within one executor.
///
/// Ids index the executor's operation collection; groups reference operations
/// by id, never by ownership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub u32);

/// Identifier of an execution group within one executor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(pub u32);

/// Input list of a compiled operation. Most operations have zero, one, or two
/// inputs, so the list stays inline.
pub type OperationInputs = SmallVec<[OperationId; 2]>;

/// A single compiled unit of graph computation.
///
/// Operations are owned by the executor from the moment the builder returns
/// them until executor teardown. After [`Operation::init_data`] they are only
/// used through `&self`, possibly from several worker threads at once.
pub trait Operation: Send + Sync {
    /// Stable kind name used in logs.
    fn name(&self) -> &str;

    /// Establish per-run derived state. Called exactly once, before any
    /// region work, never concurrently with anything.
    fn init_data(&mut self, _ctx: &ExecutionContext) {}

    /// Operations feeding this one, in input-socket order.
    fn inputs(&self) -> &[OperationId];

    /// Whether this operation is a sink whose pixels become final output.
    fn is_output(&self) -> bool {
        false
    }

    /// Produce pixels for `region`.
    ///
    /// `inputs` lines up with [`Operation::inputs`] and every entry covers at
    /// least `region`. Evaluation is pure pixel work and cannot fail.
    fn evaluate(
        &self,
        ctx: &ExecutionContext,
        region: Region,
        inputs: &[&RegionBuffer],
    ) -> RegionBuffer;
}

/// A grouping of operations sharing an execution granularity.
///
/// Groups are formed per output node and list the output's transitive inputs
/// in topological order, output last.
#[derive(Clone, Debug)]
pub struct ExecutionGroup {
    /// Group identifier.
    pub id: GroupId,
    /// Member operations in topological order.
    pub operations: Vec<OperationId>,
    /// The sink operation whose pixels the group produces.
    pub output: OperationId,
}
