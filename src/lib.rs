//! Tessera is a compositing-graph execution engine.
//!
//! Tessera turns a declarative graph description ([`GraphDescription`]) into
//! pixels ([`FrameRGBA`]) by compiling the description into operations and
//! execution groups, then walking them with one of two execution models.
//!
//! # Pipeline overview
//!
//! 1. **Compile**: `GraphDescription + ExecutionContext -> (operations, groups)`
//! 2. **Select**: the description picks the `Tiled` or `FullFrame` model once,
//!    at construction
//! 3. **Execute**: the model walks the graph, splitting every work region
//!    row-wise across a bounded worker pool and joining on completion
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Cooperative cancellation**: an abort request never interrupts in-flight
//!   sub-tasks; it only keeps not-yet-started payloads from running, and a
//!   cancelled run is indistinguishable from finishing with less output.
//! - **Exactly-once completion counting**: the split primitive
//!   ([`Executor::execute_work`]) returns only after every sub-region has been
//!   observed complete, whatever the scheduler backend does.
//! - **Premultiplied RGBA8** end-to-end: operations produce premultiplied
//!   pixels.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod compile;
mod exec;
mod foundation;
mod scene;

pub use compile::builder::GraphBuilder;
pub use exec::buffer::{FrameRGBA, RegionBuffer, premultiply_rgba8};
pub use exec::context::{ExecuteOpts, ExecutionContext};
pub use exec::executor::Executor;
pub use exec::model::{ExecutionModel, FullFrameExecutionModel, TiledExecutionModel};
pub use exec::operation::{ExecutionGroup, GroupId, Operation, OperationId, OperationInputs};
pub use exec::ops::{
    ColorFillOperation, GradientOperation, InvertOperation, MixOperation, OpacityOperation,
    OutputOperation,
};
pub use exec::scheduler::{
    InlineScheduler, ThreadPoolScheduler, WorkPackage, WorkPayload, WorkScheduler,
};
pub use foundation::core::{Canvas, Quality, Region};
pub use foundation::error::{TesseraError, TesseraResult};
pub use scene::cancel::CancelToken;
pub use scene::model::{
    BlendMode, ColorDisplaySettings, ColorViewSettings, ExecutionModelKind, GraphDescription,
    NodeDef, NodeKindDef,
};
