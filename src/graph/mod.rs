//! Frame graph infrastructure.
//!
//! A frame graph is rebuilt (or fetched from the cache) every frame: the
//! caller declares resources and passes through a [`GraphBuilder`], and the
//! compiler automatically handles:
//!
//! - Dead pass and resource culling from essential outputs
//! - Deterministic pass ordering via topological sort
//! - Subpass merging of independent same-target graphics passes
//! - Barrier, layout transition and queue ownership transfer synthesis
//! - Per-queue submission batching with inter-queue semaphores
//!
//! The pipeline runs in fixed stages, each in its own module:
//!
//! | Stage | Module | Purpose |
//! |-------|--------|---------|
//! | Build | [`builder`] | Record declarations, validate usage |
//! | Analyze | `analyze` | Cull, detect cycles, order passes |
//! | Group | `group` | Merge eligible passes into subpass groups |
//! | Synthesize | [`barrier`] | Barriers, queue transfers, lifetimes |
//! | Batch | [`batch`] | Per-queue submission batches |
//!
//! The output is an immutable [`FrameGraph`] that the
//! [executor](crate::executor) can submit any number of times.

pub(crate) mod analyze;
pub mod barrier;
pub mod batch;
pub mod builder;
pub mod cache;
pub mod compiled;
pub(crate) mod group;
pub mod pass;
pub(crate) mod registry;
pub mod resource;

pub use barrier::{
    AccessMask, BarrierSet, CrossQueueDependency, ImageLayout, ResourceBarrier,
};
pub use batch::SubmissionBatch;
pub use builder::GraphBuilder;
pub use cache::{CacheKey, GraphCache};
pub use compiled::{FrameGraph, GraphResult};
pub use group::PassGroup;
pub use pass::{PassKind, PassTask, PassTaskFn};
pub use resource::{
    FrameProvider, ImportedResource, ResourceHandle, ResourceKind, ResourceStage,
};
