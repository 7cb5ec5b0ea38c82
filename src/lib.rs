//! # Frame Graph Engine
//!
//! A frame graph compiler and submission scheduler built around an explicit
//! device object.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphBuilder`] - Declarative per-frame description of passes, resources
//!   and their connections
//! - [`FrameGraph`] - The compiled, cacheable schedule: culled, ordered,
//!   grouped, with barriers and per-queue submission batches synthesized
//! - [`Device`] - Virtual queues, bindless index tables, validation reporting
//!   and the compiled graph cache
//! - [`ExecutionTimeline`] - Bounded cross-graph synchronization
//!
//! ## Example
//!
//! ```ignore
//! use frame_graph_engine::{Device, DeviceConfig, PassTask};
//!
//! let device = Device::new(DeviceConfig::default())?;
//! device.update();
//!
//! let mut builder = device.begin_frame_graph("main", None).unwrap();
//! builder.begin_render_pass("tonemap");
//! builder.connect_swapchain_output(None);
//! builder.set_pass_task(PassTask::Graphics(Box::new(|list| {
//!     list.draw(3, 1);
//! })));
//! builder.end_pass();
//! builder.end_frame_graph_and_execute();
//! ```

pub mod bindless;
pub mod device;
pub mod error;
pub mod executor;
pub mod graph;
pub mod resources;
pub mod timeline;
pub mod types;
pub mod validation;

// Re-export main types for convenience
pub use bindless::{BindingKind, BindlessAllocator};
pub use device::{Device, DeviceConfig, QueueConfig, MAX_FRAMES_IN_FLIGHT};
pub use error::GraphError;
pub use executor::{CommandList, FenceStatus};
pub use graph::{
    CacheKey, FrameGraph, FrameProvider, GraphBuilder, GraphResult, ImageLayout, ImportedResource,
    PassKind, PassTask, ResourceHandle, ResourceKind, ResourceStage, SubmissionBatch,
};
pub use resources::{Buffer, Texture};
pub use timeline::{ExecutionTimeline, WaitResult};
pub use types::{
    BufferDescriptor, BufferUsage, ClearValue, Extent2d, TextureDescriptor, TextureFormat,
    TextureUsage,
};
pub use validation::{ValidationErrorKind, ValidationReport, ValidationSink};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the engine's logging hooks.
///
/// Optional; call once before creating devices to get a startup log line.
pub fn init() {
    log::info!("frame-graph-engine v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
