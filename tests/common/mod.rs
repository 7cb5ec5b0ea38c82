#![allow(dead_code)]

//! Shared helpers for the integration test suite.

use frame_graph_engine::{
    Device, DeviceConfig, Extent2d, PassTask, QueueConfig, TextureDescriptor, TextureFormat,
    TextureUsage,
};

/// Device with dedicated graphics/compute/transfer queues and a small
/// swapchain, updated once so builds start cleanly.
pub fn test_device() -> Device {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = Device::new(DeviceConfig {
        swapchain_extent: Extent2d::new(16, 16),
        ..DeviceConfig::default()
    })
    .expect("device creation");
    device.update();
    device
}

/// Device with a single shared queue.
pub fn unified_device() -> Device {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = Device::new(DeviceConfig {
        queue_config: QueueConfig::unified(),
        swapchain_extent: Extent2d::new(16, 16),
        ..DeviceConfig::default()
    })
    .expect("device creation");
    device.update();
    device
}

/// Descriptor for a small render target usable as attachment and sampled
/// input.
pub fn target_desc(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        width,
        height,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::SAMPLED | TextureUsage::STORAGE,
    )
}

/// Graphics task that records nothing.
pub fn noop_graphics_task() -> PassTask {
    PassTask::Graphics(Box::new(|_| {}))
}

/// Compute task that records nothing.
pub fn noop_compute_task() -> PassTask {
    PassTask::Compute(Box::new(|_| {}))
}

/// Transfer task that records nothing.
pub fn noop_transfer_task() -> PassTask {
    PassTask::Transfer(Box::new(|_| {}))
}
