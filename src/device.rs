//! The explicit device object.
//!
//! Everything with shared lifetime lives here: virtual queues, the frame
//! counter, the bindless allocator, the validation sink and the compiled
//! graph cache. There is no global state; two devices are fully independent.
//!
//! The expected per-frame flow is `device.update()` once, then one or more
//! graph builds and executions. `update` advances the frame counter, recycles
//! retired bindless indices and drains graphs queued for deferred execution.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::bindless::{BindingKind, BindlessAllocator};
use crate::error::GraphError;
use crate::executor::{self, FenceStatus};
use crate::graph::builder::GraphBuilder;
use crate::graph::cache::{CacheKey, GraphCache};
use crate::graph::compiled::FrameGraph;
use crate::graph::pass::PassKind;
use crate::resources::{Buffer, Texture};
use crate::timeline::ExecutionTimeline;
use crate::types::{BufferDescriptor, Extent2d, TextureDescriptor, TextureFormat, TextureUsage};
use crate::validation::{ValidationErrorKind, ValidationSink};

/// Upper bound on frames the device keeps in flight.
pub const MAX_FRAMES_IN_FLIGHT: u64 = 3;

/// Mapping from pass kinds to device queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    graphics: usize,
    compute: usize,
    transfer: usize,
    queue_count: usize,
}

impl QueueConfig {
    /// One shared queue for all work. No inter-queue semaphores are ever
    /// synthesized under this configuration.
    pub fn unified() -> Self {
        Self {
            graphics: 0,
            compute: 0,
            transfer: 0,
            queue_count: 1,
        }
    }

    /// Dedicated graphics, compute and transfer queues.
    pub fn dedicated() -> Self {
        Self {
            graphics: 0,
            compute: 1,
            transfer: 2,
            queue_count: 3,
        }
    }

    /// Number of queues this configuration exposes.
    pub fn queue_count(&self) -> usize {
        self.queue_count
    }

    /// Queue index the given pass kind runs on.
    pub fn queue_for_kind(&self, kind: PassKind) -> usize {
        match kind {
            PassKind::Graphics => self.graphics,
            PassKind::Compute => self.compute,
            PassKind::Transfer => self.transfer,
        }
    }
}

/// Parameters for device creation.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Queue layout.
    pub queue_config: QueueConfig,
    /// Frames that may be in flight simultaneously.
    pub frames_in_flight: u64,
    /// Swapchain dimensions.
    pub swapchain_extent: Extent2d,
    /// Swapchain pixel format.
    pub swapchain_format: TextureFormat,
    /// Bound applied to timeline waits performed during execution.
    pub sync_timeout: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            queue_config: QueueConfig::dedicated(),
            frames_in_flight: MAX_FRAMES_IN_FLIGHT,
            swapchain_extent: Extent2d::new(1280, 720),
            swapchain_format: TextureFormat::Bgra8Unorm,
            sync_timeout: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Default)]
struct QueueStats {
    submissions: u64,
    groups: u64,
}

#[derive(Debug, Default)]
struct VirtualQueue {
    stats: Mutex<QueueStats>,
}

/// The virtual GPU device.
pub struct Device {
    config: DeviceConfig,
    queues: Vec<VirtualQueue>,
    swapchain: Arc<Texture>,
    validation: ValidationSink,
    bindless: BindlessAllocator,
    cache: Mutex<GraphCache>,
    /// Graphs queued for execution at the next `update`.
    deferred: Mutex<Vec<Arc<FrameGraph>>>,
    frame: AtomicU64,
    updated: AtomicBool,
    missing_update_reported: AtomicBool,
    build_open: AtomicBool,
    next_resource_id: AtomicU64,
    next_timeline_id: AtomicU64,
    semaphores: Mutex<u64>,
    next_epoch: AtomicU32,
}

impl Device {
    /// Create a device with the given configuration.
    pub fn new(config: DeviceConfig) -> Result<Self, GraphError> {
        let swapchain_desc = TextureDescriptor::new_2d(
            config.swapchain_extent.width,
            config.swapchain_extent.height,
            config.swapchain_format,
            TextureUsage::RENDER_ATTACHMENT | TextureUsage::TRANSFER_SRC,
        )
        .with_label("swapchain");
        let swapchain = Texture::new(1, swapchain_desc)?;
        let queues = (0..config.queue_config.queue_count())
            .map(|_| VirtualQueue::default())
            .collect();
        log::debug!(
            "created device: {} queues, {} frames in flight",
            config.queue_config.queue_count(),
            config.frames_in_flight
        );
        Ok(Self {
            config,
            queues,
            swapchain,
            validation: ValidationSink::new(),
            bindless: BindlessAllocator::new(),
            cache: Mutex::new(GraphCache::new()),
            deferred: Mutex::new(Vec::new()),
            frame: AtomicU64::new(0),
            updated: AtomicBool::new(false),
            missing_update_reported: AtomicBool::new(false),
            build_open: AtomicBool::new(false),
            next_resource_id: AtomicU64::new(2),
            next_timeline_id: AtomicU64::new(1),
            semaphores: Mutex::new(0),
            next_epoch: AtomicU32::new(1),
        })
    }

    /// The device's validation sink.
    pub fn validation(&self) -> &ValidationSink {
        &self.validation
    }

    /// The device configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Frames that may be in flight simultaneously.
    pub fn frames_in_flight(&self) -> u64 {
        self.config.frames_in_flight
    }

    /// Current value of the monotonic frame counter.
    pub fn current_frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    pub(crate) fn sync_timeout(&self) -> Duration {
        self.config.sync_timeout
    }

    /// Advance to the next frame.
    ///
    /// Recycles bindless indices that have cleared the frames-in-flight
    /// window and executes graphs queued through
    /// [`queue_for_execution`](Self::queue_for_execution).
    pub fn update(&self) {
        let frame = self.frame.fetch_add(1, Ordering::Relaxed) + 1;
        self.updated.store(true, Ordering::Relaxed);
        self.missing_update_reported.store(false, Ordering::Relaxed);
        self.bindless.collect(frame, self.config.frames_in_flight);

        let deferred: Vec<_> = self.deferred.lock().drain(..).collect();
        for graph in deferred {
            self.execute_frame_graph(&graph);
        }
        log::trace!("device update: frame {}", frame);
    }

    /// Drain all pending work and recycle every retired bindless index.
    pub fn wait_idle(&self) {
        let deferred: Vec<_> = self.deferred.lock().drain(..).collect();
        for graph in deferred {
            self.execute_frame_graph(&graph);
        }
        self.bindless.flush();
        log::debug!("device idle");
    }

    /// Create a texture backed by CPU storage.
    pub fn create_texture(&self, descriptor: TextureDescriptor) -> Result<Arc<Texture>, GraphError> {
        let id = self.next_resource_id.fetch_add(1, Ordering::Relaxed);
        Texture::new(id, descriptor)
    }

    /// Create a buffer backed by CPU storage.
    pub fn create_buffer(&self, descriptor: BufferDescriptor) -> Result<Arc<Buffer>, GraphError> {
        let id = self.next_resource_id.fetch_add(1, Ordering::Relaxed);
        Buffer::new(id, descriptor)
    }

    /// Create an execution timeline owned by the caller.
    pub fn create_execution_timeline(&self) -> Arc<ExecutionTimeline> {
        let id = self.next_timeline_id.fetch_add(1, Ordering::Relaxed);
        ExecutionTimeline::new(id)
    }

    /// The swapchain backing texture for the current frame.
    pub fn swapchain_texture(&self) -> Arc<Texture> {
        Arc::clone(&self.swapchain)
    }

    /// Begin building a frame graph.
    ///
    /// Builds are non-reentrant: a second begin while one is open is a
    /// validation error and returns `None`.
    pub fn begin_frame_graph(
        &self,
        name: &str,
        cache_key: Option<CacheKey>,
    ) -> Option<GraphBuilder<'_>> {
        if !self.updated.load(Ordering::Relaxed)
            && !self.missing_update_reported.swap(true, Ordering::Relaxed)
        {
            self.validation.report(
                ValidationErrorKind::MissingDeviceUpdate,
                format!("graph '{}' begun before device update", name),
            );
        }
        if self.build_open.swap(true, Ordering::Acquire) {
            self.validation.report(
                ValidationErrorKind::NestedGraphBuild,
                format!("graph '{}' begun while another build is open", name),
            );
            return None;
        }
        Some(GraphBuilder::new(self, name.to_string(), cache_key))
    }

    /// Derive a cache key from a stable structural label.
    pub fn initialise_cache_key(&self, label: &str) -> CacheKey {
        CacheKey::from_label(label)
    }

    /// Look up a previously compiled graph, bypassing the compile pipeline.
    pub fn cached_frame_graph(&self, key: &CacheKey) -> Option<Arc<FrameGraph>> {
        self.cache.lock().get(key)
    }

    /// Number of cache lookups that found a graph.
    pub fn cache_hit_count(&self) -> u64 {
        self.cache.lock().hit_count()
    }

    /// Number of cache lookups that missed.
    pub fn cache_miss_count(&self) -> u64 {
        self.cache.lock().miss_count()
    }

    /// Drop every cached graph.
    pub fn clear_graph_cache(&self) {
        self.cache.lock().clear();
    }

    /// Execute a compiled graph immediately on the calling thread.
    pub fn execute_frame_graph(&self, graph: &Arc<FrameGraph>) {
        executor::execute(graph.as_ref(), self);
    }

    /// Execute a compiled graph and report its completion status.
    ///
    /// Virtual queues complete synchronously, so the fence is always signaled
    /// on return.
    pub fn flush_frame_graph(&self, graph: &Arc<FrameGraph>) -> FenceStatus {
        executor::execute(graph.as_ref(), self);
        FenceStatus::Signaled
    }

    /// Defer a compiled graph to the next `update` (fire and forget).
    pub fn queue_for_execution(&self, graph: Arc<FrameGraph>) {
        self.deferred.lock().push(graph);
    }

    /// Acquire a bindless index for sampling `texture`.
    pub fn acquire_sampled_image_index(&self, texture: &Texture) -> u32 {
        self.bindless.acquire(BindingKind::SampledImage, texture.id())
    }

    /// Acquire a bindless index for storage access to `texture`.
    pub fn acquire_storage_image_index(&self, texture: &Texture) -> u32 {
        self.bindless.acquire(BindingKind::StorageImage, texture.id())
    }

    /// Acquire a bindless index for storage access to `buffer`.
    pub fn acquire_storage_buffer_index(&self, buffer: &Buffer) -> u32 {
        self.bindless.acquire(BindingKind::StorageBuffer, buffer.id())
    }

    /// Acquire a bindless index for a sampler object.
    pub fn acquire_sampler_index(&self, sampler_id: u64) -> u32 {
        self.bindless.acquire(BindingKind::Sampler, sampler_id)
    }

    /// Release a bindless index back to its table.
    ///
    /// The index is recycled only after the frames-in-flight window has
    /// passed. Releasing an index that does not exist is a validation error
    /// and otherwise a no-op.
    pub fn release_binding_index(&self, kind: BindingKind, index: u32) {
        if !self.bindless.release(kind, index, self.current_frame()) {
            self.validation.report(
                ValidationErrorKind::UnknownBindlessIndex,
                format!("{:?} index {}", kind, index),
            );
        }
    }

    /// The device's bindless allocator.
    pub fn bindless(&self) -> &BindlessAllocator {
        &self.bindless
    }

    /// Number of submissions recorded on the given queue.
    pub fn queue_submission_count(&self, queue: usize) -> u64 {
        self.queues[queue].stats.lock().submissions
    }

    /// Number of pass groups executed on the given queue.
    pub fn queue_group_count(&self, queue: usize) -> u64 {
        self.queues[queue].stats.lock().groups
    }

    pub(crate) fn queue_for_kind(&self, kind: PassKind) -> usize {
        self.config.queue_config.queue_for_kind(kind)
    }

    pub(crate) fn record_submission(&self, queue: usize, group_count: usize) {
        let mut stats = self.queues[queue].stats.lock();
        stats.submissions += 1;
        stats.groups += group_count as u64;
    }

    pub(crate) fn semaphore_counter(&self) -> &Mutex<u64> {
        &self.semaphores
    }

    pub(crate) fn next_build_epoch(&self) -> u32 {
        self.next_epoch.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn end_build(&self) {
        self.build_open.store(false, Ordering::Release);
    }

    pub(crate) fn store_cached_graph(&self, key: CacheKey, graph: Arc<FrameGraph>) {
        self.cache.lock().insert(key, graph);
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("queues", &self.queues.len())
            .field("frame", &self.current_frame())
            .field("frames_in_flight", &self.config.frames_in_flight)
            .finish_non_exhaustive()
    }
}
