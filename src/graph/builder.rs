//! Frame graph construction.
//!
//! A [`GraphBuilder`] is obtained from
//! [`Device::begin_frame_graph`](crate::device::Device::begin_frame_graph) and
//! records resource declarations and pass connections for one frame.
//! `end_frame_graph` runs the compile pipeline (cull, order, group, barrier
//! synthesis, batching) and returns an immutable [`FrameGraph`].
//!
//! Builds are single-threaded and non-reentrant per device. Usage mistakes do
//! not abort the build: they are reported to the device's validation sink and
//! the offending call becomes a no-op, or the offending pass is dropped.

use std::sync::Arc;
use std::time::Instant;

use crate::device::Device;
use crate::graph::analyze::analyze;
use crate::graph::batch::batch_groups;
use crate::graph::cache::CacheKey;
use crate::graph::compiled::{FrameGraph, GraphResult};
use crate::graph::group::group_passes;
use crate::graph::pass::{PassKind, PassNode, PassTask};
use crate::graph::registry::ResourceRegistry;
use crate::graph::resource::{
    FrameProvider, ImportedResource, ResourceHandle, ResourceKind, ResourceNode,
};
use crate::graph::resource::ResourceStage;
use crate::graph::barrier::synthesize;
use crate::resources::{Buffer, Texture};
use crate::timeline::ExecutionTimeline;
use crate::types::{BufferDescriptor, ClearValue, TextureDescriptor};
use crate::validation::ValidationErrorKind;

/// Builder for one frame graph.
///
/// Dropping the builder without calling `end_frame_graph` abandons the build
/// and releases the device for the next one.
pub struct GraphBuilder<'d> {
    device: &'d Device,
    name: String,
    cache_key: Option<CacheKey>,
    registry: ResourceRegistry,
    passes: Vec<PassNode>,
    open_pass: Option<usize>,
    swapchain: Option<ResourceHandle>,
    waits: Vec<(Arc<ExecutionTimeline>, u64)>,
    signals: Vec<(Arc<ExecutionTimeline>, u64)>,
    started: Instant,
}

impl<'d> GraphBuilder<'d> {
    pub(crate) fn new(device: &'d Device, name: String, cache_key: Option<CacheKey>) -> Self {
        let epoch = device.next_build_epoch();
        log::trace!("begin frame graph '{}' (epoch {})", name, epoch);
        Self {
            device,
            name,
            cache_key,
            registry: ResourceRegistry::new(epoch),
            passes: Vec::new(),
            open_pass: None,
            swapchain: None,
            waits: Vec::new(),
            signals: Vec::new(),
            started: Instant::now(),
        }
    }

    /// The name given at `begin_frame_graph`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a transient texture owned by the compiled graph.
    pub fn add_transient_texture(
        &mut self,
        name: impl Into<String>,
        descriptor: TextureDescriptor,
    ) -> ResourceHandle {
        self.registry
            .add(ResourceNode::transient_texture(name.into(), descriptor))
    }

    /// Declare a transient buffer owned by the compiled graph.
    pub fn add_transient_buffer(
        &mut self,
        name: impl Into<String>,
        descriptor: BufferDescriptor,
    ) -> ResourceHandle {
        self.registry
            .add(ResourceNode::transient_buffer(name.into(), descriptor))
    }

    /// Import a caller-owned texture. The graph never allocates or frees it.
    pub fn import_texture(
        &mut self,
        name: impl Into<String>,
        texture: Arc<Texture>,
    ) -> ResourceHandle {
        self.registry
            .add(ResourceNode::imported_texture(name.into(), texture))
    }

    /// Import a caller-owned buffer.
    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        buffer: Arc<Buffer>,
    ) -> ResourceHandle {
        self.registry
            .add(ResourceNode::imported_buffer(name.into(), buffer))
    }

    /// Import a multi-buffered texture whose backing resource is selected per
    /// frame by `provider` (double/triple-buffered data).
    pub fn import_buffered_texture(
        &mut self,
        name: impl Into<String>,
        provider: FrameProvider,
    ) -> ResourceHandle {
        let mut node = match provider(self.device.current_frame()) {
            ImportedResource::Texture(texture) => {
                ResourceNode::imported_texture(name.into(), texture)
            }
            ImportedResource::Buffer(buffer) => ResourceNode::imported_buffer(name.into(), buffer),
        };
        node.provider = Some(provider);
        self.registry.add(node)
    }

    /// Import the swapchain image for the current frame.
    ///
    /// Importing it twice into the same graph is a validation error; the
    /// first handle is returned.
    pub fn import_swapchain(&mut self) -> ResourceHandle {
        if let Some(handle) = self.swapchain {
            self.device.validation().report(
                ValidationErrorKind::DoubleSwapchainImport,
                format!("graph '{}'", self.name),
            );
            return handle;
        }
        let handle = self
            .registry
            .add(ResourceNode::swapchain(self.device.swapchain_texture()));
        self.swapchain = Some(handle);
        handle
    }

    /// Flag a resource as essential so passes writing it survive culling.
    pub fn mark_essential(&mut self, handle: ResourceHandle) {
        match self.registry.get_mut(handle) {
            Some(node) => node.essential = true,
            None => self.report_foreign(handle, "mark_essential"),
        }
    }

    /// Open a graphics pass.
    pub fn begin_render_pass(&mut self, name: impl Into<String>) {
        self.begin_pass(name.into(), PassKind::Graphics);
    }

    /// Open a compute pass.
    pub fn begin_compute_pass(&mut self, name: impl Into<String>) {
        self.begin_pass(name.into(), PassKind::Compute);
    }

    /// Open a transfer pass.
    pub fn begin_transfer_pass(&mut self, name: impl Into<String>) {
        self.begin_pass(name.into(), PassKind::Transfer);
    }

    fn begin_pass(&mut self, name: String, kind: PassKind) {
        if let Some(open) = self.open_pass {
            self.device.validation().report(
                ValidationErrorKind::NestedPassBegin,
                format!(
                    "pass '{}' begun while '{}' is open",
                    name, self.passes[open].name
                ),
            );
            self.open_pass = None;
        }
        self.passes.push(PassNode::new(name, kind));
        self.open_pass = Some(self.passes.len() - 1);
    }

    /// Connect a resource as an input of the open pass with an explicit stage.
    pub fn connect_input(&mut self, handle: ResourceHandle, stage: ResourceStage) {
        let Some(pass_index) = self.open_pass else {
            self.report_outside_pass("connect_input");
            return;
        };
        if !self.validate_handle(handle, "connect_input") {
            return;
        }
        self.passes[pass_index].inputs.push((handle, stage));
    }

    /// Connect a resource as an input using the pass kind's default stage.
    pub fn connect_input_default(&mut self, handle: ResourceHandle) {
        let Some(pass_index) = self.open_pass else {
            self.report_outside_pass("connect_input");
            return;
        };
        let stage = self.passes[pass_index].default_input_stage();
        self.connect_input(handle, stage);
    }

    /// Connect a resource as an output using the pass kind's default stage.
    pub fn connect_output(&mut self, handle: ResourceHandle) {
        let Some(pass_index) = self.open_pass else {
            self.report_outside_pass("connect_output");
            return;
        };
        let stage = self.passes[pass_index].default_output_stage();
        self.connect_output_as(handle, stage);
    }

    /// Connect a resource as an output with an explicit stage.
    pub fn connect_output_as(&mut self, handle: ResourceHandle, stage: ResourceStage) {
        let Some(pass_index) = self.open_pass else {
            self.report_outside_pass("connect_output");
            return;
        };
        if !self.validate_handle(handle, "connect_output") {
            return;
        }
        self.passes[pass_index].outputs.push((handle, stage));
    }

    /// Connect an output that is cleared before the pass first writes it.
    pub fn connect_cleared_output(&mut self, handle: ResourceHandle, clear: ClearValue) {
        if self.open_pass.is_none() {
            self.report_outside_pass("connect_cleared_output");
            return;
        }
        if let Some(node) = self.registry.get_mut(handle) {
            node.clear = Some(clear);
        }
        self.connect_output(handle);
    }

    /// Connect the swapchain as an output of the open pass.
    ///
    /// Imports the swapchain implicitly if it has not been imported yet.
    pub fn connect_swapchain_output(&mut self, clear: Option<ClearValue>) {
        if self.open_pass.is_none() {
            self.device.validation().report(
                ValidationErrorKind::SwapchainOutputOutsidePass,
                format!("graph '{}'", self.name),
            );
            return;
        }
        let handle = match self.swapchain {
            Some(handle) => handle,
            None => self.import_swapchain(),
        };
        if let Some(clear) = clear {
            if let Some(node) = self.registry.get_mut(handle) {
                node.clear = Some(clear);
            }
        }
        self.connect_output(handle);
    }

    /// Set the task callback recorded when the open pass executes.
    pub fn set_pass_task(&mut self, task: PassTask) {
        let Some(pass_index) = self.open_pass else {
            self.report_outside_pass("set_pass_task");
            return;
        };
        let pass = &mut self.passes[pass_index];
        if task.kind() != pass.kind {
            log::warn!(
                "task kind {:?} does not match pass '{}' kind {:?}",
                task.kind(),
                pass.name,
                pass.kind
            );
        }
        pass.task = Some(task);
    }

    /// Close the open pass.
    pub fn end_pass(&mut self) {
        if self.open_pass.take().is_none() {
            self.device.validation().report(
                ValidationErrorKind::UnmatchedEndPass,
                format!("graph '{}'", self.name),
            );
        }
    }

    /// Make execution wait until `value` is reached on `timeline` before the
    /// first batch is submitted. The wait is bounded by the device's sync
    /// timeout.
    pub fn wait_on_timeline(&mut self, timeline: &Arc<ExecutionTimeline>, value: u64) {
        self.waits.push((Arc::clone(timeline), value));
    }

    /// Signal `timeline` when the graph finishes executing.
    ///
    /// Returns the value that will be reached, for use in later waits.
    pub fn signal_timeline(&mut self, timeline: &Arc<ExecutionTimeline>) -> u64 {
        let value = timeline.signal_request();
        self.signals.push((Arc::clone(timeline), value));
        value
    }

    /// Finish the build and compile the graph.
    pub fn end_frame_graph(mut self) -> Arc<FrameGraph> {
        if let Some(open) = self.open_pass.take() {
            self.device.validation().report(
                ValidationErrorKind::MissingEndPass,
                format!("pass '{}'", self.passes[open].name),
            );
        }

        // A pass without a task has nothing to record; it is dropped before
        // analysis so it neither keeps resources live nor orders anything.
        let mut passes = std::mem::take(&mut self.passes);
        passes.retain(|pass| {
            if pass.task.is_none() {
                self.device.validation().report(
                    ValidationErrorKind::MissingPassTask,
                    format!("pass '{}'", pass.name),
                );
                false
            } else {
                true
            }
        });

        let registry = std::mem::replace(&mut self.registry, ResourceRegistry::new(0));
        let connected: Vec<bool> = {
            let mut connected = vec![false; registry.len()];
            for pass in &passes {
                for (handle, _) in pass.inputs.iter().chain(pass.outputs.iter()) {
                    connected[handle.index as usize] = true;
                }
            }
            connected
        };
        for (index, node) in registry.iter() {
            let imported = !node.kind().is_transient();
            if imported && !connected[index as usize] {
                self.device.validation().report(
                    ValidationErrorKind::UnusedImportedResource,
                    format!("resource '{}'", node.name()),
                );
            }
        }

        let graph = Arc::new(self.compile(registry, passes));
        // Degraded graphs are never cached; the next frame gets another
        // chance to build a valid one.
        if graph.result() == GraphResult::Success {
            if let Some(key) = graph.cache_key() {
                self.device.store_cached_graph(key, Arc::clone(&graph));
            }
        }
        graph
    }

    /// Finish the build, compile and immediately execute the graph.
    pub fn end_frame_graph_and_execute(self) -> Arc<FrameGraph> {
        let device = self.device;
        let graph = self.end_frame_graph();
        device.execute_frame_graph(&graph);
        graph
    }

    fn compile(&mut self, registry: ResourceRegistry, mut passes: Vec<PassNode>) -> FrameGraph {
        let analysis = match analyze(&passes, &registry) {
            Ok(analysis) => analysis,
            Err(_) => {
                log::warn!("frame graph '{}' contains a cyclic dependency", self.name);
                return FrameGraph::empty(
                    std::mem::take(&mut self.name),
                    GraphResult::CyclicDependency,
                    self.cache_key,
                    registry,
                    passes,
                    0,
                    self.started.elapsed(),
                );
            }
        };

        for (pass_index, live) in analysis.live.iter().enumerate() {
            passes[pass_index].culled = !live;
        }

        if analysis.order.is_empty() {
            log::debug!("frame graph '{}' has no live passes", self.name);
            return FrameGraph::empty(
                std::mem::take(&mut self.name),
                GraphResult::NoWorkToDo,
                self.cache_key,
                registry,
                passes,
                analysis.culled_count,
                self.started.elapsed(),
            );
        }

        let groups = group_passes(&analysis, &passes, &registry);
        let queue_of_group: Vec<usize> = groups
            .iter()
            .map(|group| self.device.queue_for_kind(group.kind()))
            .collect();
        let synthesis = synthesize(&groups, &passes, &registry, &queue_of_group);
        let batches = {
            let mut counter = self.device.semaphore_counter().lock();
            batch_groups(
                &groups,
                &queue_of_group,
                &synthesis.cross_queue_deps,
                &mut *counter,
            )
        };

        // Non-transient resources with a clear value are cleared when their
        // first-use group begins; transients are cleared at creation.
        let mut imported_clears = Vec::new();
        let mut seen = vec![false; registry.len()];
        for (group_index, group) in groups.iter().enumerate() {
            for &pass_index in &group.passes {
                let pass = &passes[pass_index];
                for (handle, _) in pass.inputs.iter().chain(pass.outputs.iter()) {
                    let index = handle.index;
                    if seen[index as usize] {
                        continue;
                    }
                    seen[index as usize] = true;
                    let node = registry.node(index);
                    if !node.kind().is_transient() && node.clear.is_some() {
                        imported_clears.push((group_index, index));
                    }
                }
            }
        }

        log::trace!(
            "compiled frame graph '{}': {} groups, {} batches, {} passes culled",
            self.name,
            groups.len(),
            batches.len(),
            analysis.culled_count
        );

        FrameGraph {
            name: std::mem::take(&mut self.name),
            result: GraphResult::Success,
            cache_key: self.cache_key,
            registry,
            passes,
            barrier_sets: synthesis.barrier_sets,
            creates: synthesis.creates,
            frees: synthesis.frees,
            groups,
            batches,
            queue_of_group,
            imported_clears,
            waits: std::mem::take(&mut self.waits),
            signals: std::mem::take(&mut self.signals),
            culled_count: analysis.culled_count,
            compile_time: self.started.elapsed(),
            execute_time: parking_lot::Mutex::new(None),
        }
    }

    fn validate_handle(&self, handle: ResourceHandle, operation: &str) -> bool {
        if self.registry.get(handle).is_none() {
            self.report_foreign(handle, operation);
            return false;
        }
        true
    }

    fn report_foreign(&self, handle: ResourceHandle, operation: &str) {
        self.device.validation().report(
            ValidationErrorKind::ForeignResourceHandle,
            format!(
                "{}: handle index {} generation {} does not belong to graph '{}'",
                operation,
                handle.index(),
                handle.generation(),
                self.name
            ),
        );
    }

    fn report_outside_pass(&self, operation: &str) {
        self.device.validation().report(
            ValidationErrorKind::ConnectOutsidePass,
            format!("{} outside an open pass in graph '{}'", operation, self.name),
        );
    }

    /// Check if the swapchain has been imported into this build.
    pub fn has_swapchain(&self) -> bool {
        self.swapchain.is_some()
    }

    /// Kind of resource a handle refers to, if it belongs to this build.
    pub fn resource_kind(&self, handle: ResourceHandle) -> Option<ResourceKind> {
        self.registry.get(handle).map(|node| node.kind())
    }
}

impl Drop for GraphBuilder<'_> {
    fn drop(&mut self) {
        self.device.end_build();
    }
}
