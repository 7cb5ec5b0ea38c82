//! Execution of compiled frame graphs on the virtual device.
//!
//! Batches are submitted queue-by-queue in their compiled order. Before each
//! group runs, its transient resources are created (and cleared when a clear
//! value was declared) and its acquire barriers are replayed; after it runs,
//! release barriers are replayed and transients whose last use has passed are
//! freed. Task callbacks record through a [`CommandList`] scoped to their
//! pass. Ordering between groups is carried entirely by the precomputed
//! barriers and semaphores, never by callback side effects.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec4;

use crate::bindless::BindingKind;
use crate::device::Device;
use crate::graph::barrier::ImageLayout;
use crate::graph::compiled::{FrameGraph, GraphResult};
use crate::graph::pass::PassNode;
use crate::graph::registry::ResourceRegistry;
use crate::graph::resource::{ImportedResource, ResourceKind};
use crate::resources::{Buffer, Texture};
use crate::timeline::WaitResult;
use crate::types::ClearValue;

/// Completion status of a flushed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The submission has completed.
    Signaled,
    /// The submission is still in flight.
    ///
    /// Virtual queues run submitted work to completion before returning, so
    /// this status is never observed from
    /// [`Device::flush_frame_graph`](crate::device::Device::flush_frame_graph);
    /// a hardware backend polling real fences would produce it.
    Pending,
}

/// Recording interface handed to pass task callbacks.
///
/// Resource lookups are scoped to the pass's declared connections: a task can
/// only reach what its pass connected, by the name the resource was declared
/// with. Connected resources, transients included, can also be resolved to
/// shader-visible bindless indices.
pub struct CommandList<'a> {
    pass: &'a PassNode,
    registry: &'a ResourceRegistry,
    resolved: &'a HashMap<u32, ImportedResource>,
    device: &'a Device,
    bindings: &'a mut HashMap<(u32, BindingKind), u32>,
    pipeline: Option<String>,
    push_constants: Vec<u8>,
    draw_calls: u32,
    dispatches: u32,
    inline_barriers: u32,
}

impl<'a> CommandList<'a> {
    fn new(
        pass: &'a PassNode,
        registry: &'a ResourceRegistry,
        resolved: &'a HashMap<u32, ImportedResource>,
        device: &'a Device,
        bindings: &'a mut HashMap<(u32, BindingKind), u32>,
    ) -> Self {
        Self {
            pass,
            registry,
            resolved,
            device,
            bindings,
            pipeline: None,
            push_constants: Vec::new(),
            draw_calls: 0,
            dispatches: 0,
            inline_barriers: 0,
        }
    }

    fn find(
        &self,
        connections: &[(crate::graph::resource::ResourceHandle, crate::graph::resource::ResourceStage)],
        name: &str,
    ) -> Option<&ImportedResource> {
        connections
            .iter()
            .find(|(handle, _)| self.registry.node(handle.index()).name() == name)
            .and_then(|(handle, _)| self.resolved.get(&handle.index()))
    }

    /// Texture connected as an input under `name`.
    pub fn input_texture(&self, name: &str) -> Option<Arc<Texture>> {
        match self.find(&self.pass.inputs, name)? {
            ImportedResource::Texture(texture) => Some(Arc::clone(texture)),
            ImportedResource::Buffer(_) => None,
        }
    }

    /// Texture connected as an output under `name`.
    pub fn output_texture(&self, name: &str) -> Option<Arc<Texture>> {
        match self.find(&self.pass.outputs, name)? {
            ImportedResource::Texture(texture) => Some(Arc::clone(texture)),
            ImportedResource::Buffer(_) => None,
        }
    }

    /// Buffer connected as an input under `name`.
    pub fn input_buffer(&self, name: &str) -> Option<Arc<Buffer>> {
        match self.find(&self.pass.inputs, name)? {
            ImportedResource::Buffer(buffer) => Some(Arc::clone(buffer)),
            ImportedResource::Texture(_) => None,
        }
    }

    /// Buffer connected as an output under `name`.
    pub fn output_buffer(&self, name: &str) -> Option<Arc<Buffer>> {
        match self.find(&self.pass.outputs, name)? {
            ImportedResource::Buffer(buffer) => Some(Arc::clone(buffer)),
            ImportedResource::Texture(_) => None,
        }
    }

    fn find_index(
        &self,
        connections: &[(crate::graph::resource::ResourceHandle, crate::graph::resource::ResourceStage)],
        name: &str,
    ) -> Option<u32> {
        connections
            .iter()
            .find(|(handle, _)| self.registry.node(handle.index()).name() == name)
            .map(|(handle, _)| handle.index())
    }

    fn binding_index(&mut self, resource_index: u32, kind: BindingKind) -> Option<u32> {
        if let Some(&index) = self.bindings.get(&(resource_index, kind)) {
            return Some(index);
        }
        let index = match (kind, self.resolved.get(&resource_index)?) {
            (
                BindingKind::SampledImage | BindingKind::StorageImage,
                ImportedResource::Texture(texture),
            ) => self.device.bindless().acquire(kind, texture.id()),
            (BindingKind::StorageBuffer, ImportedResource::Buffer(buffer)) => {
                self.device.bindless().acquire(kind, buffer.id())
            }
            _ => return None,
        };
        self.bindings.insert((resource_index, kind), index);
        Some(index)
    }

    /// Shader-visible index for sampling the input texture named `name`.
    ///
    /// The index is acquired from the device's bindless tables on first
    /// request and stays stable for the rest of this execution; it is
    /// released when execution finishes.
    pub fn sampled_image_index(&mut self, name: &str) -> Option<u32> {
        let resource = self.find_index(&self.pass.inputs, name)?;
        self.binding_index(resource, BindingKind::SampledImage)
    }

    /// Shader-visible storage index for the texture connected under `name`.
    pub fn storage_image_index(&mut self, name: &str) -> Option<u32> {
        let resource = self
            .find_index(&self.pass.outputs, name)
            .or_else(|| self.find_index(&self.pass.inputs, name))?;
        self.binding_index(resource, BindingKind::StorageImage)
    }

    /// Shader-visible storage index for the buffer connected under `name`.
    pub fn storage_buffer_index(&mut self, name: &str) -> Option<u32> {
        let resource = self
            .find_index(&self.pass.outputs, name)
            .or_else(|| self.find_index(&self.pass.inputs, name))?;
        self.binding_index(resource, BindingKind::StorageBuffer)
    }

    /// Bind a pipeline by label.
    pub fn bind_pipeline(&mut self, label: &str) {
        self.pipeline = Some(label.to_string());
    }

    /// Currently bound pipeline label, if any.
    pub fn bound_pipeline(&self) -> Option<&str> {
        self.pipeline.as_deref()
    }

    /// Set push constant data from a plain-old-data value.
    pub fn push_constants<T: bytemuck::NoUninit>(&mut self, value: &T) {
        self.push_constants = bytemuck::bytes_of(value).to_vec();
    }

    /// Raw push constant bytes set by the most recent call.
    pub fn push_constant_bytes(&self) -> &[u8] {
        &self.push_constants
    }

    /// Record a draw call.
    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.draw_calls += 1;
        log::trace!(
            "pass '{}': draw {} vertices x {} instances",
            self.pass.name(),
            vertex_count,
            instance_count
        );
    }

    /// Record a compute dispatch.
    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.dispatches += 1;
        log::trace!("pass '{}': dispatch {}x{}x{}", self.pass.name(), x, y, z);
    }

    /// Insert an explicit mid-pass image barrier (per-mip compute chains and
    /// other transitions the synthesizer cannot see).
    pub fn image_barrier(&mut self, name: &str, old_layout: ImageLayout, new_layout: ImageLayout) {
        self.inline_barriers += 1;
        log::trace!(
            "pass '{}': inline barrier on '{}' {:?} -> {:?}",
            self.pass.name(),
            name,
            old_layout,
            new_layout
        );
    }

    /// Number of draw calls recorded so far.
    pub fn draw_call_count(&self) -> u32 {
        self.draw_calls
    }

    /// Number of dispatches recorded so far.
    pub fn dispatch_count(&self) -> u32 {
        self.dispatches
    }
}

fn apply_clear(texture: &Texture, clear: ClearValue) {
    match clear {
        ClearValue::Color(color) => texture.clear(color),
        ClearValue::DepthStencil { depth, .. } => texture.clear(Vec4::splat(depth)),
    }
}

/// Execute a compiled graph on the device's virtual queues.
pub(crate) fn execute(graph: &FrameGraph, device: &Device) {
    if graph.result() != GraphResult::Success {
        log::debug!(
            "skipping execution of graph '{}' with result {:?}",
            graph.name(),
            graph.result()
        );
        return;
    }
    let started = Instant::now();

    for (timeline, value) in &graph.waits {
        if timeline.wait_for_signal(*value, device.sync_timeout()) == WaitResult::Timeout {
            log::warn!(
                "graph '{}': wait for timeline {} value {} timed out",
                graph.name(),
                timeline.id(),
                value
            );
        }
    }

    // Imported and swapchain nodes resolve to their caller-owned backing;
    // multi-buffered imports resolve through their provider by frame index.
    let frame = device.current_frame();
    let mut resolved: HashMap<u32, ImportedResource> = HashMap::new();
    for (index, node) in graph.registry.iter() {
        if node.kind().is_transient() {
            continue;
        }
        let backing = match &node.provider {
            Some(provider) => provider(frame),
            None => match &node.imported {
                Some(backing) => backing.clone(),
                None => continue,
            },
        };
        resolved.insert(index, backing);
    }

    // Bindless indices handed out to task callbacks. Stable per resource for
    // the whole execution, released into the retirement queue afterwards.
    let mut bindings: HashMap<(u32, BindingKind), u32> = HashMap::new();

    for batch in graph.batches() {
        for &semaphore in batch.wait_semaphores() {
            log::trace!("queue {} waits on semaphore {}", batch.queue(), semaphore);
        }

        for &group_index in batch.group_indices() {
            let group = &graph.groups()[group_index];

            for &resource_index in &graph.creates[group_index] {
                let node = graph.registry.node(resource_index);
                let backing = match node.kind() {
                    ResourceKind::TransientTexture => {
                        let Some(desc) = node.texture_desc.clone() else {
                            continue;
                        };
                        let desc = if desc.label.is_some() {
                            desc
                        } else {
                            desc.with_label(node.name())
                        };
                        match device.create_texture(desc) {
                            Ok(texture) => {
                                if let Some(clear) = node.clear {
                                    apply_clear(&texture, clear);
                                }
                                ImportedResource::Texture(texture)
                            }
                            Err(err) => {
                                log::error!("transient '{}': {}", node.name(), err);
                                continue;
                            }
                        }
                    }
                    ResourceKind::TransientBuffer => {
                        let Some(desc) = node.buffer_desc.clone() else {
                            continue;
                        };
                        match device.create_buffer(desc) {
                            Ok(buffer) => ImportedResource::Buffer(buffer),
                            Err(err) => {
                                log::error!("transient '{}': {}", node.name(), err);
                                continue;
                            }
                        }
                    }
                    _ => continue,
                };
                resolved.insert(resource_index, backing);
            }

            for &(clear_group, resource_index) in &graph.imported_clears {
                if clear_group != group_index {
                    continue;
                }
                let node = graph.registry.node(resource_index);
                if let (Some(ImportedResource::Texture(texture)), Some(clear)) =
                    (resolved.get(&resource_index), node.clear)
                {
                    apply_clear(texture, clear);
                }
            }

            let barriers = graph.barrier_set(group_index);
            if !barriers.acquire.is_empty() {
                log::trace!(
                    "group {}: {} acquire barriers",
                    group_index,
                    barriers.acquire.len()
                );
            }

            for &pass_index in group.pass_indices() {
                let pass = &graph.passes[pass_index];
                let mut list =
                    CommandList::new(pass, &graph.registry, &resolved, device, &mut bindings);
                if let Some(task) = &pass.task {
                    task.run(&mut list);
                }
                log::trace!(
                    "executed pass '{}': {} draws, {} dispatches",
                    pass.name(),
                    list.draw_call_count(),
                    list.dispatch_count()
                );
            }

            if !barriers.release.is_empty() {
                log::trace!(
                    "group {}: {} release barriers",
                    group_index,
                    barriers.release.len()
                );
            }

            for &resource_index in &graph.frees[group_index] {
                resolved.remove(&resource_index);
            }
        }

        for &semaphore in batch.signal_semaphores() {
            log::trace!("queue {} signals semaphore {}", batch.queue(), semaphore);
        }
        device.record_submission(batch.queue(), batch.group_indices().len());
    }

    for ((_, kind), index) in bindings.drain() {
        device.release_binding_index(kind, index);
    }

    for (timeline, value) in &graph.signals {
        timeline.advance_to(*value);
    }
    graph.record_execute_time(started.elapsed());
}
