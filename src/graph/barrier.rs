//! Barrier and queue-transfer synthesis.
//!
//! After grouping, every resource has an ordered list of (group, stage)
//! touches. Walking that list yields the layout transitions, access-mask
//! pairs and queue-ownership transfers each pass group must execute before
//! (acquire) and after (release) its work. The batcher turns the recorded
//! cross-queue dependencies into inter-queue semaphores.

use crate::graph::group::PassGroup;
use crate::graph::pass::PassNode;
use crate::graph::registry::ResourceRegistry;
use crate::graph::resource::ResourceStage;

/// Image layout a resource must be in for a given usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents undefined; the initial state of every resource.
    Undefined,
    /// General layout for storage access.
    General,
    /// Optimal for color attachment writes.
    ColorAttachmentOptimal,
    /// Optimal for depth/stencil attachment writes.
    DepthStencilAttachmentOptimal,
    /// Optimal for shader sampling.
    ShaderReadOnlyOptimal,
    /// Optimal as a copy source.
    TransferSrcOptimal,
    /// Optimal as a copy destination.
    TransferDstOptimal,
    /// Ready for presentation.
    PresentSrc,
}

bitflags::bitflags! {
    /// Memory access mask for barrier source/destination scopes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMask: u32 {
        /// Color attachment writes.
        const COLOR_ATTACHMENT_WRITE = 1 << 0;
        /// Depth/stencil attachment writes.
        const DEPTH_STENCIL_WRITE = 1 << 1;
        /// Shader reads (sampled or storage).
        const SHADER_READ = 1 << 2;
        /// Shader storage writes.
        const SHADER_WRITE = 1 << 3;
        /// Uniform reads.
        const UNIFORM_READ = 1 << 4;
        /// Transfer reads.
        const TRANSFER_READ = 1 << 5;
        /// Transfer writes.
        const TRANSFER_WRITE = 1 << 6;
    }
}

/// A synthesized barrier between two consecutive users of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBarrier {
    /// Registry index of the resource being transitioned.
    pub resource_index: u32,
    /// Layout before the transition.
    pub old_layout: ImageLayout,
    /// Layout after the transition.
    pub new_layout: ImageLayout,
    /// Accesses that must complete before the transition.
    pub src_access: AccessMask,
    /// Accesses that wait on the transition.
    pub dst_access: AccessMask,
    /// Source queue for an ownership transfer, if any.
    pub src_queue: Option<usize>,
    /// Destination queue for an ownership transfer, if any.
    pub dst_queue: Option<usize>,
}

impl ResourceBarrier {
    /// Check if this barrier transfers queue ownership.
    pub fn is_queue_transfer(&self) -> bool {
        self.src_queue.is_some() && self.dst_queue.is_some() && self.src_queue != self.dst_queue
    }
}

/// Barriers a pass group executes around its work.
#[derive(Debug, Default, Clone)]
pub struct BarrierSet {
    /// Executed before the group's passes (layout transitions, queue
    /// acquires).
    pub acquire: Vec<ResourceBarrier>,
    /// Executed after the group's passes (queue releases).
    pub release: Vec<ResourceBarrier>,
}

impl BarrierSet {
    /// Total number of barriers in the set.
    pub fn len(&self) -> usize {
        self.acquire.len() + self.release.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.acquire.is_empty() && self.release.is_empty()
    }
}

/// A cross-queue ordering requirement discovered during synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossQueueDependency {
    /// Group index that produces the resource.
    pub producer_group: usize,
    /// Group index that consumes it on another queue.
    pub consumer_group: usize,
    /// Registry index of the resource crossing queues.
    pub resource_index: u32,
}

/// Output of barrier synthesis over all pass groups.
#[derive(Debug, Default)]
pub struct SynthesisOutput {
    /// One barrier set per pass group.
    pub barrier_sets: Vec<BarrierSet>,
    /// Ordering requirements the batcher must satisfy with semaphores.
    pub cross_queue_deps: Vec<CrossQueueDependency>,
    /// Transient resources created before each group runs.
    pub creates: Vec<Vec<u32>>,
    /// Transient resources freed after each group runs.
    pub frees: Vec<Vec<u32>>,
}

#[derive(Debug, Clone, Copy)]
struct ResourceState {
    layout: ImageLayout,
    access: AccessMask,
    queue: usize,
    group: usize,
}

/// Synthesize barriers, queue transfers and transient lifetimes.
///
/// `queue_of_group` maps each group to the device queue it runs on; groups are
/// assumed to be in topological order.
pub(crate) fn synthesize(
    groups: &[PassGroup],
    passes: &[PassNode],
    registry: &ResourceRegistry,
    queue_of_group: &[usize],
) -> SynthesisOutput {
    let mut output = SynthesisOutput {
        barrier_sets: vec![BarrierSet::default(); groups.len()],
        cross_queue_deps: Vec::new(),
        creates: vec![Vec::new(); groups.len()],
        frees: vec![Vec::new(); groups.len()],
    };

    // Ordered (group, stage) touches per resource.
    let mut touches: Vec<Vec<(usize, ResourceStage)>> = vec![Vec::new(); registry.len()];
    for (group_index, group) in groups.iter().enumerate() {
        for &pass_index in &group.passes {
            let pass = &passes[pass_index];
            for (handle, stage) in pass.inputs.iter().chain(pass.outputs.iter()) {
                touches[handle.index as usize].push((group_index, *stage));
            }
        }
    }

    for (resource_index, resource_touches) in touches.iter().enumerate() {
        if resource_touches.is_empty() {
            continue;
        }
        let resource_index = resource_index as u32;
        let node = registry.node(resource_index);

        if node.kind().is_transient() {
            let first_group = resource_touches[0].0;
            let last_group = resource_touches[resource_touches.len() - 1].0;
            output.creates[first_group].push(resource_index);
            output.frees[last_group].push(resource_index);
        }

        let mut state: Option<ResourceState> = None;
        for &(group_index, stage) in resource_touches {
            let new_layout = stage.image_layout();
            let new_access = stage.access_mask();
            let queue = queue_of_group[group_index];

            match state {
                None => {
                    // First touch: transition out of Undefined.
                    output.barrier_sets[group_index].acquire.push(ResourceBarrier {
                        resource_index,
                        old_layout: ImageLayout::Undefined,
                        new_layout,
                        src_access: AccessMask::empty(),
                        dst_access: new_access,
                        src_queue: None,
                        dst_queue: None,
                    });
                }
                Some(prev) => {
                    if prev.queue != queue {
                        // Queue ownership transfer: release on the source
                        // queue, acquire on the destination queue.
                        let barrier = ResourceBarrier {
                            resource_index,
                            old_layout: prev.layout,
                            new_layout,
                            src_access: prev.access,
                            dst_access: new_access,
                            src_queue: Some(prev.queue),
                            dst_queue: Some(queue),
                        };
                        output.barrier_sets[prev.group].release.push(barrier.clone());
                        output.barrier_sets[group_index].acquire.push(barrier);
                        output.cross_queue_deps.push(CrossQueueDependency {
                            producer_group: prev.group,
                            consumer_group: group_index,
                            resource_index,
                        });
                    } else if prev.layout != new_layout || prev.access != new_access {
                        output.barrier_sets[group_index].acquire.push(ResourceBarrier {
                            resource_index,
                            old_layout: prev.layout,
                            new_layout,
                            src_access: prev.access,
                            dst_access: new_access,
                            src_queue: None,
                            dst_queue: None,
                        });
                    }
                    // Same layout, access and queue: no barrier. Consecutive
                    // readers are ordered by batching alone.
                }
            }

            state = Some(ResourceState {
                layout: new_layout,
                access: new_access,
                queue,
                group: group_index,
            });
        }
    }

    output
}
