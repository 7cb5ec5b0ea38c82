//! Pass grouping.
//!
//! Independent graphics passes that render to the same attachment set are
//! merged into one pass group and executed as subpasses of a single render
//! pass. The transform is purely an efficiency measure: merging never changes
//! externally observable results, so passes with any direct or transitive
//! dependency, or on different queues, are never merged.
//!
//! Eligibility is target + format + extent equality. Finer heuristics
//! (sample counts, render areas) can be layered on top without changing the
//! contract.

use crate::graph::analyze::Analysis;
use crate::graph::pass::{PassKind, PassNode};
use crate::graph::registry::ResourceRegistry;
use crate::graph::resource::ResourceStage;
use crate::types::{Extent2d, TextureFormat};

/// Signature deciding subpass-merge eligibility.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AttachmentSignature {
    /// Sorted registry indices of the attachments.
    targets: Vec<u32>,
    formats: Vec<TextureFormat>,
    extent: Option<Extent2d>,
}

/// One or more passes executed as a unit.
///
/// Graphics groups with several passes run them as subpasses over a shared
/// attachment set. Compute and transfer groups always hold a single pass.
#[derive(Debug)]
pub struct PassGroup {
    /// Indices into the build's pass array, in execution order.
    pub(crate) passes: Vec<usize>,
    pub(crate) kind: PassKind,
    /// Registry indices of the group's attachments (graphics only).
    pub(crate) attachments: Vec<u32>,
}

impl PassGroup {
    /// Pass indices executed by this group, in order.
    pub fn pass_indices(&self) -> &[usize] {
        &self.passes
    }

    /// The queue-kind this group runs on.
    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Registry indices of the attachments this group renders to.
    pub fn attachments(&self) -> &[u32] {
        &self.attachments
    }

    /// Number of subpasses in this group.
    pub fn subpass_count(&self) -> usize {
        self.passes.len()
    }
}

fn attachment_signature(pass: &PassNode, registry: &ResourceRegistry) -> AttachmentSignature {
    let mut targets: Vec<u32> = pass
        .outputs
        .iter()
        .filter(|(_, stage)| {
            matches!(
                stage,
                ResourceStage::ColorAttachmentWrite | ResourceStage::DepthStencilWrite
            )
        })
        .map(|(handle, _)| handle.index)
        .collect();
    targets.sort_unstable();

    let formats = targets
        .iter()
        .filter_map(|&index| registry.node(index).texture_desc.as_ref())
        .map(|desc| desc.format)
        .collect();
    let extent = targets
        .first()
        .and_then(|&index| registry.node(index).texture_desc.as_ref())
        .map(|desc| desc.size);

    AttachmentSignature {
        targets,
        formats,
        extent,
    }
}

/// Check whether merging `pass` into `group` would hide a data dependency.
///
/// Because only the immediately preceding group is ever a merge candidate,
/// any transitive dependency must route through a pass that already formed a
/// group in between, so a direct-edge check over the two resource sets is
/// sufficient. Writes to the shared attachment set itself do not block the
/// merge: subpass order preserves them.
fn has_dependency(
    passes: &[PassNode],
    group: &PassGroup,
    pass_index: usize,
    shared_targets: &[u32],
) -> bool {
    let pass = &passes[pass_index];
    group.passes.iter().any(|&member_index| {
        let member = &passes[member_index];
        let member_writes = |r: u32| {
            member
                .outputs
                .iter()
                .any(|(h, s)| h.index == r && s.is_write())
        };
        let member_reads = |r: u32| member.inputs.iter().any(|(h, s)| h.index == r && s.is_read());

        for (handle, stage) in pass.inputs.iter().chain(pass.outputs.iter()) {
            let r = handle.index;
            if stage.is_read() && member_writes(r) {
                return true;
            }
            if stage.is_write() && member_reads(r) {
                return true;
            }
            if stage.is_write() && member_writes(r) && !shared_targets.contains(&r) {
                return true;
            }
        }
        false
    })
}

/// Merge eligible topologically ordered passes into groups.
pub(crate) fn group_passes(
    analysis: &Analysis,
    passes: &[PassNode],
    registry: &ResourceRegistry,
) -> Vec<PassGroup> {
    let mut groups: Vec<PassGroup> = Vec::new();
    let mut last_signature: Option<AttachmentSignature> = None;

    for &pass_index in &analysis.order {
        let pass = &passes[pass_index];

        if pass.kind == PassKind::Graphics {
            let signature = attachment_signature(pass, registry);
            // Only the immediately preceding group is a merge candidate;
            // skipping over intermediate groups could reorder execution.
            if let Some(group) = groups.last_mut() {
                let mergeable = group.kind == PassKind::Graphics
                    && last_signature.as_ref() == Some(&signature)
                    && !signature.targets.is_empty()
                    && !has_dependency(passes, group, pass_index, &signature.targets);
                if mergeable {
                    log::trace!(
                        "merging pass '{}' into group of {} subpasses",
                        pass.name,
                        group.passes.len()
                    );
                    group.passes.push(pass_index);
                    continue;
                }
            }
            let attachments = signature.targets.clone();
            last_signature = Some(signature);
            groups.push(PassGroup {
                passes: vec![pass_index],
                kind: PassKind::Graphics,
                attachments,
            });
        } else {
            last_signature = None;
            groups.push(PassGroup {
                passes: vec![pass_index],
                kind: pass.kind,
                attachments: Vec::new(),
            });
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::analyze::analyze;
    use crate::graph::resource::ResourceNode;
    use crate::types::{TextureDescriptor, TextureUsage};

    fn registry_with_targets(count: usize) -> (ResourceRegistry, Vec<crate::ResourceHandle>) {
        let mut registry = ResourceRegistry::new(1);
        let handles = (0..count)
            .map(|i| {
                let mut node = ResourceNode::transient_texture(
                    format!("target_{i}"),
                    TextureDescriptor::new_2d(
                        32,
                        32,
                        TextureFormat::Rgba8Unorm,
                        TextureUsage::RENDER_ATTACHMENT,
                    ),
                );
                node.essential = true;
                registry.add(node)
            })
            .collect();
        (registry, handles)
    }

    fn graphics_pass(name: &str, target: crate::ResourceHandle) -> PassNode {
        let mut pass = PassNode::new(name.into(), PassKind::Graphics);
        pass.outputs
            .push((target, ResourceStage::ColorAttachmentWrite));
        pass
    }

    #[test]
    fn test_independent_same_target_merged() {
        let (registry, handles) = registry_with_targets(1);
        let passes = vec![
            graphics_pass("ui", handles[0]),
            graphics_pass("overlay", handles[0]),
        ];

        let analysis = analyze(&passes, &registry).unwrap();
        let groups = group_passes(&analysis, &passes, &registry);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].subpass_count(), 2);
    }

    #[test]
    fn test_different_targets_not_merged() {
        let (registry, handles) = registry_with_targets(2);
        let passes = vec![
            graphics_pass("a", handles[0]),
            graphics_pass("b", handles[1]),
        ];

        let analysis = analyze(&passes, &registry).unwrap();
        let groups = group_passes(&analysis, &passes, &registry);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_dependent_passes_not_merged() {
        let (mut registry, handles) = registry_with_targets(1);
        let data = registry.add(ResourceNode::transient_texture(
            "data".into(),
            TextureDescriptor::new_2d(
                32,
                32,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::SAMPLED,
            ),
        ));

        // Writer produces `data`, reader samples it: the two are ordered and
        // must stay in separate groups.
        let mut writer = graphics_pass("writer", handles[0]);
        writer.outputs.push((data, ResourceStage::ColorAttachmentWrite));
        let mut reader = graphics_pass("reader", handles[0]);
        reader.inputs.push((data, ResourceStage::FragmentSampled));

        let passes = vec![writer, reader];
        let analysis = analyze(&passes, &registry).unwrap();
        let groups = group_passes(&analysis, &passes, &registry);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_compute_between_graphics_blocks_merge() {
        let (registry, handles) = registry_with_targets(1);
        let mut passes = vec![graphics_pass("a", handles[0])];
        let mut compute = PassNode::new("sim".into(), PassKind::Compute);
        compute
            .outputs
            .push((handles[0], ResourceStage::ComputeStorageWrite));
        passes.push(compute);
        passes.push(graphics_pass("b", handles[0]));

        let analysis = analyze(&passes, &registry).unwrap();
        let groups = group_passes(&analysis, &passes, &registry);
        // Writer-to-writer ordering keeps all three separate.
        assert_eq!(groups.len(), 3);
    }
}
