//! Dependency analysis: culling, cycle detection and topological ordering.
//!
//! A pass is live when it feeds, directly or through a chain of resource
//! reads, an essential output (a swapchain write or a resource flagged
//! essential). Everything else is culled, and a resource touched only by
//! culled passes is never instantiated. Ordering constraints are derived from
//! write-then-read relationships; a cycle among live passes aborts
//! compilation with a distinct error and no partial graph.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use crate::error::GraphError;
use crate::graph::pass::PassNode;
use crate::graph::registry::ResourceRegistry;

/// Result of dependency analysis over one build's passes.
#[derive(Debug)]
pub(crate) struct Analysis {
    /// Live pass indices in topological order.
    pub order: Vec<usize>,
    /// Liveness per declared pass.
    pub live: Vec<bool>,
    /// Number of passes removed by culling.
    pub culled_count: u32,
    /// Ordering edges: `edges[a]` lists passes that must run after `a`.
    pub edges: Vec<Vec<usize>>,
}

/// Analyze declared passes: cull, detect cycles, produce a topological order.
pub(crate) fn analyze(
    passes: &[PassNode],
    registry: &ResourceRegistry,
) -> Result<Analysis, GraphError> {
    let pass_count = passes.len();
    let resource_count = registry.len();

    // Writers and readers per resource, in declaration order.
    let mut writers: Vec<Vec<usize>> = vec![Vec::new(); resource_count];
    let mut readers: Vec<Vec<usize>> = vec![Vec::new(); resource_count];
    for (pass_index, pass) in passes.iter().enumerate() {
        for (handle, stage) in &pass.outputs {
            if stage.is_write() {
                writers[handle.index as usize].push(pass_index);
            }
        }
        for (handle, stage) in &pass.inputs {
            if stage.is_read() {
                readers[handle.index as usize].push(pass_index);
            }
            if stage.is_write() {
                writers[handle.index as usize].push(pass_index);
            }
        }
    }

    // Liveness: backward closure from passes writing essential resources.
    // Read-modify-write inputs count as writes here, same as in `writers`.
    let mut live = vec![false; pass_count];
    let mut worklist: Vec<usize> = Vec::new();
    for (pass_index, pass) in passes.iter().enumerate() {
        let essential = pass
            .outputs
            .iter()
            .chain(pass.inputs.iter().filter(|(_, stage)| stage.is_write()))
            .any(|(handle, _)| registry.node(handle.index).is_essential());
        if essential {
            live[pass_index] = true;
            worklist.push(pass_index);
        }
    }
    while let Some(pass_index) = worklist.pop() {
        for (handle, _) in &passes[pass_index].inputs {
            for &writer in &writers[handle.index as usize] {
                if writer != pass_index && !live[writer] {
                    live[writer] = true;
                    worklist.push(writer);
                }
            }
        }
    }
    let culled_count = live.iter().filter(|&&l| !l).count() as u32;

    // Ordering edges from write-then-read relationships, plus writer-to-writer
    // edges in declaration order to keep multiple writers deterministic.
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); pass_count];
    let mut edge_set: HashSet<(usize, usize)> = HashSet::new();
    let mut add_edge = |edges: &mut Vec<Vec<usize>>, from: usize, to: usize| {
        if from != to && edge_set.insert((from, to)) {
            edges[from].push(to);
        }
    };
    for resource_index in 0..resource_count {
        for &writer in &writers[resource_index] {
            for &reader in &readers[resource_index] {
                add_edge(&mut edges, writer, reader);
            }
        }
        for pair in writers[resource_index].windows(2) {
            add_edge(&mut edges, pair[0], pair[1]);
        }
    }

    // Kahn's algorithm over live passes. Indices are pulled smallest-first so
    // declaration order is preserved among unordered passes.
    let mut indegree = vec![0usize; pass_count];
    for (from, targets) in edges.iter().enumerate() {
        if !live[from] {
            continue;
        }
        for &to in targets {
            if live[to] {
                indegree[to] += 1;
            }
        }
    }
    let mut ready: BinaryHeap<Reverse<usize>> = (0..pass_count)
        .filter(|&i| live[i] && indegree[i] == 0)
        .map(Reverse)
        .collect();
    let mut order = Vec::with_capacity(pass_count);
    while let Some(Reverse(pass_index)) = ready.pop() {
        order.push(pass_index);
        for &to in &edges[pass_index] {
            if live[to] {
                indegree[to] -= 1;
                if indegree[to] == 0 {
                    ready.push(Reverse(to));
                }
            }
        }
    }

    let live_count = live.iter().filter(|&&l| l).count();
    if order.len() < live_count {
        log::debug!(
            "cycle detected: ordered {} of {} live passes",
            order.len(),
            live_count
        );
        return Err(GraphError::CyclicDependency);
    }

    Ok(Analysis {
        order,
        live,
        culled_count,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::pass::PassKind;
    use crate::graph::resource::{ResourceNode, ResourceStage};
    use crate::types::{TextureDescriptor, TextureFormat, TextureUsage};

    fn texture_node(name: &str, essential: bool) -> ResourceNode {
        let mut node = ResourceNode::transient_texture(
            name.into(),
            TextureDescriptor::new_2d(
                8,
                8,
                TextureFormat::Rgba8Unorm,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::SAMPLED,
            ),
        );
        node.essential = essential;
        node
    }

    struct Fixture {
        registry: ResourceRegistry,
        passes: Vec<PassNode>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: ResourceRegistry::new(1),
                passes: Vec::new(),
            }
        }

        fn resource(&mut self, name: &str, essential: bool) -> crate::ResourceHandle {
            self.registry.add(texture_node(name, essential))
        }

        fn pass(
            &mut self,
            name: &str,
            inputs: &[crate::ResourceHandle],
            outputs: &[crate::ResourceHandle],
        ) -> usize {
            let mut pass = PassNode::new(name.into(), PassKind::Graphics);
            for &handle in inputs {
                pass.inputs.push((handle, ResourceStage::FragmentSampled));
            }
            for &handle in outputs {
                pass.outputs
                    .push((handle, ResourceStage::ColorAttachmentWrite));
            }
            self.passes.push(pass);
            self.passes.len() - 1
        }
    }

    #[test]
    fn test_chain_culling_propagates() {
        // A writes X; B reads X, writes Y; Y is not essential.
        let mut fx = Fixture::new();
        let x = fx.resource("x", false);
        let y = fx.resource("y", false);
        fx.pass("a", &[], &[x]);
        fx.pass("b", &[x], &[y]);

        let analysis = analyze(&fx.passes, &fx.registry).unwrap();
        assert_eq!(analysis.culled_count, 2);
        assert!(analysis.order.is_empty());
    }

    #[test]
    fn test_essential_output_keeps_chain_live() {
        let mut fx = Fixture::new();
        let x = fx.resource("x", false);
        let y = fx.resource("y", true);
        let a = fx.pass("a", &[], &[x]);
        let b = fx.pass("b", &[x], &[y]);

        let analysis = analyze(&fx.passes, &fx.registry).unwrap();
        assert_eq!(analysis.culled_count, 0);
        assert_eq!(analysis.order, vec![a, b]);
    }

    #[test]
    fn test_partial_culling() {
        let mut fx = Fixture::new();
        let x = fx.resource("x", false);
        let y = fx.resource("y", true);
        let dead = fx.resource("dead", false);
        let a = fx.pass("a", &[], &[x]);
        let b = fx.pass("b", &[x], &[y]);
        fx.pass("c", &[x], &[dead]);

        let analysis = analyze(&fx.passes, &fx.registry).unwrap();
        assert_eq!(analysis.culled_count, 1);
        assert_eq!(analysis.order, vec![a, b]);
        assert!(!analysis.live[2]);
    }

    #[test]
    fn test_read_modify_write_of_essential_resource_is_live() {
        // The only touch of the essential resource is a read-write input.
        let mut fx = Fixture::new();
        let accum = fx.resource("accum", true);
        let mut pass = PassNode::new("accumulate".into(), PassKind::Compute);
        pass.inputs
            .push((accum, ResourceStage::ComputeStorageReadWrite));
        fx.passes.push(pass);

        let analysis = analyze(&fx.passes, &fx.registry).unwrap();
        assert_eq!(analysis.culled_count, 0);
        assert_eq!(analysis.order, vec![0]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut fx = Fixture::new();
        let x = fx.resource("x", true);
        let y = fx.resource("y", true);
        // A reads Y writes X; B reads X writes Y.
        fx.pass("a", &[y], &[x]);
        fx.pass("b", &[x], &[y]);

        assert_eq!(
            analyze(&fx.passes, &fx.registry).unwrap_err(),
            GraphError::CyclicDependency
        );
    }

    #[test]
    fn test_diamond_orders_writer_first() {
        let mut fx = Fixture::new();
        let x = fx.resource("x", false);
        let out1 = fx.resource("out1", true);
        let out2 = fx.resource("out2", true);
        let a = fx.pass("a", &[], &[x]);
        let b = fx.pass("b", &[x], &[out1]);
        let c = fx.pass("c", &[x], &[out2]);

        let analysis = analyze(&fx.passes, &fx.registry).unwrap();
        assert_eq!(analysis.order, vec![a, b, c]);
        assert!(analysis.edges[a].contains(&b));
        assert!(analysis.edges[a].contains(&c));
        assert!(!analysis.edges[b].contains(&c));
    }
}
