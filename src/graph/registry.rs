//! Dense storage for the resource nodes of one graph build.

use crate::graph::resource::{ResourceHandle, ResourceNode};

/// Arena of resource nodes with generation-checked handles.
///
/// Each build stamps its registry with a fresh epoch; handles minted by a
/// previous build carry a different generation and fail validation instead of
/// dereferencing a reused slot.
#[derive(Debug)]
pub struct ResourceRegistry {
    epoch: u32,
    nodes: Vec<ResourceNode>,
}

impl ResourceRegistry {
    /// Create an empty registry stamped with `epoch`.
    pub(crate) fn new(epoch: u32) -> Self {
        Self {
            epoch,
            nodes: Vec::new(),
        }
    }

    /// The epoch handles from this registry carry.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Add a node, returning its handle.
    pub(crate) fn add(&mut self, node: ResourceNode) -> ResourceHandle {
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        ResourceHandle {
            index,
            generation: self.epoch,
        }
    }

    /// Resolve a handle, rejecting stale or foreign generations.
    pub fn get(&self, handle: ResourceHandle) -> Option<&ResourceNode> {
        if handle.generation != self.epoch {
            return None;
        }
        self.nodes.get(handle.index as usize)
    }

    pub(crate) fn get_mut(&mut self, handle: ResourceHandle) -> Option<&mut ResourceNode> {
        if handle.generation != self.epoch {
            return None;
        }
        self.nodes.get_mut(handle.index as usize)
    }

    /// Number of declared nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no nodes have been declared.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ResourceNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (i as u32, n))
    }

    /// Node at a raw index, without generation validation.
    pub(crate) fn node(&self, index: u32) -> &ResourceNode {
        &self.nodes[index as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TextureDescriptor, TextureFormat, TextureUsage};

    fn texture_node(name: &str) -> ResourceNode {
        ResourceNode::transient_texture(
            name.into(),
            TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm, TextureUsage::SAMPLED),
        )
    }

    #[test]
    fn test_add_and_get() {
        let mut registry = ResourceRegistry::new(7);
        let handle = registry.add(texture_node("a"));
        assert_eq!(handle.index(), 0);
        assert_eq!(handle.generation(), 7);
        assert_eq!(registry.get(handle).unwrap().name(), "a");
    }

    #[test]
    fn test_foreign_generation_rejected() {
        let mut old = ResourceRegistry::new(1);
        let stale = old.add(texture_node("old"));

        let mut fresh = ResourceRegistry::new(2);
        fresh.add(texture_node("new"));

        // Index 0 exists in both, but the stale generation must not resolve.
        assert!(fresh.get(stale).is_none());
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let registry = ResourceRegistry::new(3);
        let bogus = ResourceHandle {
            index: 9,
            generation: 3,
        };
        assert!(registry.get(bogus).is_none());
    }
}
