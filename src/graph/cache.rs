//! Compiled graph caching.
//!
//! Rebuilding the same graph every frame wastes the whole compile pipeline on
//! work that produces an identical schedule. A caller that knows its graph
//! structure is stable derives a [`CacheKey`] once and checks
//! [`Device::cached_frame_graph`](crate::device::Device::cached_frame_graph)
//! before building; on a hit the stored [`FrameGraph`] is returned directly
//! and only its task callbacks run again.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::graph::compiled::FrameGraph;

/// Key identifying a graph structure across frames.
///
/// Two builds with the same key are assumed to produce the same schedule; the
/// caller owns that guarantee and must derive a new key when the structure
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    /// Derive a key from a stable structural label.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        label.hash(&mut hasher);
        Self(hasher.finish())
    }

    /// Raw key value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Device-owned store of compiled graphs.
#[derive(Debug, Default)]
pub struct GraphCache {
    graphs: HashMap<CacheKey, Arc<FrameGraph>>,
    hits: u64,
    misses: u64,
}

impl GraphCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Look up a compiled graph, counting the hit or miss.
    pub(crate) fn get(&mut self, key: &CacheKey) -> Option<Arc<FrameGraph>> {
        match self.graphs.get(key) {
            Some(graph) => {
                self.hits += 1;
                log::trace!("frame graph cache hit for {:?}", key);
                Some(Arc::clone(graph))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a compiled graph under its key.
    pub(crate) fn insert(&mut self, key: CacheKey, graph: Arc<FrameGraph>) {
        self.graphs.insert(key, graph);
    }

    /// Number of lookups that found a graph.
    pub fn hit_count(&self) -> u64 {
        self.hits
    }

    /// Number of lookups that missed.
    pub fn miss_count(&self) -> u64 {
        self.misses
    }

    /// Number of cached graphs.
    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Drop every cached graph.
    pub(crate) fn clear(&mut self) {
        self.graphs.clear();
    }
}
