//! Bindless descriptor index allocation.
//!
//! Each binding kind owns an index table: a dense mapping from integer index
//! to resource id plus a free list. Indices are stable for the lifetime of the
//! acquisition and are usable directly in shader-visible descriptor tables.
//!
//! Releases are deferred: a freed index first enters a retirement queue keyed
//! by the device's monotonic frame counter, and is only recycled once every
//! frame-in-flight that might still reference it has completed. The tables are
//! owned by an explicit [`Device`](crate::device::Device), never global state.

use parking_lot::Mutex;

/// Kinds of shader-visible binding tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Sampled image table.
    SampledImage,
    /// Storage image table.
    StorageImage,
    /// Storage buffer table.
    StorageBuffer,
    /// Sampler table.
    Sampler,
}

const BINDING_KIND_COUNT: usize = 4;

impl BindingKind {
    fn table_index(self) -> usize {
        match self {
            Self::SampledImage => 0,
            Self::StorageImage => 1,
            Self::StorageBuffer => 2,
            Self::Sampler => 3,
        }
    }
}

#[derive(Debug)]
struct RetiredIndex {
    /// Frame counter value at release time.
    retired_frame: u64,
    index: u32,
}

#[derive(Debug, Default)]
struct IndexTable {
    /// Slot -> resource id. `None` marks a slot that is free or retired.
    slots: Vec<Option<u64>>,
    /// Indices ready for immediate reuse.
    free: Vec<u32>,
    /// Indices waiting out the frames-in-flight window.
    retired: Vec<RetiredIndex>,
}

impl IndexTable {
    fn acquire(&mut self, resource_id: u64) -> u32 {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(resource_id);
            index
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some(resource_id));
            index
        }
    }

    fn release(&mut self, index: u32, current_frame: u64) -> bool {
        match self.slots.get_mut(index as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.retired.push(RetiredIndex {
                    retired_frame: current_frame,
                    index,
                });
                true
            }
            _ => false,
        }
    }

    fn collect(&mut self, current_frame: u64, frames_in_flight: u64) {
        let mut kept = Vec::new();
        for retired in self.retired.drain(..) {
            if current_frame.saturating_sub(retired.retired_frame) >= frames_in_flight {
                self.free.push(retired.index);
            } else {
                kept.push(retired);
            }
        }
        self.retired = kept;
    }

    fn flush(&mut self) {
        for retired in self.retired.drain(..) {
            self.free.push(retired.index);
        }
    }

    fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Per-device bindless index tables with deferred recycling.
#[derive(Debug, Default)]
pub struct BindlessAllocator {
    tables: Mutex<[IndexTable; BINDING_KIND_COUNT]>,
}

impl BindlessAllocator {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a stable index for `resource_id` in the given table.
    pub fn acquire(&self, kind: BindingKind, resource_id: u64) -> u32 {
        let index = self.tables.lock()[kind.table_index()].acquire(resource_id);
        log::trace!("bindless acquire {:?} index {}", kind, index);
        index
    }

    /// Release an index back to the table.
    ///
    /// The index enters the retirement queue stamped with `current_frame` and
    /// is not reused until the frames-in-flight window has passed. Returns
    /// `false` when the index does not exist for the binding kind.
    pub fn release(&self, kind: BindingKind, index: u32, current_frame: u64) -> bool {
        let released = self.tables.lock()[kind.table_index()].release(index, current_frame);
        if released {
            log::trace!("bindless release {:?} index {}", kind, index);
        }
        released
    }

    /// Recycle retired indices that have cleared the frames-in-flight window.
    ///
    /// Called once per frame by [`Device::update`](crate::device::Device::update).
    pub fn collect(&self, current_frame: u64, frames_in_flight: u64) {
        for table in self.tables.lock().iter_mut() {
            table.collect(current_frame, frames_in_flight);
        }
    }

    /// Recycle every retired index immediately.
    ///
    /// Only valid once the device is idle (no frames in flight).
    pub fn flush(&self) {
        for table in self.tables.lock().iter_mut() {
            table.flush();
        }
    }

    /// Resource id currently bound at `index`, if any.
    pub fn resource_at(&self, kind: BindingKind, index: u32) -> Option<u64> {
        self.tables.lock()[kind.table_index()]
            .slots
            .get(index as usize)
            .copied()
            .flatten()
    }

    /// Number of live (acquired, unreleased) indices in the table.
    pub fn active_count(&self, kind: BindingKind) -> usize {
        self.tables.lock()[kind.table_index()].active_count()
    }

    /// Number of indices waiting in the retirement queue.
    pub fn retired_count(&self, kind: BindingKind) -> usize {
        self.tables.lock()[kind.table_index()].retired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_dense_indices() {
        let allocator = BindlessAllocator::new();
        assert_eq!(allocator.acquire(BindingKind::SampledImage, 100), 0);
        assert_eq!(allocator.acquire(BindingKind::SampledImage, 101), 1);
        // Tables of different kinds are independent.
        assert_eq!(allocator.acquire(BindingKind::StorageBuffer, 200), 0);
        assert_eq!(allocator.active_count(BindingKind::SampledImage), 2);
    }

    #[test]
    fn test_release_defers_reuse() {
        let allocator = BindlessAllocator::new();
        let index = allocator.acquire(BindingKind::StorageImage, 7);
        assert!(allocator.release(BindingKind::StorageImage, index, 10));

        // Not yet recycled: the next acquire must not hand the index back.
        allocator.collect(11, 3);
        assert_eq!(allocator.retired_count(BindingKind::StorageImage), 1);
        let next = allocator.acquire(BindingKind::StorageImage, 8);
        assert_ne!(next, index);

        // After the frames-in-flight window the index comes back.
        allocator.collect(13, 3);
        assert_eq!(allocator.retired_count(BindingKind::StorageImage), 0);
        assert_eq!(allocator.acquire(BindingKind::StorageImage, 9), index);
    }

    #[test]
    fn test_release_unknown_index() {
        let allocator = BindlessAllocator::new();
        assert!(!allocator.release(BindingKind::Sampler, 4, 0));

        let index = allocator.acquire(BindingKind::Sampler, 1);
        assert!(allocator.release(BindingKind::Sampler, index, 0));
        // Double release of the same index is also unknown.
        assert!(!allocator.release(BindingKind::Sampler, index, 0));
    }

    #[test]
    fn test_flush_recycles_everything() {
        let allocator = BindlessAllocator::new();
        let a = allocator.acquire(BindingKind::SampledImage, 1);
        let b = allocator.acquire(BindingKind::SampledImage, 2);
        allocator.release(BindingKind::SampledImage, a, 0);
        allocator.release(BindingKind::SampledImage, b, 0);

        allocator.flush();
        assert_eq!(allocator.retired_count(BindingKind::SampledImage), 0);
        // Both indices are reusable immediately.
        let x = allocator.acquire(BindingKind::SampledImage, 3);
        let y = allocator.acquire(BindingKind::SampledImage, 4);
        let mut reused = [x, y];
        reused.sort_unstable();
        assert_eq!(reused, [a.min(b), a.max(b)]);
    }

    #[test]
    fn test_resource_lookup() {
        let allocator = BindlessAllocator::new();
        let index = allocator.acquire(BindingKind::StorageBuffer, 42);
        assert_eq!(allocator.resource_at(BindingKind::StorageBuffer, index), Some(42));
        allocator.release(BindingKind::StorageBuffer, index, 0);
        assert_eq!(allocator.resource_at(BindingKind::StorageBuffer, index), None);
    }
}
