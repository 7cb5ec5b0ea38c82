//! Submission batching.
//!
//! Ordered pass groups are partitioned into per-queue batches. Consecutive
//! groups on the same queue share a batch; a queue change closes the current
//! batch. Cross-queue dependencies recorded by barrier synthesis become
//! semaphore signal/wait pairs at batch boundaries. A device configured with
//! a single queue never changes queues, so everything collapses into one
//! batch chain and no semaphores are synthesized.

use std::collections::HashMap;

use crate::graph::barrier::CrossQueueDependency;
use crate::graph::group::PassGroup;

/// A batch of pass groups submitted to one queue in a single submission.
#[derive(Debug, Clone)]
pub struct SubmissionBatch {
    pub(crate) queue: usize,
    /// Group indices executed by this batch, in order.
    pub(crate) groups: Vec<usize>,
    /// Semaphores this batch waits on before executing.
    pub(crate) wait_semaphores: Vec<u64>,
    /// Semaphores this batch signals on completion.
    pub(crate) signal_semaphores: Vec<u64>,
}

impl SubmissionBatch {
    /// Device queue index this batch is submitted to.
    pub fn queue(&self) -> usize {
        self.queue
    }

    /// Group indices in submission order.
    pub fn group_indices(&self) -> &[usize] {
        &self.groups
    }

    /// Semaphore ids waited on.
    pub fn wait_semaphores(&self) -> &[u64] {
        &self.wait_semaphores
    }

    /// Semaphore ids signaled.
    pub fn signal_semaphores(&self) -> &[u64] {
        &self.signal_semaphores
    }
}

/// Partition groups into batches and wire cross-queue semaphores.
pub(crate) fn batch_groups(
    groups: &[PassGroup],
    queue_of_group: &[usize],
    cross_queue_deps: &[CrossQueueDependency],
    next_semaphore_id: &mut u64,
) -> Vec<SubmissionBatch> {
    let mut batches: Vec<SubmissionBatch> = Vec::new();
    let mut batch_of_group = vec![0usize; groups.len()];

    for group_index in 0..groups.len() {
        let queue = queue_of_group[group_index];
        let open = batches.last().map(|b| b.queue) == Some(queue);
        if !open {
            batches.push(SubmissionBatch {
                queue,
                groups: Vec::new(),
                wait_semaphores: Vec::new(),
                signal_semaphores: Vec::new(),
            });
        }
        let batch_index = batches.len() - 1;
        batches[batch_index].groups.push(group_index);
        batch_of_group[group_index] = batch_index;
    }

    // One semaphore per producer/consumer batch pair, shared by all resources
    // crossing that boundary.
    let mut pair_semaphores: HashMap<(usize, usize), u64> = HashMap::new();
    for dep in cross_queue_deps {
        let producer = batch_of_group[dep.producer_group];
        let consumer = batch_of_group[dep.consumer_group];
        if producer == consumer {
            continue;
        }
        pair_semaphores.entry((producer, consumer)).or_insert_with(|| {
            let id = *next_semaphore_id;
            *next_semaphore_id += 1;
            batches[producer].signal_semaphores.push(id);
            batches[consumer].wait_semaphores.push(id);
            id
        });
    }

    log::trace!(
        "batched {} groups into {} batches ({} semaphores)",
        groups.len(),
        batches.len(),
        pair_semaphores.len()
    );
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::pass::PassKind;

    fn group(kind: PassKind) -> PassGroup {
        PassGroup {
            passes: vec![0],
            kind,
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_single_queue_collapses_to_one_batch() {
        let groups = vec![
            group(PassKind::Graphics),
            group(PassKind::Compute),
            group(PassKind::Transfer),
        ];
        // All kinds mapped to queue 0.
        let queue_of_group = vec![0, 0, 0];
        let mut sem = 0;
        let batches = batch_groups(&groups, &queue_of_group, &[], &mut sem);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].group_indices(), &[0, 1, 2]);
        assert_eq!(sem, 0);
    }

    #[test]
    fn test_queue_change_splits_batches() {
        let groups = vec![
            group(PassKind::Graphics),
            group(PassKind::Compute),
            group(PassKind::Graphics),
        ];
        let queue_of_group = vec![0, 1, 0];
        let mut sem = 0;
        let batches = batch_groups(&groups, &queue_of_group, &[], &mut sem);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].queue(), 0);
        assert_eq!(batches[1].queue(), 1);
        assert_eq!(batches[2].queue(), 0);
    }

    #[test]
    fn test_cross_queue_dependency_adds_semaphore() {
        let groups = vec![group(PassKind::Graphics), group(PassKind::Compute)];
        let queue_of_group = vec![0, 1];
        let deps = vec![CrossQueueDependency {
            producer_group: 0,
            consumer_group: 1,
            resource_index: 0,
        }];
        let mut sem = 10;
        let batches = batch_groups(&groups, &queue_of_group, &deps, &mut sem);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].signal_semaphores(), &[10]);
        assert_eq!(batches[1].wait_semaphores(), &[10]);
        assert_eq!(sem, 11);
    }

    #[test]
    fn test_semaphores_deduped_per_batch_pair() {
        let groups = vec![group(PassKind::Graphics), group(PassKind::Compute)];
        let queue_of_group = vec![0, 1];
        let deps = vec![
            CrossQueueDependency {
                producer_group: 0,
                consumer_group: 1,
                resource_index: 0,
            },
            CrossQueueDependency {
                producer_group: 0,
                consumer_group: 1,
                resource_index: 1,
            },
        ];
        let mut sem = 0;
        let batches = batch_groups(&groups, &queue_of_group, &deps, &mut sem);
        assert_eq!(batches[0].signal_semaphores().len(), 1);
        assert_eq!(batches[1].wait_semaphores().len(), 1);
    }
}
