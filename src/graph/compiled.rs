//! The immutable compiled frame graph.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::graph::barrier::BarrierSet;
use crate::graph::batch::SubmissionBatch;
use crate::graph::cache::CacheKey;
use crate::graph::group::PassGroup;
use crate::graph::pass::PassNode;
use crate::graph::registry::ResourceRegistry;
use crate::timeline::ExecutionTimeline;

/// Outcome of compiling a frame graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphResult {
    /// The graph compiled and can be executed.
    Success,
    /// Every pass was culled; executing the graph is a no-op.
    NoWorkToDo,
    /// A cyclic pass dependency was detected; no partial schedule exists and
    /// executing the graph is a no-op.
    CyclicDependency,
}

/// A compiled, immutable frame graph ready for submission.
///
/// Produced by [`GraphBuilder::end_frame_graph`](crate::graph::builder::GraphBuilder::end_frame_graph)
/// and shared via `Arc`: the same graph may be cached and re-executed across
/// frames, re-running its task callbacks each time. All scheduling decisions
/// (order, grouping, barriers, batches) are frozen at compile time.
#[derive(Debug)]
pub struct FrameGraph {
    pub(crate) name: String,
    pub(crate) result: GraphResult,
    pub(crate) cache_key: Option<CacheKey>,
    pub(crate) registry: ResourceRegistry,
    /// All declared passes, culled ones flagged.
    pub(crate) passes: Vec<PassNode>,
    /// Surviving pass groups in execution order.
    pub(crate) groups: Vec<PassGroup>,
    /// One barrier set per group.
    pub(crate) barrier_sets: Vec<BarrierSet>,
    /// Transient registry indices created before each group.
    pub(crate) creates: Vec<Vec<u32>>,
    /// Transient registry indices freed after each group.
    pub(crate) frees: Vec<Vec<u32>>,
    /// Per-queue submission batches in submission order.
    pub(crate) batches: Vec<SubmissionBatch>,
    pub(crate) queue_of_group: Vec<usize>,
    /// Non-transient resources cleared when their first-use group begins.
    pub(crate) imported_clears: Vec<(usize, u32)>,
    /// Timelines waited on before the first batch, with target values.
    pub(crate) waits: Vec<(Arc<ExecutionTimeline>, u64)>,
    /// Timelines advanced after the last batch, with reached values.
    pub(crate) signals: Vec<(Arc<ExecutionTimeline>, u64)>,
    pub(crate) culled_count: u32,
    pub(crate) compile_time: Duration,
    pub(crate) execute_time: Mutex<Option<Duration>>,
}

impl FrameGraph {
    /// The name given at `begin_frame_graph`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The compile outcome.
    pub fn result(&self) -> GraphResult {
        self.result
    }

    /// The cache key this graph was stored under, if any.
    pub fn cache_key(&self) -> Option<CacheKey> {
        self.cache_key
    }

    /// Surviving pass groups in execution order.
    pub fn groups(&self) -> &[PassGroup] {
        &self.groups
    }

    /// Submission batches in submission order.
    pub fn batches(&self) -> &[SubmissionBatch] {
        &self.batches
    }

    /// Barrier set executed around the given group.
    pub fn barrier_set(&self, group_index: usize) -> &BarrierSet {
        &self.barrier_sets[group_index]
    }

    /// Number of passes removed by culling.
    pub fn culled_pass_count(&self) -> u32 {
        self.culled_count
    }

    /// Number of transient resources created before the given group runs.
    pub fn create_count_for_group(&self, group_index: usize) -> usize {
        self.creates[group_index].len()
    }

    /// Number of transient resources freed after the given group runs.
    pub fn free_count_for_group(&self, group_index: usize) -> usize {
        self.frees[group_index].len()
    }

    /// Total transient create events across the graph.
    pub fn total_create_count(&self) -> usize {
        self.creates.iter().map(Vec::len).sum()
    }

    /// Total transient free events across the graph.
    pub fn total_free_count(&self) -> usize {
        self.frees.iter().map(Vec::len).sum()
    }

    /// Queue the given group is submitted to.
    pub fn queue_of_group(&self, group_index: usize) -> usize {
        self.queue_of_group[group_index]
    }

    /// Time spent compiling the graph.
    pub fn compile_time(&self) -> Duration {
        self.compile_time
    }

    /// Time spent in the most recent execution, if any.
    pub fn execute_time(&self) -> Option<Duration> {
        *self.execute_time.lock()
    }

    pub(crate) fn record_execute_time(&self, duration: Duration) {
        *self.execute_time.lock() = Some(duration);
    }

    /// Build a graph that carries a result but no executable work.
    pub(crate) fn empty(
        name: String,
        result: GraphResult,
        cache_key: Option<CacheKey>,
        registry: ResourceRegistry,
        passes: Vec<PassNode>,
        culled_count: u32,
        compile_time: Duration,
    ) -> Self {
        Self {
            name,
            result,
            cache_key,
            registry,
            passes,
            groups: Vec::new(),
            barrier_sets: Vec::new(),
            creates: Vec::new(),
            frees: Vec::new(),
            batches: Vec::new(),
            queue_of_group: Vec::new(),
            imported_clears: Vec::new(),
            waits: Vec::new(),
            signals: Vec::new(),
            culled_count,
            compile_time,
            execute_time: Mutex::new(None),
        }
    }
}
