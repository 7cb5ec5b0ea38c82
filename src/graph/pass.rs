//! Pass nodes and task callbacks.

use crate::executor::CommandList;
use crate::graph::resource::{ResourceHandle, ResourceStage};

/// What kind of GPU work a pass records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Rasterization work targeting attachments.
    Graphics,
    /// Compute dispatches.
    Compute,
    /// Copy operations.
    Transfer,
}

/// Boxed task callback invoked when the pass executes.
///
/// Tasks are `Fn` rather than `FnOnce` because a cached graph re-runs its
/// callbacks on every submission.
pub type PassTaskFn = Box<dyn Fn(&mut CommandList<'_>) + Send + Sync>;

/// A typed task per pass kind.
///
/// Keeping the kind in the variant lets execution match exhaustively instead
/// of blindly invoking an untyped callback.
pub enum PassTask {
    /// Task recorded into a graphics pass.
    Graphics(PassTaskFn),
    /// Task recorded into a compute pass.
    Compute(PassTaskFn),
    /// Task recorded into a transfer pass.
    Transfer(PassTaskFn),
}

impl PassTask {
    /// The pass kind this task belongs to.
    pub fn kind(&self) -> PassKind {
        match self {
            Self::Graphics(_) => PassKind::Graphics,
            Self::Compute(_) => PassKind::Compute,
            Self::Transfer(_) => PassKind::Transfer,
        }
    }

    pub(crate) fn run(&self, list: &mut CommandList<'_>) {
        match self {
            Self::Graphics(task) | Self::Compute(task) | Self::Transfer(task) => task(list),
        }
    }
}

impl std::fmt::Debug for PassTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PassTask::{:?}", self.kind())
    }
}

/// A pass declared during a graph build.
pub struct PassNode {
    pub(crate) name: String,
    pub(crate) kind: PassKind,
    /// Ordered input connections with their usage stages.
    pub(crate) inputs: Vec<(ResourceHandle, ResourceStage)>,
    /// Ordered output connections with their usage stages.
    pub(crate) outputs: Vec<(ResourceHandle, ResourceStage)>,
    pub(crate) task: Option<PassTask>,
    /// Set by the analyzer when the pass cannot reach an essential output.
    pub(crate) culled: bool,
}

impl PassNode {
    pub(crate) fn new(name: String, kind: PassKind) -> Self {
        Self {
            name,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
            task: None,
            culled: false,
        }
    }

    /// The pass name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pass kind.
    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Whether the analyzer culled this pass.
    pub fn is_culled(&self) -> bool {
        self.culled
    }

    /// Input connections in declaration order.
    pub fn inputs(&self) -> &[(ResourceHandle, ResourceStage)] {
        &self.inputs
    }

    /// Output connections in declaration order.
    pub fn outputs(&self) -> &[(ResourceHandle, ResourceStage)] {
        &self.outputs
    }

    /// Default output stage for this pass kind.
    pub(crate) fn default_output_stage(&self) -> ResourceStage {
        match self.kind {
            PassKind::Graphics => ResourceStage::ColorAttachmentWrite,
            PassKind::Compute => ResourceStage::ComputeStorageWrite,
            PassKind::Transfer => ResourceStage::TransferWrite,
        }
    }

    /// Default input stage for this pass kind.
    pub(crate) fn default_input_stage(&self) -> ResourceStage {
        match self.kind {
            PassKind::Graphics => ResourceStage::FragmentSampled,
            PassKind::Compute => ResourceStage::ComputeSampled,
            PassKind::Transfer => ResourceStage::TransferRead,
        }
    }
}

impl std::fmt::Debug for PassNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassNode")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("has_task", &self.task.is_some())
            .field("culled", &self.culled)
            .finish()
    }
}
