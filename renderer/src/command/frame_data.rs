//! Flattened per-frame command data handed to the backend.

use super::RenderCommandList;
use crate::device::GpuQueue;
use crate::node::{NodeContextDescriptorSetManager, NodeContextPoolManager};

/// Cross-queue dependencies of one command context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitDependencies {
    /// Queue the context is submitted to.
    pub queue: GpuQueue,
    /// A later context waits for this one; signal a semaphore on submit.
    pub signal_semaphore: bool,
    /// Positions, in [`RenderCommandFrameData::contexts`], of contexts whose
    /// semaphores this one waits on. Always smaller than the own position.
    pub wait_for_context_indices: Vec<usize>,
}

/// One render node's recorded work, borrowed for the duration of submission.
#[derive(Debug)]
pub struct RenderCommandContext<'a> {
    /// Graph the node belongs to.
    pub render_graph_name: &'a str,
    /// Node name.
    pub node_name: &'a str,
    /// Recorded commands (owns the barrier list).
    pub command_list: &'a RenderCommandList,
    /// Descriptor sets of the node.
    pub descriptor_set_manager: &'a NodeContextDescriptorSetManager,
    /// Command pool ring of the node.
    pub pool_manager: &'a NodeContextPoolManager,
    /// Submission dependencies.
    pub submit_dependencies: SubmitDependencies,
}

/// Every command context of a frame in submission order.
#[derive(Debug, Default)]
pub struct RenderCommandFrameData<'a> {
    /// Contexts in submission order.
    pub contexts: Vec<RenderCommandContext<'a>>,
    /// Index of the frame.
    pub frame_index: u64,
}

impl RenderCommandFrameData<'_> {
    /// Whether the frame has no context to submit.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
