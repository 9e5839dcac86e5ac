//! Barrier list owned by a render command list.
//!
//! Every barrier point recorded into a [`RenderCommandList`](super::RenderCommandList)
//! has an entry here. Automatic points start empty and are resolved by the
//! backend from tracked resource state; custom points carry the explicit
//! barriers the node requested.

use std::collections::HashMap;

use crate::handle::RenderHandle;
use crate::types::{BufferRange, ImageSubresourceRange, ResourceBarrierState};

/// Whether a barrier point was inserted by the command list or by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierPointKind {
    /// Inserted before a command while automatic barriers are enabled.
    Automatic,
    /// Flushed explicitly with custom barriers.
    Custom,
}

/// One explicit resource transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceBarrier {
    /// Buffer memory barrier.
    Buffer {
        /// Buffer handle.
        handle: RenderHandle,
        /// State before the barrier.
        src: ResourceBarrierState,
        /// State after the barrier.
        dst: ResourceBarrierState,
        /// Affected byte range.
        range: BufferRange,
    },
    /// Image memory barrier with layout transition.
    Image {
        /// Image handle.
        handle: RenderHandle,
        /// State before the barrier.
        src: ResourceBarrierState,
        /// State after the barrier.
        dst: ResourceBarrierState,
        /// Affected subresources.
        range: ImageSubresourceRange,
    },
}

/// Identity of a barrier for deduplication inside one barrier point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum BarrierKey {
    Buffer(RenderHandle, BufferRange),
    Image(RenderHandle, ImageSubresourceRange),
}

impl ResourceBarrier {
    /// Handle of the transitioned resource.
    pub fn handle(&self) -> RenderHandle {
        match self {
            Self::Buffer { handle, .. } | Self::Image { handle, .. } => *handle,
        }
    }

    /// State before the barrier.
    pub fn src(&self) -> ResourceBarrierState {
        match self {
            Self::Buffer { src, .. } | Self::Image { src, .. } => *src,
        }
    }

    /// State after the barrier.
    pub fn dst(&self) -> ResourceBarrierState {
        match self {
            Self::Buffer { dst, .. } | Self::Image { dst, .. } => *dst,
        }
    }

    pub(crate) fn key(&self) -> BarrierKey {
        match *self {
            Self::Buffer { handle, range, .. } => BarrierKey::Buffer(handle, range),
            Self::Image { handle, range, .. } => BarrierKey::Image(handle, range),
        }
    }
}

/// Barriers of one barrier point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierPointBarriers {
    /// Index of the barrier point inside the command list.
    pub barrier_point_index: u32,
    /// Point kind.
    pub kind: BarrierPointKind,
    /// Explicit barriers (empty for automatic points).
    pub barriers: Vec<ResourceBarrier>,
}

/// Pending custom barriers, deduplicated by resource and range.
///
/// Adding a barrier for a key already present replaces the earlier entry
/// in place, keeping the recording order of first insertion.
#[derive(Debug, Default)]
pub(crate) struct BarrierBatch {
    barriers: Vec<ResourceBarrier>,
    index_by_key: HashMap<BarrierKey, usize>,
}

impl BarrierBatch {
    pub(crate) fn add(&mut self, barrier: ResourceBarrier) {
        if barrier.src() == barrier.dst() {
            return;
        }
        match self.index_by_key.get(&barrier.key()) {
            Some(&index) => self.barriers[index] = barrier,
            None => {
                self.index_by_key.insert(barrier.key(), self.barriers.len());
                self.barriers.push(barrier);
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<ResourceBarrier> {
        self.index_by_key.clear();
        std::mem::take(&mut self.barriers)
    }

    pub(crate) fn clear(&mut self) {
        self.index_by_key.clear();
        self.barriers.clear();
    }
}

/// Per command list storage of barrier point contents.
#[derive(Debug, Default)]
pub struct RenderBarrierList {
    points: Vec<BarrierPointBarriers>,
}

impl RenderBarrierList {
    /// Create an empty barrier list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new frame. Keeps the allocation.
    pub fn begin_frame(&mut self) {
        self.points.clear();
    }

    pub(crate) fn add_barrier_point(
        &mut self,
        barrier_point_index: u32,
        kind: BarrierPointKind,
        barriers: Vec<ResourceBarrier>,
    ) {
        self.points.push(BarrierPointBarriers {
            barrier_point_index,
            kind,
            barriers,
        });
    }

    /// Barriers of a barrier point, if it exists.
    pub fn barrier_point(&self, barrier_point_index: u32) -> Option<&BarrierPointBarriers> {
        self.points
            .iter()
            .find(|p| p.barrier_point_index == barrier_point_index)
    }

    /// All barrier points in recording order.
    pub fn barrier_points(&self) -> &[BarrierPointBarriers] {
        &self.points
    }

    /// Number of explicit barriers across all points.
    pub fn total_barrier_count(&self) -> usize {
        self.points.iter().map(|p| p.barriers.len()).sum()
    }
}
