use std::collections::HashMap;

use parking_lot::RwLock;

use crate::handle::RenderHandle;

#[derive(Debug)]
struct OutputRing {
    slots: Vec<HashMap<String, RenderHandle>>,
    current: usize,
}

/// Named outputs shared between the nodes of one graph.
///
/// Outputs are kept per frame in a ring so a node can read what another
/// node published in the previous frame (history buffers, temporal passes).
#[derive(Debug)]
pub struct RenderNodeGraphShareData {
    ring: RwLock<OutputRing>,
}

impl RenderNodeGraphShareData {
    /// Create a ring of `buffering_count` frames (at least two).
    pub fn new(buffering_count: u32) -> Self {
        let len = (buffering_count as usize).max(2);
        Self {
            ring: RwLock::new(OutputRing {
                slots: vec![HashMap::new(); len],
                current: 0,
            }),
        }
    }

    /// Rotate to the next frame slot and clear it.
    pub fn begin_frame(&self) {
        let mut ring = self.ring.write();
        ring.current = (ring.current + 1) % ring.slots.len();
        let current = ring.current;
        ring.slots[current].clear();
    }

    /// Publish an output for the current frame.
    pub fn register_output(&self, name: impl Into<String>, handle: RenderHandle) {
        let mut ring = self.ring.write();
        let current = ring.current;
        ring.slots[current].insert(name.into(), handle);
    }

    /// Output published this frame.
    pub fn output(&self, name: &str) -> Option<RenderHandle> {
        let ring = self.ring.read();
        ring.slots[ring.current].get(name).copied()
    }

    /// Output published in the previous frame.
    pub fn previous_frame_output(&self, name: &str) -> Option<RenderHandle> {
        let ring = self.ring.read();
        let previous = (ring.current + ring.slots.len() - 1) % ring.slots.len();
        ring.slots[previous].get(name).copied()
    }
}
