//! Render node graph descriptions.

use crate::device::GpuQueue;

/// One node of a render node graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderNodeDesc {
    /// Registered render node type.
    pub type_name: String,
    /// Name, unique inside the graph.
    pub node_name: String,
    /// Queue the node submits to.
    pub queue: GpuQueue,
    /// Names of earlier nodes of the same graph this node waits for.
    pub wait_for: Vec<String>,
}

impl RenderNodeDesc {
    /// Create a node on the default graphics queue.
    pub fn new(type_name: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            node_name: node_name.into(),
            queue: GpuQueue::default(),
            wait_for: Vec::new(),
        }
    }

    /// Set the queue.
    pub fn with_queue(mut self, queue: GpuQueue) -> Self {
        self.queue = queue;
        self
    }

    /// Add a wait dependency on an earlier node.
    pub fn with_wait_for(mut self, node_name: impl Into<String>) -> Self {
        self.wait_for.push(node_name.into());
        self
    }
}

/// Ordered list of render nodes.
///
/// ```ignore
/// let desc = RenderNodeGraphDesc::new("main")
///     .with_node(RenderNodeDesc::new("RenderNodeShadows", "shadows"))
///     .with_node(
///         RenderNodeDesc::new("RenderNodeCompute", "culling")
///             .with_queue(GpuQueue::new(GpuQueueType::Compute, 0)),
///     )
///     .with_node(RenderNodeDesc::new("RenderNodeForward", "forward").with_wait_for("culling"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderNodeGraphDesc {
    /// Graph name.
    pub name: String,
    /// Nodes in execution order.
    pub nodes: Vec<RenderNodeDesc>,
}

impl RenderNodeGraphDesc {
    /// Create an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Append a node.
    pub fn with_node(mut self, node: RenderNodeDesc) -> Self {
        self.nodes.push(node);
        self
    }
}
