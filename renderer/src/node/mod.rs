//! Render nodes.
//!
//! A render node is one step of a render node graph. The scheduler drives
//! every node through three hooks:
//!
//! | Hook | Thread | When |
//! |------|--------|------|
//! | [`init_node`](RenderNode::init_node) | orchestrator | once, before the first frame the node runs in |
//! | [`pre_execute_frame`](RenderNode::pre_execute_frame) | orchestrator | every frame, before any node executes |
//! | [`execute_frame`](RenderNode::execute_frame) | worker | every frame, concurrently with other nodes |
//!
//! A node only writes to its own command list and context during
//! `execute_frame`; resources it creates in `pre_execute_frame` are
//! committed before execution starts.
//!
//! Nodes are created by type name through a [`RenderNodeRegistry`].

mod context;
mod staging;

pub use context::{
    NodeContextDescriptorSetManager, NodeContextPoolManager, NodeContextPsoManager,
    RenderCommandListSubmitInfo, RenderNodeContextData, RenderNodeContextManager,
    RenderNodeContextShared,
};
pub use staging::{RenderNodeEndFrameStaging, RenderNodeStaging};

use std::collections::HashMap;
use std::sync::Arc;

use crate::command::RenderCommandList;
use crate::error::RendererError;

/// One step of a render node graph.
pub trait RenderNode: Send {
    /// One-time setup with the node's context.
    fn init_node(&mut self, context: &mut RenderNodeContextManager);

    /// Per-frame preparation on the orchestrator thread.
    fn pre_execute_frame(&mut self, context: &mut RenderNodeContextManager) {
        let _ = context;
    }

    /// Record the frame's commands.
    fn execute_frame(
        &mut self,
        context: &mut RenderNodeContextManager,
        cmd: &mut RenderCommandList,
    );
}

/// Creates a render node instance.
pub type RenderNodeFactory = Arc<dyn Fn() -> Box<dyn RenderNode> + Send + Sync>;

/// Render node factories keyed by type name.
#[derive(Clone)]
pub struct RenderNodeRegistry {
    factories: HashMap<String, RenderNodeFactory>,
}

impl RenderNodeRegistry {
    /// Registry with the built-in staging nodes.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(RenderNodeStaging::TYPE_NAME, || {
            Box::new(RenderNodeStaging::new())
        });
        registry.register(RenderNodeEndFrameStaging::TYPE_NAME, || {
            Box::new(RenderNodeEndFrameStaging::new())
        });
        registry
    }

    /// Registry without any node type.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) a node type.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn RenderNode> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.into(), Arc::new(factory));
    }

    /// Whether a type is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Instantiate a node.
    pub fn create(&self, type_name: &str) -> Result<Box<dyn RenderNode>, RendererError> {
        self.factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| RendererError::UnknownRenderNodeType(type_name.to_string()))
    }
}

impl Default for RenderNodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RenderNodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("RenderNodeRegistry")
            .field("types", &names)
            .finish()
    }
}
