//! Renderer error types.

use thiserror::Error;

/// Errors that can occur while building or driving the renderer.
///
/// Per-frame problems (dropped staging requests, failed mappings, a lost
/// device) never surface as errors from the frame loop; they are logged and
/// the frame degrades. `RendererError` covers construction-time validation
/// and collaborator failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendererError {
    /// Failed to create a GPU resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A handle does not refer to a live object of the expected kind.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    /// No render node factory is registered under this type name.
    #[error("unknown render node type: {0}")]
    UnknownRenderNodeType(String),
    /// No render data store factory is registered under this type name.
    #[error("unknown render data store type: {0}")]
    UnknownDataStoreType(String),
    /// A render data store with this name already exists.
    #[error("render data store already exists: {0}")]
    DuplicateDataStore(String),
    /// Two nodes of one graph share a name.
    #[error("duplicate render node name '{node}' in graph '{graph}'")]
    DuplicateNodeName {
        /// Graph name.
        graph: String,
        /// Offending node name.
        node: String,
    },
    /// A node waits for a node that does not precede it in the graph.
    #[error("render node '{node}' waits for '{wait_for}' which is not an earlier node of the graph")]
    InvalidWaitDependency {
        /// Waiting node.
        node: String,
        /// Name it waits for.
        wait_for: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RendererError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = RendererError::UnknownRenderNodeType("RenderNodeFoo".to_string());
        assert_eq!(err.to_string(), "unknown render node type: RenderNodeFoo");

        let err = RendererError::InvalidWaitDependency {
            node: "b".into(),
            wait_for: "a".into(),
        };
        assert!(err.to_string().contains("'a'"));
    }
}
