//! # RedLilium Renderer
//!
//! Per-frame scheduler of render node graphs and the staging pipeline that
//! feeds them.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Renderer`] - runs render node graphs every frame and hands the
//!   recorded command lists to a [`RenderBackend`](backend::RenderBackend)
//! - [`graph`] - render node graph descriptions and their node stores
//! - [`node`] - the [`RenderNode`](node::RenderNode) trait, per-node contexts
//!   and the built-in staging nodes
//! - [`data_store`] - named per-frame data stores, including
//!   [`RenderDataStoreDefaultStaging`](data_store::RenderDataStoreDefaultStaging)
//! - [`staging`] - staging batches and [`RenderStaging`](staging::RenderStaging),
//!   which records them as copy commands with barriers
//! - [`backend::dummy`] - device, resource manager and backend without a GPU
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_renderer::backend::dummy::{DummyDevice, DummyRenderBackend};
//! use redlilium_renderer::{Renderer, RendererConfig, RenderNodeRegistry};
//!
//! let device = Arc::new(DummyDevice::new());
//! let renderer = Renderer::new(
//!     device.clone(),
//!     Box::new(DummyRenderBackend::new()),
//!     RenderNodeRegistry::new(),
//!     RendererConfig::default(),
//! )?;
//!
//! let staging = renderer.staging_data_store().unwrap();
//! staging.copy_data_to_buffer(&bytes, &buffer, BufferCopyRegion::whole(bytes.len() as u64));
//! renderer.render_frame(&[]);
//! ```

pub mod backend;
pub mod command;
pub mod config;
pub mod data_store;
pub mod device;
pub mod error;
pub mod graph;
pub mod handle;
pub mod node;
pub mod profiling;
pub mod renderer;
pub mod staging;
pub mod task_queue;
pub mod time;
pub mod types;

pub use config::RendererConfig;
pub use error::RendererError;
pub use graph::{RenderNodeDesc, RenderNodeGraphDesc};
pub use handle::{RenderHandle, RenderHandleReference};
pub use node::{RenderNode, RenderNodeRegistry};
pub use renderer::{FrameAbortReason, RenderFrameStatus, Renderer};
pub use time::RenderTimings;

/// Renderer library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
