//! Command recording.
//!
//! - [`RenderCommandList`] - per render node command stream
//! - [`RenderBarrierList`] - explicit barriers of its barrier points
//! - [`RenderCommandFrameData`] - flattened contexts of a frame for the backend

mod barrier_list;
mod command_list;
mod frame_data;

pub use barrier_list::{BarrierPointBarriers, BarrierPointKind, RenderBarrierList, ResourceBarrier};
pub use command_list::{RenderCommand, RenderCommandList};
pub use frame_data::{RenderCommandContext, RenderCommandFrameData, SubmitDependencies};
