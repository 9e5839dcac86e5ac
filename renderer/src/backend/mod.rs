//! Backend submission interface.
//!
//! The backend receives the flattened command contexts of a frame, turns
//! them into API command buffers, submits them honoring the
//! [`SubmitDependencies`](crate::command::SubmitDependencies) of every
//! context and presents the back buffer.
//!
//! Only the [`dummy`] backend ships with this crate.

pub mod dummy;

use crate::command::RenderCommandFrameData;
use crate::device::BackBufferConfiguration;

/// Consumes recorded frames.
pub trait RenderBackend: Send {
    /// Translate and submit every context of the frame, in order.
    fn render(
        &mut self,
        frame_data: &mut RenderCommandFrameData<'_>,
        back_buffer: &BackBufferConfiguration,
    );

    /// Present the back buffer.
    fn present(&mut self, back_buffer: &BackBufferConfiguration);
}
