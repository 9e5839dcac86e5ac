//! Common types and descriptors for render resources.
//!
//! This module contains format enums, usage and memory flags, barrier states,
//! copy regions and descriptor structs used throughout the renderer.

mod barrier;
mod buffer;
mod common;
mod copy;
mod texture;

pub use barrier::{
    AccessFlags, BufferRange, ImageLayout, ImageSubresourceRange, PipelineStageFlags,
    ResourceBarrierState,
};
pub use buffer::{BufferDescriptor, BufferUsage, EngineBufferCreationFlags, MemoryPropertyFlags};
pub use common::{ClearColorValue, Extent3d};
pub use copy::{
    BufferCopyRegion, BufferTextureCopyRegion, BufferTextureLayout, TextureBlitRegion,
    TextureCopyLocation, TextureCopyRegion, TextureOrigin,
};
pub use texture::{EngineTextureCreationFlags, TextureDescriptor, TextureFormat, TextureUsage};
