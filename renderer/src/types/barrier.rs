//! Resource states used by explicit barriers.
//!
//! A barrier moves a resource from one [`ResourceBarrierState`] to another.
//! For images the state includes an [`ImageLayout`]; buffers only carry access
//! and stage masks.

use bitflags::bitflags;

/// Image layouts a texture can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageLayout {
    /// Contents undefined. Can transition to any layout.
    #[default]
    Undefined,
    /// Optimal for color attachment writes.
    ColorAttachment,
    /// Optimal for shader sampling.
    ShaderReadOnly,
    /// Optimal for transfer source operations.
    TransferSrc,
    /// Optimal for transfer destination operations.
    TransferDst,
    /// Optimal for presentation.
    PresentSrc,
    /// General layout.
    General,
}

bitflags! {
    /// Memory access kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        /// Shader read.
        const SHADER_READ = 1 << 0;
        /// Shader write.
        const SHADER_WRITE = 1 << 1;
        /// Color attachment write.
        const COLOR_ATTACHMENT_WRITE = 1 << 2;
        /// Transfer read.
        const TRANSFER_READ = 1 << 3;
        /// Transfer write.
        const TRANSFER_WRITE = 1 << 4;
        /// Host read.
        const HOST_READ = 1 << 5;
        /// Host write.
        const HOST_WRITE = 1 << 6;
    }
}

bitflags! {
    /// Pipeline stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipelineStageFlags: u32 {
        /// Start of the pipeline.
        const TOP_OF_PIPE = 1 << 0;
        /// Vertex shader.
        const VERTEX_SHADER = 1 << 1;
        /// Fragment shader.
        const FRAGMENT_SHADER = 1 << 2;
        /// Color attachment output.
        const COLOR_ATTACHMENT_OUTPUT = 1 << 3;
        /// Compute shader.
        const COMPUTE_SHADER = 1 << 4;
        /// Transfer operations.
        const TRANSFER = 1 << 5;
        /// Host access.
        const HOST = 1 << 6;
        /// End of the pipeline.
        const BOTTOM_OF_PIPE = 1 << 7;
    }
}

impl ImageLayout {
    /// Access mask a resource in this layout is used with.
    pub fn access_mask(self) -> AccessFlags {
        match self {
            Self::Undefined | Self::PresentSrc => AccessFlags::empty(),
            Self::ColorAttachment => AccessFlags::COLOR_ATTACHMENT_WRITE,
            Self::ShaderReadOnly => AccessFlags::SHADER_READ,
            Self::TransferSrc => AccessFlags::TRANSFER_READ,
            Self::TransferDst => AccessFlags::TRANSFER_WRITE,
            Self::General => AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE,
        }
    }

    /// Pipeline stage a resource in this layout is used in.
    pub fn stage(self) -> PipelineStageFlags {
        match self {
            Self::Undefined => PipelineStageFlags::TOP_OF_PIPE,
            Self::ColorAttachment => PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            Self::ShaderReadOnly => PipelineStageFlags::FRAGMENT_SHADER,
            Self::TransferSrc | Self::TransferDst => PipelineStageFlags::TRANSFER,
            Self::PresentSrc => PipelineStageFlags::BOTTOM_OF_PIPE,
            Self::General => PipelineStageFlags::COMPUTE_SHADER,
        }
    }
}

/// Full state of a resource on one side of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceBarrierState {
    /// Access mask.
    pub access: AccessFlags,
    /// Pipeline stage mask.
    pub stage: PipelineStageFlags,
    /// Image layout (ignored for buffers).
    pub layout: ImageLayout,
}

impl ResourceBarrierState {
    /// State implied by an image layout.
    pub fn image(layout: ImageLayout) -> Self {
        Self {
            access: layout.access_mask(),
            stage: layout.stage(),
            layout,
        }
    }

    /// Buffer state.
    pub fn buffer(access: AccessFlags, stage: PipelineStageFlags) -> Self {
        Self {
            access,
            stage,
            layout: ImageLayout::Undefined,
        }
    }

    /// Buffer state after a transfer write.
    pub fn transfer_write() -> Self {
        Self::buffer(AccessFlags::TRANSFER_WRITE, PipelineStageFlags::TRANSFER)
    }

    /// Buffer state readable by any shader stage.
    pub fn shader_read() -> Self {
        Self::buffer(
            AccessFlags::SHADER_READ,
            PipelineStageFlags::VERTEX_SHADER
                | PipelineStageFlags::FRAGMENT_SHADER
                | PipelineStageFlags::COMPUTE_SHADER,
        )
    }
}

/// Mip and layer range of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSubresourceRange {
    /// First mip level.
    pub base_mip_level: u32,
    /// Mip level count.
    pub level_count: u32,
    /// First array layer.
    pub base_array_layer: u32,
    /// Array layer count.
    pub layer_count: u32,
}

impl ImageSubresourceRange {
    /// Marker for "all remaining levels/layers".
    pub const REMAINING: u32 = u32::MAX;

    /// Every mip and every layer.
    pub fn all() -> Self {
        Self {
            base_mip_level: 0,
            level_count: Self::REMAINING,
            base_array_layer: 0,
            layer_count: Self::REMAINING,
        }
    }

    /// A single mip level of every layer.
    pub fn mip(mip_level: u32) -> Self {
        Self {
            base_mip_level: mip_level,
            level_count: 1,
            base_array_layer: 0,
            layer_count: Self::REMAINING,
        }
    }
}

impl Default for ImageSubresourceRange {
    fn default() -> Self {
        Self::all()
    }
}

/// Byte range of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRange {
    /// Offset in bytes.
    pub offset: u64,
    /// Size in bytes, [`BufferRange::WHOLE_SIZE`] for the rest of the buffer.
    pub size: u64,
}

impl BufferRange {
    /// Marker for "until the end of the buffer".
    pub const WHOLE_SIZE: u64 = u64::MAX;

    /// The whole buffer.
    pub fn whole() -> Self {
        Self {
            offset: 0,
            size: Self::WHOLE_SIZE,
        }
    }

    /// A sub range.
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }
}

impl Default for BufferRange {
    fn default() -> Self {
        Self::whole()
    }
}
