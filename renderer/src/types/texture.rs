//! Texture types and descriptors.

use super::Extent3d;
use bitflags::bitflags;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit red channel, unsigned integer.
    R8Uint,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,
    /// 16-bit red channel, float.
    R16Float,
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    Rgba32Float,
    /// 32-bit RGBA channels, unsigned integer.
    Rgba32Uint,
    /// 32-bit depth, float.
    Depth32Float,
}

impl TextureFormat {
    /// Returns true if this is a depth format.
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth32Float)
    }

    /// Returns the size in bytes per pixel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm | Self::R8Uint => 1,
            Self::Rg8Unorm | Self::R16Float => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float | Self::Rgba32Uint => 16,
        }
    }

    /// Number of color channels.
    pub fn channel_count(&self) -> u32 {
        match self {
            Self::R8Unorm | Self::R8Uint | Self::R16Float | Self::R32Float | Self::R32Uint => 1,
            Self::Depth32Float => 1,
            Self::Rg8Unorm => 2,
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Rgba16Float
            | Self::Rgba32Float
            | Self::Rgba32Uint => 4,
        }
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const TRANSFER_SRC = 1 << 0;
        /// Texture can be copied to.
        const TRANSFER_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const SAMPLED = 1 << 2;
        /// Texture can be used as a storage image.
        const STORAGE = 1 << 3;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Engine-side creation flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EngineTextureCreationFlags: u32 {
        /// Barrier state is tracked automatically by the command list.
        const DYNAMIC_BARRIERS = 1 << 0;
        /// Fill mip levels 1.. by blitting after mip 0 is uploaded.
        const GENERATE_MIPS = 1 << 1;
    }
}

impl Default for EngineTextureCreationFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Size of the texture.
    pub size: Extent3d,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Array layer count.
    pub layer_count: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
    /// Engine creation flags.
    pub engine_flags: EngineTextureCreationFlags,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            mip_level_count: 1,
            layer_count: 1,
            format,
            usage,
            engine_flags: EngineTextureCreationFlags::empty(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count.max(1);
        self
    }

    /// Set the array layer count.
    pub fn with_layers(mut self, count: u32) -> Self {
        self.layer_count = count.max(1);
        self
    }

    /// Set the engine creation flags.
    pub fn with_engine_flags(mut self, flags: EngineTextureCreationFlags) -> Self {
        self.engine_flags = flags;
        self
    }

    /// Extent of the given mip level.
    pub fn mip_extent(&self, mip_level: u32) -> Extent3d {
        Extent3d::new_3d(
            (self.size.width >> mip_level).max(1),
            (self.size.height >> mip_level).max(1),
            (self.size.depth >> mip_level).max(1),
        )
    }

    /// Byte size of one mip level of one layer, tightly packed.
    pub fn mip_byte_size(&self, mip_level: u32) -> u64 {
        let extent = self.mip_extent(mip_level);
        u64::from(extent.width)
            * u64::from(extent.height)
            * u64::from(extent.depth)
            * u64::from(self.format.block_size())
    }

    /// Byte size of all mips and layers, tightly packed.
    pub fn byte_size(&self) -> u64 {
        (0..self.mip_level_count)
            .map(|mip| self.mip_byte_size(mip))
            .sum::<u64>()
            * u64::from(self.layer_count)
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            size: Extent3d::default(),
            mip_level_count: 1,
            layer_count: 1,
            format: TextureFormat::default(),
            usage: TextureUsage::empty(),
            engine_flags: EngineTextureCreationFlags::empty(),
        }
    }
}
