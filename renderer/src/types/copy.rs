//! Copy and blit region descriptors.
//!
//! These are the units the staging pipeline stores in its shared descriptor
//! arrays and the command list replays:
//!
//! - [`BufferCopyRegion`] for buffer to buffer copies
//! - [`BufferTextureCopyRegion`] for buffer to image uploads and readbacks
//! - [`TextureCopyRegion`] for image to image copies
//! - [`TextureBlitRegion`] for scaled copies (mip generation)

use std::ops::Range;

use super::Extent3d;

/// A region within a buffer for copy operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferCopyRegion {
    /// Offset in bytes from the start of the source buffer.
    pub src_offset: u64,
    /// Offset in bytes from the start of the destination buffer.
    pub dst_offset: u64,
    /// Number of bytes to copy.
    pub size: u64,
}

impl BufferCopyRegion {
    /// Create a new buffer copy region.
    pub fn new(src_offset: u64, dst_offset: u64, size: u64) -> Self {
        Self {
            src_offset,
            dst_offset,
            size,
        }
    }

    /// Copy `size` bytes from the start of the source to the start of the destination.
    pub fn whole(size: u64) -> Self {
        Self::new(0, 0, size)
    }

    /// Source bytes as a slice range, `None` when the end overflows.
    pub fn src_range(&self) -> Option<Range<usize>> {
        byte_range(self.src_offset, self.size)
    }

    /// Destination bytes as a slice range, `None` when the end overflows.
    pub fn dst_range(&self) -> Option<Range<usize>> {
        byte_range(self.dst_offset, self.size)
    }

    /// Whether the source bytes end within `src_size`.
    pub fn src_fits(&self, src_size: u64) -> bool {
        ends_within(self.src_offset, self.size, src_size)
    }

    /// Whether the destination bytes end within `dst_size`.
    pub fn dst_fits(&self, dst_size: u64) -> bool {
        ends_within(self.dst_offset, self.size, dst_size)
    }
}

fn ends_within(offset: u64, size: u64, limit: u64) -> bool {
    offset.checked_add(size).is_some_and(|end| end <= limit)
}

fn byte_range(offset: u64, size: u64) -> Option<Range<usize>> {
    let end = offset.checked_add(size)?;
    Some(usize::try_from(offset).ok()?..usize::try_from(end).ok()?)
}

/// Origin point within a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureOrigin {
    /// X coordinate.
    pub x: u32,
    /// Y coordinate.
    pub y: u32,
    /// Z coordinate.
    pub z: u32,
}

impl TextureOrigin {
    /// Create a new texture origin.
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// Mip level, layers and origin addressed inside a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopyLocation {
    /// Mip level.
    pub mip_level: u32,
    /// First array layer.
    pub base_array_layer: u32,
    /// Number of array layers.
    pub layer_count: u32,
    /// Origin within the mip level.
    pub origin: TextureOrigin,
}

impl TextureCopyLocation {
    /// Location at mip level 0, layer 0, origin (0, 0, 0).
    pub fn base() -> Self {
        Self::mip(0)
    }

    /// Location at a specific mip level of layer 0.
    pub fn mip(mip_level: u32) -> Self {
        Self {
            mip_level,
            base_array_layer: 0,
            layer_count: 1,
            origin: TextureOrigin::default(),
        }
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: TextureOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Set the layer range.
    pub fn with_layers(mut self, base_array_layer: u32, layer_count: u32) -> Self {
        self.base_array_layer = base_array_layer;
        self.layer_count = layer_count;
        self
    }
}

impl Default for TextureCopyLocation {
    fn default() -> Self {
        Self::base()
    }
}

/// A region of a texture to copy into another texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCopyRegion {
    /// Source location.
    pub src: TextureCopyLocation,
    /// Destination location.
    pub dst: TextureCopyLocation,
    /// Size of the region.
    pub extent: Extent3d,
}

impl TextureCopyRegion {
    /// Create a new texture copy region.
    pub fn new(src: TextureCopyLocation, dst: TextureCopyLocation, extent: Extent3d) -> Self {
        Self { src, dst, extent }
    }

    /// Copy the whole mip 0 of layer 0.
    pub fn whole(extent: Extent3d) -> Self {
        Self::new(TextureCopyLocation::base(), TextureCopyLocation::base(), extent)
    }
}

/// Layout of buffer data when copying to/from textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferTextureLayout {
    /// Offset in bytes from the start of the buffer.
    pub offset: u64,
    /// Row length in texels, `None` for tightly packed.
    pub row_length: Option<u32>,
    /// Image height in texels, `None` for tightly packed.
    pub image_height: Option<u32>,
}

impl BufferTextureLayout {
    /// Tightly packed data at the given offset.
    pub fn at_offset(offset: u64) -> Self {
        Self {
            offset,
            row_length: None,
            image_height: None,
        }
    }
}

/// Buffer to texture (or texture to buffer) copy region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferTextureCopyRegion {
    /// Layout of data in the buffer.
    pub buffer_layout: BufferTextureLayout,
    /// Location in the texture.
    pub texture_location: TextureCopyLocation,
    /// Size of the region.
    pub extent: Extent3d,
}

impl BufferTextureCopyRegion {
    /// Create a new buffer-texture copy region.
    pub fn new(
        buffer_layout: BufferTextureLayout,
        texture_location: TextureCopyLocation,
        extent: Extent3d,
    ) -> Self {
        Self {
            buffer_layout,
            texture_location,
            extent,
        }
    }

    /// Copy the whole mip 0 from buffer offset 0.
    pub fn whole(extent: Extent3d) -> Self {
        Self::new(BufferTextureLayout::default(), TextureCopyLocation::base(), extent)
    }

    /// Return a copy whose buffer offset is shifted by `offset`.
    pub fn with_buffer_offset(mut self, offset: u64) -> Self {
        self.buffer_layout.offset += offset;
        self
    }

    /// Bytes read from the buffer after `buffer_layout.offset`, `None` on overflow.
    ///
    /// Honors row and image padding; the last row of the last slice is not
    /// padded.
    pub fn buffer_byte_size(&self, texel_size: u32) -> Option<u64> {
        let extent = self.extent;
        let layers = u64::from(self.texture_location.layer_count);
        let slices = u64::from(extent.depth).checked_mul(layers)?;
        if extent.width == 0 || extent.height == 0 || slices == 0 {
            return Some(0);
        }
        let row = u64::from(self.buffer_layout.row_length.unwrap_or(0).max(extent.width));
        let rows = u64::from(self.buffer_layout.image_height.unwrap_or(0).max(extent.height));
        let texels = (slices - 1)
            .checked_mul(rows)?
            .checked_add(u64::from(extent.height) - 1)?
            .checked_mul(row)?
            .checked_add(u64::from(extent.width))?;
        texels.checked_mul(u64::from(texel_size))
    }
}

/// A scaled copy between two boxes of possibly different mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBlitRegion {
    /// Source mip level.
    pub src_mip_level: u32,
    /// Source extent.
    pub src_extent: Extent3d,
    /// Destination mip level.
    pub dst_mip_level: u32,
    /// Destination extent.
    pub dst_extent: Extent3d,
    /// First array layer.
    pub base_array_layer: u32,
    /// Number of array layers.
    pub layer_count: u32,
}
