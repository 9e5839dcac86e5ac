//! Staging data model and replay.
//!
//! Producers (the [`RenderDataStoreDefaultStaging`](crate::data_store::RenderDataStoreDefaultStaging)
//! and the GPU resource manager's implicit uploads) describe data movement
//! as [`StagingConsumeStruct`] batches. A batch is filled during one frame,
//! swapped out under a lock at the start of the next, consumed exactly once
//! by a staging render node and replayed through [`RenderStaging`].
//!
//! # Batch layout
//!
//! Every copy direction has its own list of [`StagingCopyStruct`]s. Each
//! entry points at a contiguous range (`begin_index..begin_index + count`)
//! inside one of the shared region arrays:
//!
//! | Direction | Region array |
//! |-----------|--------------|
//! | `buffer_to_buffer` | `buffer_copies` |
//! | `buffer_to_image` | `buffer_image_copies` |
//! | `image_to_buffer` | `buffer_image_copies` |
//! | `image_to_image` | `image_copies` |
//!
//! Ranges never overlap and never leave their array.

mod render_staging;

pub use render_staging::{RenderStaging, DEFAULT_CLEAR_BUDGET};

use crate::handle::{RenderHandle, RenderHandleReference};
use crate::types::{BufferCopyRegion, BufferTextureCopyRegion, ClearColorValue, TextureCopyRegion};

/// When a GPU to GPU copy is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CopyTiming {
    /// Before any user render node, by the staging node.
    #[default]
    BeginFrame,
    /// After every user render node, by the end-frame staging node.
    EndFrame,
}

/// Decoded image payload with per-mip copy layout.
pub trait ImageContainer: Send + std::fmt::Debug {
    /// Tightly packed image bytes.
    fn data(&self) -> &[u8];

    /// Regions addressing [`data`](Self::data), one per uploaded mip/layer.
    fn copy_regions(&self) -> &[BufferTextureCopyRegion];
}

/// Payload carried by a [`StagingCopyStruct`].
#[derive(Debug, Default)]
pub enum StagingData {
    /// Host bytes to be written into the staging buffer.
    Host(Vec<u8>),
    /// The source is already a GPU resource; no host copy.
    #[default]
    DirectSrcCopy,
    /// Decoded image to be written into the staging buffer.
    ImageContainer(Box<dyn ImageContainer>),
}

impl StagingData {
    /// Host bytes to upload, if any.
    pub fn host_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Host(bytes) => Some(bytes),
            Self::DirectSrcCopy => None,
            Self::ImageContainer(container) => Some(container.data()),
        }
    }
}

/// One copy operation of a staging batch.
#[derive(Debug, Default)]
pub struct StagingCopyStruct {
    /// Payload.
    pub data: StagingData,
    /// Source resource (the staging buffer for host uploads).
    pub src_handle: RenderHandleReference,
    /// Destination resource.
    pub dst_handle: RenderHandleReference,
    /// First region in the shared region array.
    pub begin_index: u32,
    /// Number of regions.
    pub count: u32,
    /// Size of the staging buffer written by the host copy.
    pub staging_buffer_byte_size: u64,
    /// The operation must be skipped (a referenced resource was destroyed).
    pub invalid_operation: bool,
}

impl StagingCopyStruct {
    /// Region range inside the shared array.
    pub fn region_range(&self) -> std::ops::Range<usize> {
        let begin = self.begin_index as usize;
        begin..begin + self.count as usize
    }

    fn touches(&self, handle: RenderHandle) -> bool {
        self.src_handle.handle() == handle || self.dst_handle.handle() == handle
    }
}

/// A batch of staging operations handed to a staging node once.
#[derive(Debug, Default)]
pub struct StagingConsumeStruct {
    /// Buffer to buffer copies, regions in `buffer_copies`.
    pub buffer_to_buffer: Vec<StagingCopyStruct>,
    /// Buffer to image copies, regions in `buffer_image_copies`.
    pub buffer_to_image: Vec<StagingCopyStruct>,
    /// Image to buffer copies, regions in `buffer_image_copies`.
    pub image_to_buffer: Vec<StagingCopyStruct>,
    /// Image to image copies, regions in `image_copies`.
    pub image_to_image: Vec<StagingCopyStruct>,

    /// Shared buffer copy regions.
    pub buffer_copies: Vec<BufferCopyRegion>,
    /// Shared buffer/image copy regions.
    pub buffer_image_copies: Vec<BufferTextureCopyRegion>,
    /// Shared image copy regions.
    pub image_copies: Vec<TextureCopyRegion>,
}

impl StagingConsumeStruct {
    /// Whether the batch holds no operation.
    pub fn is_empty(&self) -> bool {
        self.buffer_to_buffer.is_empty()
            && self.buffer_to_image.is_empty()
            && self.image_to_buffer.is_empty()
            && self.image_to_image.is_empty()
    }

    /// Total number of copy operations.
    pub fn operation_count(&self) -> usize {
        self.buffer_to_buffer.len()
            + self.buffer_to_image.len()
            + self.image_to_buffer.len()
            + self.image_to_image.len()
    }

    /// Append a buffer to buffer operation with its regions.
    pub fn push_buffer_to_buffer(
        &mut self,
        mut op: StagingCopyStruct,
        regions: impl IntoIterator<Item = BufferCopyRegion>,
    ) {
        let begin = self.buffer_copies.len();
        self.buffer_copies.extend(regions);
        op.begin_index = begin as u32;
        op.count = (self.buffer_copies.len() - begin) as u32;
        self.buffer_to_buffer.push(op);
    }

    /// Append a buffer to image operation with its regions.
    pub fn push_buffer_to_image(
        &mut self,
        mut op: StagingCopyStruct,
        regions: impl IntoIterator<Item = BufferTextureCopyRegion>,
    ) {
        let begin = self.buffer_image_copies.len();
        self.buffer_image_copies.extend(regions);
        op.begin_index = begin as u32;
        op.count = (self.buffer_image_copies.len() - begin) as u32;
        self.buffer_to_image.push(op);
    }

    /// Append an image to buffer operation with its regions.
    pub fn push_image_to_buffer(
        &mut self,
        mut op: StagingCopyStruct,
        regions: impl IntoIterator<Item = BufferTextureCopyRegion>,
    ) {
        let begin = self.buffer_image_copies.len();
        self.buffer_image_copies.extend(regions);
        op.begin_index = begin as u32;
        op.count = (self.buffer_image_copies.len() - begin) as u32;
        self.image_to_buffer.push(op);
    }

    /// Append an image to image operation with its regions.
    pub fn push_image_to_image(
        &mut self,
        mut op: StagingCopyStruct,
        regions: impl IntoIterator<Item = TextureCopyRegion>,
    ) {
        let begin = self.image_copies.len();
        self.image_copies.extend(regions);
        op.begin_index = begin as u32;
        op.count = (self.image_copies.len() - begin) as u32;
        self.image_to_image.push(op);
    }

    /// Move every operation of `other` to the end of this batch.
    ///
    /// Region ranges of the moved operations are re-based onto this batch's
    /// arrays.
    pub fn append(&mut self, other: StagingConsumeStruct) {
        let buffer_base = self.buffer_copies.len() as u32;
        let buffer_image_base = self.buffer_image_copies.len() as u32;
        let image_base = self.image_copies.len() as u32;

        let rebase = |ops: Vec<StagingCopyStruct>, base: u32| {
            ops.into_iter().map(move |mut op| {
                op.begin_index += base;
                op
            })
        };

        self.buffer_to_buffer
            .extend(rebase(other.buffer_to_buffer, buffer_base));
        self.buffer_to_image
            .extend(rebase(other.buffer_to_image, buffer_image_base));
        self.image_to_buffer
            .extend(rebase(other.image_to_buffer, buffer_image_base));
        self.image_to_image
            .extend(rebase(other.image_to_image, image_base));

        self.buffer_copies.extend(other.buffer_copies);
        self.buffer_image_copies.extend(other.buffer_image_copies);
        self.image_copies.extend(other.image_copies);
    }

    /// Mark every operation touching `handle` as invalid.
    ///
    /// Returns the number of operations marked.
    pub fn invalidate_handle(&mut self, handle: RenderHandle) -> usize {
        let mut marked = 0;
        for op in self
            .buffer_to_buffer
            .iter_mut()
            .chain(self.buffer_to_image.iter_mut())
            .chain(self.image_to_buffer.iter_mut())
            .chain(self.image_to_image.iter_mut())
        {
            if !op.invalid_operation && op.touches(handle) {
                op.invalid_operation = true;
                marked += 1;
            }
        }
        marked
    }

    /// Sum of staging buffer sizes written by host copies.
    pub fn staging_byte_size(&self) -> u64 {
        self.buffer_to_buffer
            .iter()
            .chain(self.buffer_to_image.iter())
            .map(|op| op.staging_buffer_byte_size)
            .sum()
    }
}

/// A CPU copy straight into a host-visible, host-coherent buffer.
#[derive(Debug)]
pub struct StagingDirectDataCopy {
    /// Source bytes.
    pub data: Vec<u8>,
    /// Destination buffer.
    pub dst_handle: RenderHandleReference,
    /// `src_offset` indexes `data`, `dst_offset` the mapped buffer.
    pub region: BufferCopyRegion,
}

/// Batch of direct CPU copies.
#[derive(Debug, Default)]
pub struct StagingDirectDataCopyConsumeStruct {
    /// Copies in submission order.
    pub data_copies: Vec<StagingDirectDataCopy>,
}

impl StagingDirectDataCopyConsumeStruct {
    /// Whether the batch holds no copy.
    pub fn is_empty(&self) -> bool {
        self.data_copies.is_empty()
    }

    /// Move every copy of `other` to the end of this batch.
    pub fn append(&mut self, other: StagingDirectDataCopyConsumeStruct) {
        self.data_copies.extend(other.data_copies);
    }
}

/// A queued image clear.
#[derive(Debug, Clone)]
pub struct StagingImageClear {
    /// Image to clear.
    pub handle: RenderHandleReference,
    /// Clear color.
    pub color: ClearColorValue,
}

/// Batch of image clears.
#[derive(Debug, Default)]
pub struct StagingImageClearConsumeStruct {
    /// Clears in submission order.
    pub clears: Vec<StagingImageClear>,
}

impl StagingImageClearConsumeStruct {
    /// Whether the batch holds no clear.
    pub fn is_empty(&self) -> bool {
        self.clears.is_empty()
    }

    /// Move every clear of `other` to the end of this batch.
    pub fn append(&mut self, other: StagingImageClearConsumeStruct) {
        self.clears.extend(other.clears);
    }
}
