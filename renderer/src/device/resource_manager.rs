use std::ops::{Deref, DerefMut};

use crate::error::RendererError;
use crate::handle::{RenderHandle, RenderHandleReference};
use crate::staging::StagingConsumeStruct;
use crate::types::{BufferDescriptor, TextureDescriptor};

/// Host mapping of a buffer. Unmapped when dropped.
///
/// While a mapping is alive the resource manager may hold internal locks;
/// do not call other manager methods that map memory until it is dropped.
pub struct MappedBuffer<'a> {
    handle: RenderHandle,
    memory: Box<dyn DerefMut<Target = [u8]> + 'a>,
}

impl<'a> MappedBuffer<'a> {
    /// Wrap mapped memory of `handle`.
    pub fn new(handle: RenderHandle, memory: Box<dyn DerefMut<Target = [u8]> + 'a>) -> Self {
        Self { handle, memory }
    }

    /// Mapped buffer.
    pub fn handle(&self) -> RenderHandle {
        self.handle
    }
}

impl Deref for MappedBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.memory
    }
}

impl DerefMut for MappedBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}

impl std::fmt::Debug for MappedBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedBuffer")
            .field("handle", &self.handle)
            .field("len", &self.memory.len())
            .finish()
    }
}

/// Creates, tracks and destroys GPU resources.
///
/// The manager is the canonical owner of every resource: it keeps one
/// [`RenderHandleReference`] per resource and collects the resource once
/// that reference is the only one left.
///
/// # Pending allocations
///
/// Resources created during a frame are not backed by memory until
/// [`handle_pending_allocations`](Self::handle_pending_allocations) runs on
/// the orchestrator thread. Mapping a pending buffer returns `None`.
///
/// # Implicit staging
///
/// Creating a resource with initial data queues an upload into the manager's
/// own staging batch. [`lock_frame_staging_data`](Self::lock_frame_staging_data)
/// swaps that batch once per frame and
/// [`consume_frame_staging_data`](Self::consume_frame_staging_data) hands it
/// out once.
pub trait GpuResourceManager: Send + Sync {
    /// Create a buffer.
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
    ) -> Result<RenderHandleReference, RendererError>;

    /// Create a buffer and queue an upload of `data` into it.
    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<RenderHandleReference, RendererError>;

    /// Create a texture.
    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<RenderHandleReference, RendererError>;

    /// Create a texture and queue an upload of tightly packed mip 0 `data`.
    fn create_texture_with_data(
        &self,
        descriptor: &TextureDescriptor,
        data: &[u8],
    ) -> Result<RenderHandleReference, RendererError>;

    /// Destroy a resource. Queued operations touching it are invalidated.
    fn destroy(&self, handle: RenderHandle);

    /// Whether `handle` names a live buffer.
    fn is_gpu_buffer(&self, handle: RenderHandle) -> bool;

    /// Whether `handle` names a live image.
    fn is_gpu_image(&self, handle: RenderHandle) -> bool;

    /// Descriptor of a live buffer.
    fn buffer_descriptor(&self, handle: RenderHandle) -> Option<BufferDescriptor>;

    /// Descriptor of a live image.
    fn texture_descriptor(&self, handle: RenderHandle) -> Option<TextureDescriptor>;

    /// Map a committed, host-visible buffer.
    fn map_buffer(&self, handle: RenderHandle) -> Option<MappedBuffer<'_>>;

    /// Back every pending resource with memory.
    fn handle_pending_allocations(&self);

    /// Swap the implicit staging batch for this frame.
    fn lock_frame_staging_data(&self);

    /// Take this frame's implicit staging batch. A second call returns an
    /// empty batch.
    fn consume_frame_staging_data(&self) -> StagingConsumeStruct;

    /// End-of-frame bookkeeping: deferred destruction and collection.
    fn end_frame(&self);
}
