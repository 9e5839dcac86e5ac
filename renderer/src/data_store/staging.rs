//! Default staging data store.
//!
//! Application code calls the enqueue methods from any thread during a
//! frame. Requests accumulate in one batch; [`pre_render`](RenderDataStore::pre_render)
//! swaps it with the frame batch under the store lock, and the staging
//! render nodes consume the frame batch exactly once.
//!
//! ```ignore
//! let staging = data_stores
//!     .get::<RenderDataStoreDefaultStaging>("RenderDataStoreDefaultStaging")
//!     .unwrap();
//! staging.copy_data_to_buffer(&vertices, &vertex_buffer, BufferCopyRegion::whole(size));
//! staging.copy_image_to_buffer(&target, &readback, region, CopyTiming::EndFrame);
//! ```
//!
//! Malformed requests (empty data, wrong resource kind, regions outside the
//! data) are dropped with a debug log.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{RenderDataStore, RenderDataStoreContext};
use crate::device::GpuResourceManager;
use crate::handle::{RenderHandle, RenderHandleReference};
use crate::staging::{
    CopyTiming, ImageContainer, StagingConsumeStruct, StagingCopyStruct, StagingData,
    StagingDirectDataCopy, StagingDirectDataCopyConsumeStruct, StagingImageClear,
    StagingImageClearConsumeStruct,
};
use crate::types::{
    BufferCopyRegion, BufferDescriptor, BufferTextureCopyRegion, ClearColorValue,
    TextureCopyRegion,
};

#[derive(Debug, Default)]
struct StagingBatch {
    staging: StagingConsumeStruct,
    end_staging: StagingConsumeStruct,
    direct_copies: StagingDirectDataCopyConsumeStruct,
    clears: StagingImageClearConsumeStruct,
    clear_byte_size: u64,
    staging_buffers: Vec<RenderHandleReference>,
}

impl StagingBatch {
    fn is_empty(&self) -> bool {
        self.staging.is_empty()
            && self.end_staging.is_empty()
            && self.direct_copies.is_empty()
            && self.clears.is_empty()
    }

    fn append(&mut self, other: StagingBatch) {
        self.staging.append(other.staging);
        self.end_staging.append(other.end_staging);
        self.direct_copies.append(other.direct_copies);
        self.clears.append(other.clears);
        self.clear_byte_size += other.clear_byte_size;
        self.staging_buffers.extend(other.staging_buffers);
    }

    fn timed(&mut self, timing: CopyTiming) -> &mut StagingConsumeStruct {
        match timing {
            CopyTiming::BeginFrame => &mut self.staging,
            CopyTiming::EndFrame => &mut self.end_staging,
        }
    }

    fn invalidate_handle(&mut self, handle: RenderHandle) -> usize {
        let mut marked = self.staging.invalidate_handle(handle)
            + self.end_staging.invalidate_handle(handle);
        let before = self.direct_copies.data_copies.len() + self.clears.clears.len();
        self.direct_copies
            .data_copies
            .retain(|c| c.dst_handle.handle() != handle);
        self.clears.clears.retain(|c| c.handle.handle() != handle);
        marked += before - (self.direct_copies.data_copies.len() + self.clears.clears.len());
        marked
    }
}

#[derive(Debug, Default)]
struct StagingState {
    accumulating: StagingBatch,
    frame: StagingBatch,
    frame_staging_buffers: Vec<RenderHandleReference>,
}

/// Thread-safe producer of staging batches.
pub struct RenderDataStoreDefaultStaging {
    name: String,
    gpu: Arc<dyn GpuResourceManager>,
    state: Mutex<StagingState>,
}

impl RenderDataStoreDefaultStaging {
    /// Registered type name.
    pub const TYPE_NAME: &'static str = "RenderDataStoreDefaultStaging";

    /// Create a store that allocates staging buffers from `gpu`.
    pub fn new(name: impl Into<String>, gpu: Arc<dyn GpuResourceManager>) -> Self {
        Self {
            name: name.into(),
            gpu,
            state: Mutex::new(StagingState::default()),
        }
    }

    pub(crate) fn create(name: &str, context: &RenderDataStoreContext) -> Arc<dyn RenderDataStore> {
        Arc::new(Self::new(name, Arc::clone(&context.gpu_resource_manager)))
    }

    fn create_staging_buffer(&self, byte_size: u64) -> Option<RenderHandleReference> {
        match self.gpu.create_buffer(&BufferDescriptor::staging(byte_size)) {
            Ok(buffer) => Some(buffer),
            Err(err) => {
                log::error!("{}: staging buffer creation failed: {}", self.name, err);
                None
            }
        }
    }

    fn region_fits(region: &BufferCopyRegion, data_len: usize) -> bool {
        region.size > 0 && region.src_fits(data_len as u64)
    }

    fn buffer_size(&self, handle: &RenderHandleReference) -> Option<u64> {
        self.gpu.buffer_descriptor(handle.handle()).map(|d| d.size)
    }

    /// Upload `data` into a GPU buffer through a transient staging buffer.
    ///
    /// `region.src_offset` indexes `data`. Dropped when `data` is empty, the
    /// region leaves `data` or `dst`, or `dst` is not a buffer.
    pub fn copy_data_to_buffer(
        &self,
        data: &[u8],
        dst: &RenderHandleReference,
        region: BufferCopyRegion,
    ) {
        let Some(dst_size) = self.buffer_size(dst).filter(|_| !data.is_empty()) else {
            log::debug!("{}: copy_data_to_buffer dropped (empty data or bad buffer)", self.name);
            return;
        };
        if !Self::region_fits(&region, data.len()) || !region.dst_fits(dst_size) {
            log::debug!("{}: copy_data_to_buffer dropped (region out of range)", self.name);
            return;
        }
        let byte_size = data.len() as u64;
        let Some(staging_buffer) = self.create_staging_buffer(byte_size) else {
            return;
        };

        let op = StagingCopyStruct {
            data: StagingData::Host(data.to_vec()),
            src_handle: staging_buffer.clone(),
            dst_handle: dst.clone(),
            staging_buffer_byte_size: byte_size,
            ..Default::default()
        };
        let mut state = self.state.lock();
        state.accumulating.staging.push_buffer_to_buffer(op, [region]);
        state.accumulating.staging_buffers.push(staging_buffer);
    }

    /// Copy `data` straight into a host-visible, host-coherent buffer on the CPU.
    ///
    /// The copy happens while the staging node executes, before any GPU
    /// work of the frame. Destinations without both memory properties are
    /// rejected with an error log.
    pub fn copy_data_to_buffer_on_cpu(
        &self,
        data: &[u8],
        dst: &RenderHandleReference,
        region: BufferCopyRegion,
    ) {
        if data.is_empty() || !Self::region_fits(&region, data.len()) {
            log::debug!("{}: copy_data_to_buffer_on_cpu dropped (bad data region)", self.name);
            return;
        }
        let Some(descriptor) = self.gpu.buffer_descriptor(dst.handle()) else {
            log::debug!("{}: copy_data_to_buffer_on_cpu dropped (invalid buffer)", self.name);
            return;
        };
        if !descriptor.is_host_writable() {
            log::error!(
                "{}: copy_data_to_buffer_on_cpu needs a host coherent buffer, {:?} has {:?}",
                self.name,
                dst.handle(),
                descriptor.memory
            );
            return;
        }
        if !region.dst_fits(descriptor.size) {
            log::debug!("{}: copy_data_to_buffer_on_cpu dropped (outside buffer)", self.name);
            return;
        }

        self.state
            .lock()
            .accumulating
            .direct_copies
            .data_copies
            .push(StagingDirectDataCopy {
                data: data.to_vec(),
                dst_handle: dst.clone(),
                region,
            });
    }

    /// Upload `data` into an image through a transient staging buffer.
    ///
    /// Region buffer offsets index `data`. Dropped unless every region's
    /// texels, sized by the image format, lie inside `data`.
    pub fn copy_data_to_image(
        &self,
        data: &[u8],
        dst: &RenderHandleReference,
        regions: &[BufferTextureCopyRegion],
    ) {
        let descriptor = self.gpu.texture_descriptor(dst.handle());
        let Some(descriptor) = descriptor.filter(|_| !data.is_empty() && !regions.is_empty()) else {
            log::debug!("{}: copy_data_to_image dropped (no data, regions or image)", self.name);
            return;
        };
        let texel_size = descriptor.format.block_size();
        let inside_data = |region: &BufferTextureCopyRegion| {
            region
                .buffer_byte_size(texel_size)
                .filter(|&size| size > 0)
                .and_then(|size| region.buffer_layout.offset.checked_add(size))
                .is_some_and(|end| end <= data.len() as u64)
        };
        if !regions.iter().all(inside_data) {
            log::debug!("{}: copy_data_to_image dropped (region outside data)", self.name);
            return;
        }
        let byte_size = data.len() as u64;
        let Some(staging_buffer) = self.create_staging_buffer(byte_size) else {
            return;
        };

        let op = StagingCopyStruct {
            data: StagingData::Host(data.to_vec()),
            src_handle: staging_buffer.clone(),
            dst_handle: dst.clone(),
            staging_buffer_byte_size: byte_size,
            ..Default::default()
        };
        let mut state = self.state.lock();
        state
            .accumulating
            .staging
            .push_buffer_to_image(op, regions.iter().copied());
        state.accumulating.staging_buffers.push(staging_buffer);
    }

    /// Upload a decoded image through a transient staging buffer.
    pub fn copy_image_container_to_image(
        &self,
        container: Box<dyn ImageContainer>,
        dst: &RenderHandleReference,
    ) {
        if container.data().is_empty()
            || container.copy_regions().is_empty()
            || !self.gpu.is_gpu_image(dst.handle())
        {
            log::debug!("{}: copy_image_container_to_image dropped", self.name);
            return;
        }
        let byte_size = container.data().len() as u64;
        let Some(staging_buffer) = self.create_staging_buffer(byte_size) else {
            return;
        };
        let regions = container.copy_regions().to_vec();

        let op = StagingCopyStruct {
            data: StagingData::ImageContainer(container),
            src_handle: staging_buffer.clone(),
            dst_handle: dst.clone(),
            staging_buffer_byte_size: byte_size,
            ..Default::default()
        };
        let mut state = self.state.lock();
        state.accumulating.staging.push_buffer_to_image(op, regions);
        state.accumulating.staging_buffers.push(staging_buffer);
    }

    fn direct_op(src: &RenderHandleReference, dst: &RenderHandleReference) -> StagingCopyStruct {
        StagingCopyStruct {
            data: StagingData::DirectSrcCopy,
            src_handle: src.clone(),
            dst_handle: dst.clone(),
            ..Default::default()
        }
    }

    /// GPU copy between two buffers.
    pub fn copy_buffer_to_buffer(
        &self,
        src: &RenderHandleReference,
        dst: &RenderHandleReference,
        region: BufferCopyRegion,
        timing: CopyTiming,
    ) {
        let fits = match (self.buffer_size(src), self.buffer_size(dst)) {
            (Some(src_size), Some(dst_size)) => {
                region.src_fits(src_size) && region.dst_fits(dst_size)
            }
            _ => false,
        };
        if region.size == 0 || !fits {
            log::debug!("{}: copy_buffer_to_buffer dropped", self.name);
            return;
        }
        self.state
            .lock()
            .accumulating
            .timed(timing)
            .push_buffer_to_buffer(Self::direct_op(src, dst), [region]);
    }

    /// GPU copy from a buffer into an image.
    pub fn copy_buffer_to_image(
        &self,
        src: &RenderHandleReference,
        dst: &RenderHandleReference,
        region: BufferTextureCopyRegion,
        timing: CopyTiming,
    ) {
        self.copy_buffer_to_image_regions(src, dst, &[region], timing);
    }

    /// GPU copy from a buffer into an image, several regions.
    pub fn copy_buffer_to_image_regions(
        &self,
        src: &RenderHandleReference,
        dst: &RenderHandleReference,
        regions: &[BufferTextureCopyRegion],
        timing: CopyTiming,
    ) {
        if regions.is_empty()
            || !self.gpu.is_gpu_buffer(src.handle())
            || !self.gpu.is_gpu_image(dst.handle())
        {
            log::debug!("{}: copy_buffer_to_image dropped", self.name);
            return;
        }
        self.state
            .lock()
            .accumulating
            .timed(timing)
            .push_buffer_to_image(Self::direct_op(src, dst), regions.iter().copied());
    }

    /// GPU copy from an image into a buffer.
    pub fn copy_image_to_buffer(
        &self,
        src: &RenderHandleReference,
        dst: &RenderHandleReference,
        region: BufferTextureCopyRegion,
        timing: CopyTiming,
    ) {
        if !self.gpu.is_gpu_image(src.handle()) || !self.gpu.is_gpu_buffer(dst.handle()) {
            log::debug!("{}: copy_image_to_buffer dropped", self.name);
            return;
        }
        self.state
            .lock()
            .accumulating
            .timed(timing)
            .push_image_to_buffer(Self::direct_op(src, dst), [region]);
    }

    /// GPU copy between two images.
    pub fn copy_image_to_image(
        &self,
        src: &RenderHandleReference,
        dst: &RenderHandleReference,
        region: TextureCopyRegion,
        timing: CopyTiming,
    ) {
        if !self.gpu.is_gpu_image(src.handle()) || !self.gpu.is_gpu_image(dst.handle()) {
            log::debug!("{}: copy_image_to_image dropped", self.name);
            return;
        }
        self.state
            .lock()
            .accumulating
            .timed(timing)
            .push_image_to_image(Self::direct_op(src, dst), [region]);
    }

    /// Clear every mip and layer of an image to `color`.
    pub fn clear_color_image(&self, dst: &RenderHandleReference, color: ClearColorValue) {
        let Some(descriptor) = self.gpu.texture_descriptor(dst.handle()) else {
            log::debug!("{}: clear_color_image dropped (invalid image)", self.name);
            return;
        };
        let mut state = self.state.lock();
        state.accumulating.clear_byte_size += descriptor.byte_size();
        state.accumulating.clears.clears.push(StagingImageClear {
            handle: dst.clone(),
            color,
        });
    }

    /// Mark queued operations touching a destroyed resource as invalid.
    pub fn invalidate_handle(&self, handle: RenderHandle) -> usize {
        let mut state = self.state.lock();
        state.accumulating.invalidate_handle(handle) + state.frame.invalidate_handle(handle)
    }

    /// Whether the frame batch has begin-frame work (copies, direct copies or clears).
    pub fn has_staging_data(&self) -> bool {
        let state = self.state.lock();
        !state.frame.staging.is_empty()
            || !state.frame.direct_copies.is_empty()
            || !state.frame.clears.is_empty()
    }

    /// Whether the frame batch has end-frame copies.
    pub fn has_end_staging_data(&self) -> bool {
        !self.state.lock().frame.end_staging.is_empty()
    }

    /// Take the begin-frame copies of the frame batch.
    pub fn consume_staging_data(&self) -> StagingConsumeStruct {
        std::mem::take(&mut self.state.lock().frame.staging)
    }

    /// Take the end-frame copies of the frame batch.
    pub fn consume_end_staging_data(&self) -> StagingConsumeStruct {
        std::mem::take(&mut self.state.lock().frame.end_staging)
    }

    /// Take the direct CPU copies of the frame batch.
    pub fn consume_staging_direct_data_copy(&self) -> StagingDirectDataCopyConsumeStruct {
        std::mem::take(&mut self.state.lock().frame.direct_copies)
    }

    /// Take the image clears of the frame batch.
    pub fn consume_staging_clear_data(&self) -> StagingImageClearConsumeStruct {
        let mut state = self.state.lock();
        state.frame.clear_byte_size = 0;
        std::mem::take(&mut state.frame.clears)
    }

    /// Byte size of all images cleared by the frame batch.
    pub fn staging_clear_byte_size(&self) -> u64 {
        self.state.lock().frame.clear_byte_size
    }

    /// Staging buffers used by the current frame, released in `post_render`.
    pub fn frame_staging_buffers(&self) -> Vec<RenderHandleReference> {
        self.state.lock().frame_staging_buffers.clone()
    }
}

impl std::fmt::Debug for RenderDataStoreDefaultStaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDataStoreDefaultStaging")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl RenderDataStore for RenderDataStoreDefaultStaging {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn pre_render(&self) {
        let mut state = self.state.lock();
        let incoming = std::mem::take(&mut state.accumulating);
        if state.frame.is_empty() {
            state.frame = incoming;
        } else {
            log::debug!("{}: previous frame batch was not consumed, merging", self.name);
            state.frame.append(incoming);
        }
        let buffers = std::mem::take(&mut state.frame.staging_buffers);
        state.frame_staging_buffers.extend(buffers);
    }

    fn post_render(&self) {
        self.state.lock().frame_staging_buffers.clear();
    }

    fn clear(&self) {
        *self.state.lock() = StagingState::default();
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyGpuResourceManager;
    use crate::types::{
        BufferUsage, Extent3d, MemoryPropertyFlags, TextureDescriptor, TextureFormat,
        TextureUsage,
    };

    fn setup() -> (Arc<DummyGpuResourceManager>, RenderDataStoreDefaultStaging) {
        let gpu = Arc::new(DummyGpuResourceManager::new(2));
        let store = RenderDataStoreDefaultStaging::new("staging", gpu.clone());
        (gpu, store)
    }

    fn buffer(gpu: &DummyGpuResourceManager, size: u64) -> RenderHandleReference {
        gpu.create_buffer(&BufferDescriptor::new(size, BufferUsage::TRANSFER_DST))
            .unwrap()
    }

    fn image(gpu: &DummyGpuResourceManager) -> RenderHandleReference {
        gpu.create_texture(&TextureDescriptor::new_2d(
            4,
            4,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TRANSFER_DST,
        ))
        .unwrap()
    }

    #[test]
    fn test_copy_data_to_buffer_records_one_copy() {
        let (gpu, store) = setup();
        let dst = buffer(&gpu, 16);
        store.copy_data_to_buffer(&[1, 2, 3, 4], &dst, BufferCopyRegion::whole(4));
        store.pre_render();

        assert!(store.has_staging_data());
        let staging_buffers = store.frame_staging_buffers();
        assert_eq!(staging_buffers.len(), 1);
        let size = gpu
            .buffer_descriptor(staging_buffers[0].handle())
            .map(|d| d.size);
        assert!(size.is_some_and(|s| s >= 4));

        let batch = store.consume_staging_data();
        assert_eq!(batch.buffer_to_buffer.len(), 1);
        assert_eq!(batch.buffer_copies.len(), 1);
        assert_eq!(batch.buffer_copies[0].size, 4);
        assert_eq!(batch.buffer_to_buffer[0].dst_handle, dst);
    }

    #[test]
    fn test_zero_length_copy_is_noop() {
        let (gpu, store) = setup();
        let dst = buffer(&gpu, 16);
        store.copy_data_to_buffer(&[], &dst, BufferCopyRegion::whole(0));
        store.pre_render();
        assert!(!store.has_staging_data());
        assert!(store.frame_staging_buffers().is_empty());
    }

    #[test]
    fn test_wrong_resource_kind_dropped() {
        let (gpu, store) = setup();
        let img = image(&gpu);
        let buf = buffer(&gpu, 64);
        store.copy_data_to_buffer(&[1; 4], &img, BufferCopyRegion::whole(4));
        store.copy_buffer_to_buffer(&buf, &img, BufferCopyRegion::whole(4), CopyTiming::BeginFrame);
        let image_region = TextureCopyRegion::whole(Extent3d::new_2d(4, 4));
        store.copy_image_to_image(&buf, &img, image_region, CopyTiming::BeginFrame);
        store.pre_render();
        assert!(!store.has_staging_data());
    }

    #[test]
    fn test_consume_is_read_once() {
        let (gpu, store) = setup();
        let dst = buffer(&gpu, 16);
        store.copy_data_to_buffer(&[7; 8], &dst, BufferCopyRegion::whole(8));
        store.pre_render();

        assert!(!store.consume_staging_data().is_empty());
        assert!(store.consume_staging_data().is_empty());
        assert!(!store.has_staging_data());
    }

    #[test]
    fn test_batch_isolation() {
        let (gpu, store) = setup();
        let dst = buffer(&gpu, 16);
        store.copy_data_to_buffer(&[1; 4], &dst, BufferCopyRegion::whole(4));
        store.pre_render();

        // enqueued after the swap: belongs to the next frame
        store.copy_data_to_buffer(&[2; 8], &dst, BufferCopyRegion::whole(8));
        let batch = store.consume_staging_data();
        assert_eq!(batch.buffer_copies.len(), 1);
        assert_eq!(batch.buffer_copies[0].size, 4);

        store.post_render();
        store.pre_render();
        let batch = store.consume_staging_data();
        assert_eq!(batch.buffer_copies.len(), 1);
        assert_eq!(batch.buffer_copies[0].size, 8);
    }

    #[test]
    fn test_unconsumed_batch_merged_in_front() {
        let (gpu, store) = setup();
        let dst = buffer(&gpu, 16);
        store.copy_data_to_buffer(&[1; 4], &dst, BufferCopyRegion::whole(4));
        store.pre_render();
        // frame aborted: nothing consumed
        store.copy_data_to_buffer(&[2; 8], &dst, BufferCopyRegion::whole(8));
        store.pre_render();

        let batch = store.consume_staging_data();
        let sizes: Vec<u64> = batch.buffer_copies.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![4, 8]);
        assert_eq!(batch.buffer_to_buffer[1].region_range(), 1..2);
    }

    #[test]
    fn test_on_cpu_requires_host_coherent() {
        let (gpu, store) = setup();
        let device_local = buffer(&gpu, 16);
        let host = gpu
            .create_buffer(
                &BufferDescriptor::new(16, BufferUsage::UNIFORM).with_memory(
                    MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
                ),
            )
            .unwrap();

        store.copy_data_to_buffer_on_cpu(&[1; 4], &device_local, BufferCopyRegion::whole(4));
        store.copy_data_to_buffer_on_cpu(&[1; 4], &host, BufferCopyRegion::whole(4));
        store.pre_render();

        let direct = store.consume_staging_direct_data_copy();
        assert_eq!(direct.data_copies.len(), 1);
        assert_eq!(direct.data_copies[0].dst_handle, host);
    }

    #[test]
    fn test_end_frame_timing_separated() {
        let (gpu, store) = setup();
        let a = buffer(&gpu, 16);
        let b = buffer(&gpu, 16);
        store.copy_buffer_to_buffer(&a, &b, BufferCopyRegion::whole(16), CopyTiming::EndFrame);
        store.pre_render();

        assert!(!store.has_staging_data());
        assert!(store.has_end_staging_data());
        assert_eq!(store.consume_end_staging_data().buffer_to_buffer.len(), 1);
    }

    #[test]
    fn test_clear_byte_size_accumulates() {
        let (gpu, store) = setup();
        let img = image(&gpu);
        store.clear_color_image(&img, ClearColorValue::color(1.0, 0.0, 0.0, 1.0));
        store.clear_color_image(&img, ClearColorValue::color(0.0, 1.0, 0.0, 1.0));
        store.pre_render();

        assert!(store.has_staging_data());
        assert_eq!(store.staging_clear_byte_size(), 2 * 4 * 4 * 4);
        assert_eq!(store.consume_staging_clear_data().clears.len(), 2);
        assert_eq!(store.staging_clear_byte_size(), 0);
    }

    #[test]
    fn test_post_render_releases_staging_buffers() {
        let (gpu, store) = setup();
        let dst = buffer(&gpu, 16);
        store.copy_data_to_buffer(&[1; 4], &dst, BufferCopyRegion::whole(4));
        store.pre_render();
        drop(store.consume_staging_data());
        assert_eq!(store.frame_staging_buffers().len(), 1);
        store.post_render();
        assert!(store.frame_staging_buffers().is_empty());
    }

    #[test]
    fn test_overflowing_regions_dropped() {
        let (gpu, store) = setup();
        let host = gpu
            .create_buffer(
                &BufferDescriptor::new(16, BufferUsage::UNIFORM).with_memory(
                    MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
                ),
            )
            .unwrap();
        let a = buffer(&gpu, 16);
        let b = buffer(&gpu, 16);
        let overflowing = BufferCopyRegion::new(0, u64::MAX - 1, 4);

        store.copy_data_to_buffer_on_cpu(&[1; 4], &host, overflowing);
        store.copy_data_to_buffer(&[1; 4], &a, overflowing);
        store.copy_buffer_to_buffer(&a, &b, overflowing, CopyTiming::BeginFrame);
        let past_end = BufferCopyRegion::new(u64::MAX, 0, 4);
        store.copy_buffer_to_buffer(&a, &b, past_end, CopyTiming::EndFrame);
        store.pre_render();

        assert!(!store.has_staging_data());
        assert!(!store.has_end_staging_data());
        assert!(store.consume_staging_direct_data_copy().is_empty());
        assert!(store.frame_staging_buffers().is_empty());
    }

    #[test]
    fn test_regions_outside_destination_dropped() {
        let (gpu, store) = setup();
        let small = buffer(&gpu, 8);
        let large = buffer(&gpu, 64);

        store.copy_data_to_buffer(&[1; 16], &small, BufferCopyRegion::whole(16));
        store.copy_data_to_buffer(&[1; 4], &small, BufferCopyRegion::new(0, 6, 4));
        let region = BufferCopyRegion::whole(16);
        store.copy_buffer_to_buffer(&large, &small, region, CopyTiming::BeginFrame);
        store.copy_buffer_to_buffer(&small, &large, region, CopyTiming::BeginFrame);
        store.copy_data_to_buffer(&[1; 8], &small, BufferCopyRegion::whole(8));
        store.pre_render();

        let batch = store.consume_staging_data();
        assert_eq!(batch.buffer_to_buffer.len(), 1);
        assert_eq!(batch.buffer_copies[0], BufferCopyRegion::whole(8));
    }

    #[test]
    fn test_image_regions_must_fit_data() {
        let (gpu, store) = setup();
        let img = image(&gpu);
        let whole = BufferTextureCopyRegion::whole(Extent3d::new_2d(4, 4));

        // 4x4 Rgba8 needs 64 bytes
        store.copy_data_to_image(&[0; 63], &img, &[whole]);
        store.copy_data_to_image(&[0; 64], &img, &[whole.with_buffer_offset(1)]);
        store.copy_data_to_image(&[0; 64], &img, &[whole.with_buffer_offset(u64::MAX - 8)]);
        store.pre_render();
        assert!(!store.has_staging_data());

        store.copy_data_to_image(&[0; 65], &img, &[whole.with_buffer_offset(1)]);
        store.post_render();
        store.pre_render();
        assert_eq!(store.consume_staging_data().buffer_to_image.len(), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (gpu, store) = setup();
        let dst = buffer(&gpu, 16);
        store.copy_data_to_buffer(&[1; 4], &dst, BufferCopyRegion::whole(4));
        assert_eq!(store.invalidate_handle(dst.handle()), 1);
        store.pre_render();
        assert!(store.consume_staging_data().buffer_to_buffer[0].invalid_operation);

        store.copy_data_to_buffer(&[1; 4], &dst, BufferCopyRegion::whole(4));
        store.clear();
        store.pre_render();
        assert!(!store.has_staging_data());
    }
}
