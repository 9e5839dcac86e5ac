//! Replays staging batches into a command list.
//!
//! Every copy direction is recorded inside one bracket with automatic
//! barrier points disabled:
//!
//! ```text
//! BeginDisableAutomaticBarrierPoints
//! BarrierPoint (input barriers of every destination/source)
//! copies...            (per image, then its mip generation blits)
//! BarrierPoint (output barriers)
//! EndDisableAutomaticBarrierPoints
//! ```
//!
//! Resources created with dynamic barriers are tracked by the backend and
//! get no explicit input/output barriers here.

use crate::command::RenderCommandList;
use crate::device::{DeviceBackendType, GpuResourceManager};
use crate::handle::{RenderHandle, RenderHandleReference};
use crate::types::{
    BufferDescriptor, BufferRange, BufferTextureCopyRegion, BufferTextureLayout,
    EngineTextureCreationFlags, ImageLayout, ImageSubresourceRange, ResourceBarrierState,
    TextureBlitRegion, TextureCopyLocation,
};

use super::{
    StagingConsumeStruct, StagingCopyStruct, StagingDirectDataCopyConsumeStruct,
    StagingImageClearConsumeStruct,
};

/// Default upper bound of the CPU clear scratch buffer (8 MiB).
pub const DEFAULT_CLEAR_BUDGET: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResourceKind {
    Buffer,
    Image,
}

fn is_kind(gpu: &dyn GpuResourceManager, handle: RenderHandle, kind: ResourceKind) -> bool {
    match kind {
        ResourceKind::Buffer => gpu.is_gpu_buffer(handle),
        ResourceKind::Image => gpu.is_gpu_image(handle),
    }
}

struct ValidOp<'b, R> {
    op: &'b StagingCopyStruct,
    regions: &'b [R],
}

type OpsOf = fn(&StagingConsumeStruct) -> &[StagingCopyStruct];

/// Collect the executable operations of one direction across batches.
fn collect_ops<'b, R>(
    gpu: &dyn GpuResourceManager,
    batches: &[&'b StagingConsumeStruct],
    ops_of: OpsOf,
    regions_of: fn(&StagingConsumeStruct) -> &[R],
    src_kind: ResourceKind,
    dst_kind: ResourceKind,
) -> Vec<ValidOp<'b, R>> {
    let mut valid = Vec::new();
    for &batch in batches {
        let regions = regions_of(batch);
        for op in ops_of(batch) {
            if op.invalid_operation {
                let dst = op.dst_handle.handle();
                log::debug!("staging: skipping invalidated operation {:?}", dst);
                continue;
            }
            if !is_kind(gpu, op.src_handle.handle(), src_kind)
                || !is_kind(gpu, op.dst_handle.handle(), dst_kind)
            {
                log::debug!(
                    "staging: skipping operation on dead resource {:?} -> {:?}",
                    op.src_handle.handle(),
                    op.dst_handle.handle()
                );
                continue;
            }
            match regions.get(op.region_range()) {
                Some(regions) if !regions.is_empty() => valid.push(ValidOp { op, regions }),
                _ => log::debug!("staging: skipping operation with empty or broken regions"),
            }
        }
    }
    valid
}

fn location_range(location: &TextureCopyLocation) -> ImageSubresourceRange {
    ImageSubresourceRange {
        base_mip_level: location.mip_level,
        level_count: 1,
        base_array_layer: location.base_array_layer,
        layer_count: location.layer_count,
    }
}

fn image_state(layout: ImageLayout) -> ResourceBarrierState {
    ResourceBarrierState::image(layout)
}

fn buffer_output_barrier(cmd: &mut RenderCommandList, handle: RenderHandle, range: BufferRange) {
    if handle.is_dynamic_resource() {
        return;
    }
    cmd.custom_buffer_barrier(
        handle,
        ResourceBarrierState::transfer_write(),
        ResourceBarrierState::shader_read(),
        range,
    );
}

fn image_barrier(
    cmd: &mut RenderCommandList,
    handle: RenderHandle,
    from: ImageLayout,
    to: ImageLayout,
    range: ImageSubresourceRange,
) {
    if handle.is_dynamic_resource() {
        return;
    }
    cmd.custom_image_barrier(handle, image_state(from), image_state(to), range);
}

/// Mips `base_mip_level + 1..mip_count` are blitted from the last uploaded mip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MipChain {
    base_mip_level: u32,
    mip_count: u32,
}

impl MipChain {
    /// Chain of an image whose uploads end at `last_uploaded_mip`.
    ///
    /// `None` unless the image generates mips and a level above the upload is left.
    fn after_upload(
        gpu: &dyn GpuResourceManager,
        image: RenderHandle,
        last_uploaded_mip: u32,
    ) -> Option<Self> {
        let descriptor = gpu.texture_descriptor(image)?;
        let generates = descriptor
            .engine_flags
            .contains(EngineTextureCreationFlags::GENERATE_MIPS);
        let remaining = last_uploaded_mip.saturating_add(1) < descriptor.mip_level_count;
        (generates && remaining).then_some(Self {
            base_mip_level: last_uploaded_mip,
            mip_count: descriptor.mip_level_count,
        })
    }

    /// Uploaded base plus every generated mip.
    fn written_range(&self) -> ImageSubresourceRange {
        ImageSubresourceRange {
            base_mip_level: self.base_mip_level,
            level_count: self.mip_count - self.base_mip_level,
            base_array_layer: 0,
            layer_count: ImageSubresourceRange::REMAINING,
        }
    }

    /// Mips read by a blit.
    fn source_range(&self) -> ImageSubresourceRange {
        ImageSubresourceRange {
            base_mip_level: self.base_mip_level,
            level_count: self.mip_count - 1 - self.base_mip_level,
            base_array_layer: 0,
            layer_count: ImageSubresourceRange::REMAINING,
        }
    }
}

/// Every buffer to image copy targeting one image.
struct ImageUpload<'b> {
    dst: RenderHandle,
    copies: Vec<(RenderHandle, &'b BufferTextureCopyRegion)>,
    mip_chain: Option<MipChain>,
}

impl ImageUpload<'_> {
    /// Ranges of copied regions not covered by the mip chain.
    fn region_ranges(&self) -> impl Iterator<Item = ImageSubresourceRange> + '_ {
        let below = self.mip_chain.map_or(u32::MAX, |chain| chain.base_mip_level);
        self.copies
            .iter()
            .map(|(_, region)| &region.texture_location)
            .filter(move |location| location.mip_level < below)
            .map(location_range)
    }
}

/// Group upload operations by destination image in first-use order.
fn group_image_uploads<'b>(
    gpu: &dyn GpuResourceManager,
    ops: &[ValidOp<'b, BufferTextureCopyRegion>],
) -> Vec<ImageUpload<'b>> {
    let mut uploads: Vec<ImageUpload<'b>> = Vec::new();
    for valid in ops {
        let (src, dst) = (valid.op.src_handle.handle(), valid.op.dst_handle.handle());
        let index = match uploads.iter().position(|upload| upload.dst == dst) {
            Some(index) => index,
            None => {
                uploads.push(ImageUpload {
                    dst,
                    copies: Vec::new(),
                    mip_chain: None,
                });
                uploads.len() - 1
            }
        };
        uploads[index]
            .copies
            .extend(valid.regions.iter().map(|region| (src, region)));
    }
    for upload in &mut uploads {
        let last_mip = upload
            .copies
            .iter()
            .map(|(_, region)| region.texture_location.mip_level)
            .max()
            .unwrap_or(0);
        upload.mip_chain = MipChain::after_upload(gpu, upload.dst, last_mip);
    }
    uploads
}

#[derive(Debug)]
struct ClearScratch {
    buffer: RenderHandleReference,
    byte_size: u64,
}

/// Records staging work for one staging node.
#[derive(Debug)]
pub struct RenderStaging {
    clear_budget: u64,
    scratch: Option<ClearScratch>,
}

impl Default for RenderStaging {
    fn default() -> Self {
        Self::new(DEFAULT_CLEAR_BUDGET)
    }
}

impl RenderStaging {
    /// Create a recorder whose CPU clear scratch never exceeds `clear_budget` bytes.
    pub fn new(clear_budget: u64) -> Self {
        Self {
            clear_budget,
            scratch: None,
        }
    }

    /// Size of the current clear scratch buffer.
    pub fn clear_scratch_byte_size(&self) -> u64 {
        self.scratch.as_ref().map_or(0, |s| s.byte_size)
    }

    /// Prepare per-frame resources before execution.
    ///
    /// On backends that clear images through staging copies, a host-visible
    /// scratch buffer of `min(clear_byte_size, budget)` bytes is created. It
    /// is committed by the scheduler before nodes execute.
    pub fn pre_execute_frame(
        &mut self,
        gpu: &dyn GpuResourceManager,
        backend_type: DeviceBackendType,
        clear_byte_size: u64,
    ) {
        if !backend_type.requires_staging_clears() || clear_byte_size == 0 {
            self.scratch = None;
            return;
        }
        let byte_size = clear_byte_size.min(self.clear_budget);
        if byte_size < clear_byte_size {
            log::warn!(
                "staging: image clears need {} bytes, capped to {} bytes",
                clear_byte_size,
                byte_size
            );
        }
        if self.scratch.as_ref().is_some_and(|s| s.byte_size == byte_size) {
            return;
        }
        let descriptor = BufferDescriptor::staging(byte_size).with_label("staging clear scratch");
        self.scratch = match gpu.create_buffer(&descriptor) {
            Ok(buffer) => Some(ClearScratch { buffer, byte_size }),
            Err(err) => {
                log::error!("staging: clear scratch creation failed: {}", err);
                None
            }
        };
    }

    /// Write host payloads into their staging buffers.
    pub fn copy_host_to_staging(&self, gpu: &dyn GpuResourceManager, batch: &StagingConsumeStruct) {
        crate::profile_scope!("staging: host to staging");

        for op in batch.buffer_to_buffer.iter().chain(batch.buffer_to_image.iter()) {
            if op.invalid_operation {
                continue;
            }
            let Some(bytes) = op.data.host_bytes() else {
                continue;
            };
            let Some(mut mapped) = gpu.map_buffer(op.src_handle.handle()) else {
                log::error!("staging: mapping staging buffer {:?} failed", op.src_handle.handle());
                continue;
            };
            let len = bytes.len().min(mapped.len());
            if len < bytes.len() {
                log::error!(
                    "staging: staging buffer {:?} too small ({} < {})",
                    op.src_handle.handle(),
                    mapped.len(),
                    bytes.len()
                );
            }
            mapped[..len].copy_from_slice(&bytes[..len]);
        }
    }

    /// Perform direct CPU copies into host-coherent buffers.
    pub fn copy_direct_data(
        &self,
        gpu: &dyn GpuResourceManager,
        direct: &StagingDirectDataCopyConsumeStruct,
    ) {
        for copy in &direct.data_copies {
            let dst_handle = copy.dst_handle.handle();
            let Some(mut mapped) = gpu.map_buffer(dst_handle) else {
                log::error!("staging: mapping buffer {:?} for direct copy failed", dst_handle);
                continue;
            };
            let region = copy.region;
            let (Some(src), Some(dst)) = (region.src_range(), region.dst_range()) else {
                log::error!("staging: direct copy region {:?} overflows", region);
                continue;
            };
            match (copy.data.get(src), mapped.get_mut(dst)) {
                (Some(src), Some(dst)) => dst.copy_from_slice(src),
                _ => log::error!("staging: direct copy region {:?} out of bounds", region),
            }
        }
    }

    /// Clear queued images.
    ///
    /// Uses hardware clears unless the backend needs staging clears, in
    /// which case the scratch buffer is filled on the CPU and copied into
    /// every mip level. Images that no longer fit the scratch buffer are
    /// skipped.
    pub fn clear_images(
        &self,
        cmd: &mut RenderCommandList,
        gpu: &dyn GpuResourceManager,
        backend_type: DeviceBackendType,
        clears: &StagingImageClearConsumeStruct,
    ) {
        crate::profile_scope!("staging: clear images");

        let images: Vec<_> = clears
            .clears
            .iter()
            .filter_map(|clear| {
                let descriptor = gpu.texture_descriptor(clear.handle.handle());
                if descriptor.is_none() {
                    log::debug!("staging: clear of dead image {:?} skipped", clear.handle.handle());
                }
                descriptor.map(|d| (clear, d))
            })
            .collect();
        if images.is_empty() {
            return;
        }

        if !backend_type.requires_staging_clears() {
            cmd.begin_disable_automatic_barrier_points();
            for (clear, _) in &images {
                let (from, to) = (ImageLayout::Undefined, ImageLayout::TransferDst);
                image_barrier(cmd, clear.handle.handle(), from, to, ImageSubresourceRange::all());
            }
            cmd.add_custom_barrier_point();
            for (clear, _) in &images {
                let range = ImageSubresourceRange::all();
                cmd.clear_color_image(clear.handle.handle(), clear.color, range);
            }
            for (clear, _) in &images {
                let (from, to) = (ImageLayout::TransferDst, ImageLayout::ShaderReadOnly);
                image_barrier(cmd, clear.handle.handle(), from, to, ImageSubresourceRange::all());
            }
            cmd.add_custom_barrier_point();
            cmd.end_disable_automatic_barrier_points();
            return;
        }

        let Some(scratch) = self.scratch.as_ref() else {
            log::warn!("staging: no clear scratch buffer, {} clears skipped", images.len());
            return;
        };

        // Fill the scratch buffer first, then record copies for what fit.
        let mut uploads: Vec<(RenderHandle, Vec<BufferTextureCopyRegion>)> = Vec::new();
        {
            let Some(mut mapped) = gpu.map_buffer(scratch.buffer.handle()) else {
                log::error!("staging: mapping clear scratch buffer failed");
                return;
            };
            let mut offset = 0u64;
            for (clear, descriptor) in &images {
                let byte_size = descriptor.byte_size();
                let end = offset + byte_size;
                if end > scratch.byte_size || end > mapped.len() as u64 {
                    log::warn!(
                        "staging: clear of {:?} ({} bytes) does not fit the clear budget, skipped",
                        clear.handle.handle(),
                        byte_size
                    );
                    continue;
                }
                let texel = clear.color.encode_texel(descriptor.format);
                let target = &mut mapped[offset as usize..end as usize];
                for chunk in target.chunks_exact_mut(texel.len()) {
                    chunk.copy_from_slice(&texel);
                }

                let mut regions = Vec::with_capacity(descriptor.mip_level_count as usize);
                let mut mip_offset = offset;
                for mip in 0..descriptor.mip_level_count {
                    regions.push(BufferTextureCopyRegion::new(
                        BufferTextureLayout::at_offset(mip_offset),
                        TextureCopyLocation::mip(mip).with_layers(0, descriptor.layer_count),
                        descriptor.mip_extent(mip),
                    ));
                    mip_offset += descriptor.mip_byte_size(mip) * u64::from(descriptor.layer_count);
                }
                uploads.push((clear.handle.handle(), regions));
                offset += byte_size;
            }
        }
        if uploads.is_empty() {
            return;
        }

        let src = scratch.buffer.handle();
        cmd.begin_disable_automatic_barrier_points();
        for (image, _) in &uploads {
            let (from, to) = (ImageLayout::Undefined, ImageLayout::TransferDst);
            image_barrier(cmd, *image, from, to, ImageSubresourceRange::all());
        }
        cmd.add_custom_barrier_point();
        for (image, regions) in &uploads {
            for region in regions {
                cmd.copy_buffer_to_image(src, *image, *region);
            }
        }
        for (image, _) in &uploads {
            let (from, to) = (ImageLayout::TransferDst, ImageLayout::ShaderReadOnly);
            image_barrier(cmd, *image, from, to, ImageSubresourceRange::all());
        }
        cmd.add_custom_barrier_point();
        cmd.end_disable_automatic_barrier_points();
    }

    /// Record buffer to buffer copies of every batch.
    pub fn copy_buffers_to_buffers(
        &self,
        cmd: &mut RenderCommandList,
        gpu: &dyn GpuResourceManager,
        batches: &[&StagingConsumeStruct],
    ) {
        let ops = collect_ops(
            gpu,
            batches,
            |b| b.buffer_to_buffer.as_slice(),
            |b| b.buffer_copies.as_slice(),
            ResourceKind::Buffer,
            ResourceKind::Buffer,
        );
        if ops.is_empty() {
            return;
        }

        cmd.begin_disable_automatic_barrier_points();
        for valid in &ops {
            let (src, dst) = (valid.op.src_handle.handle(), valid.op.dst_handle.handle());
            for region in valid.regions {
                cmd.copy_buffer_to_buffer(src, dst, *region);
            }
        }
        for valid in &ops {
            let dst = valid.op.dst_handle.handle();
            for region in valid.regions {
                buffer_output_barrier(cmd, dst, BufferRange::new(region.dst_offset, region.size));
            }
        }
        cmd.add_custom_barrier_point();
        cmd.end_disable_automatic_barrier_points();
    }

    /// Record buffer to image copies of every batch, with mip generation.
    ///
    /// Copies are grouped per destination image: every copy into an image is
    /// recorded before its mip chain is generated, and each image gets one
    /// input and one output transition per touched subresource range.
    pub fn copy_staging_to_images(
        &self,
        cmd: &mut RenderCommandList,
        gpu: &dyn GpuResourceManager,
        batches: &[&StagingConsumeStruct],
    ) {
        let ops = collect_ops(
            gpu,
            batches,
            |b| b.buffer_to_image.as_slice(),
            |b| b.buffer_image_copies.as_slice(),
            ResourceKind::Buffer,
            ResourceKind::Image,
        );
        if ops.is_empty() {
            return;
        }
        let uploads = group_image_uploads(gpu, &ops);

        cmd.begin_disable_automatic_barrier_points();
        for upload in &uploads {
            if let Some(chain) = upload.mip_chain {
                let (from, to) = (ImageLayout::Undefined, ImageLayout::TransferDst);
                image_barrier(cmd, upload.dst, from, to, chain.written_range());
            }
            for range in upload.region_ranges() {
                let (from, to) = (ImageLayout::Undefined, ImageLayout::TransferDst);
                image_barrier(cmd, upload.dst, from, to, range);
            }
        }
        cmd.add_custom_barrier_point();

        for upload in &uploads {
            for (src, region) in &upload.copies {
                cmd.copy_buffer_to_image(*src, upload.dst, **region);
            }
            if let Some(chain) = upload.mip_chain {
                self.generate_mips(cmd, gpu, upload.dst, chain);
            }
        }

        for upload in &uploads {
            let dst = upload.dst;
            let read = ImageLayout::ShaderReadOnly;
            if let Some(chain) = upload.mip_chain {
                let last = ImageSubresourceRange::mip(chain.mip_count - 1);
                image_barrier(cmd, dst, ImageLayout::TransferSrc, read, chain.source_range());
                image_barrier(cmd, dst, ImageLayout::TransferDst, read, last);
            }
            for range in upload.region_ranges() {
                image_barrier(cmd, dst, ImageLayout::TransferDst, read, range);
            }
        }
        cmd.add_custom_barrier_point();
        cmd.end_disable_automatic_barrier_points();
    }

    /// Blit mip `i - 1` into mip `i` for every level after the chain base.
    ///
    /// Leaves mips `base..mip_count - 1` in `TransferSrc` and the last mip in
    /// `TransferDst`.
    fn generate_mips(
        &self,
        cmd: &mut RenderCommandList,
        gpu: &dyn GpuResourceManager,
        image: RenderHandle,
        chain: MipChain,
    ) {
        let Some(descriptor) = gpu.texture_descriptor(image) else {
            return;
        };
        for mip in chain.base_mip_level + 1..chain.mip_count {
            let (from, to) = (ImageLayout::TransferDst, ImageLayout::TransferSrc);
            image_barrier(cmd, image, from, to, ImageSubresourceRange::mip(mip - 1));
            cmd.add_custom_barrier_point();
            cmd.blit_image(
                image,
                image,
                TextureBlitRegion {
                    src_mip_level: mip - 1,
                    src_extent: descriptor.mip_extent(mip - 1),
                    dst_mip_level: mip,
                    dst_extent: descriptor.mip_extent(mip),
                    base_array_layer: 0,
                    layer_count: descriptor.layer_count,
                },
            );
        }
    }

    /// Record image to buffer copies of every batch.
    pub fn copy_images_to_buffers(
        &self,
        cmd: &mut RenderCommandList,
        gpu: &dyn GpuResourceManager,
        batches: &[&StagingConsumeStruct],
    ) {
        let ops = collect_ops(
            gpu,
            batches,
            |b| b.image_to_buffer.as_slice(),
            |b| b.buffer_image_copies.as_slice(),
            ResourceKind::Image,
            ResourceKind::Buffer,
        );
        if ops.is_empty() {
            return;
        }

        cmd.begin_disable_automatic_barrier_points();
        for valid in &ops {
            let src = valid.op.src_handle.handle();
            for region in valid.regions {
                let range = location_range(&region.texture_location);
                let (from, to) = (ImageLayout::ShaderReadOnly, ImageLayout::TransferSrc);
                image_barrier(cmd, src, from, to, range);
            }
        }
        cmd.add_custom_barrier_point();
        for valid in &ops {
            let (src, dst) = (valid.op.src_handle.handle(), valid.op.dst_handle.handle());
            for region in valid.regions {
                cmd.copy_image_to_buffer(src, dst, *region);
            }
        }
        for valid in &ops {
            let (src, dst) = (valid.op.src_handle.handle(), valid.op.dst_handle.handle());
            for region in valid.regions {
                let range = location_range(&region.texture_location);
                let (from, to) = (ImageLayout::TransferSrc, ImageLayout::ShaderReadOnly);
                image_barrier(cmd, src, from, to, range);
            }
            buffer_output_barrier(cmd, dst, BufferRange::whole());
        }
        cmd.add_custom_barrier_point();
        cmd.end_disable_automatic_barrier_points();
    }

    /// Record image to image copies of every batch.
    pub fn copy_images_to_images(
        &self,
        cmd: &mut RenderCommandList,
        gpu: &dyn GpuResourceManager,
        batches: &[&StagingConsumeStruct],
    ) {
        let ops = collect_ops(
            gpu,
            batches,
            |b| b.image_to_image.as_slice(),
            |b| b.image_copies.as_slice(),
            ResourceKind::Image,
            ResourceKind::Image,
        );
        if ops.is_empty() {
            return;
        }

        cmd.begin_disable_automatic_barrier_points();
        for valid in &ops {
            let (src, dst) = (valid.op.src_handle.handle(), valid.op.dst_handle.handle());
            for region in valid.regions {
                let (from, to) = (ImageLayout::ShaderReadOnly, ImageLayout::TransferSrc);
                image_barrier(cmd, src, from, to, location_range(&region.src));
                let (from, to) = (ImageLayout::Undefined, ImageLayout::TransferDst);
                image_barrier(cmd, dst, from, to, location_range(&region.dst));
            }
        }
        cmd.add_custom_barrier_point();
        for valid in &ops {
            let (src, dst) = (valid.op.src_handle.handle(), valid.op.dst_handle.handle());
            for region in valid.regions {
                cmd.copy_image_to_image(src, dst, *region);
            }
        }
        for valid in &ops {
            let (src, dst) = (valid.op.src_handle.handle(), valid.op.dst_handle.handle());
            for region in valid.regions {
                let src_range = location_range(&region.src);
                let dst_range = location_range(&region.dst);
                let read = ImageLayout::ShaderReadOnly;
                image_barrier(cmd, src, ImageLayout::TransferSrc, read, src_range);
                image_barrier(cmd, dst, ImageLayout::TransferDst, read, dst_range);
            }
        }
        cmd.add_custom_barrier_point();
        cmd.end_disable_automatic_barrier_points();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyGpuResourceManager;
    use crate::command::{RenderCommand, ResourceBarrier};
    use crate::staging::StagingDirectDataCopy;
    use crate::types::{
        BufferCopyRegion, Extent3d, TextureDescriptor, TextureFormat, TextureOrigin, TextureUsage,
    };

    fn texture(
        gpu: &DummyGpuResourceManager,
        mips: u32,
        flags: EngineTextureCreationFlags,
    ) -> RenderHandleReference {
        let usage = TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST | TextureUsage::TRANSFER_SRC;
        gpu.create_texture(
            &TextureDescriptor::new_2d(8, 8, TextureFormat::Rgba8Unorm, usage)
                .with_mip_levels(mips)
                .with_engine_flags(flags),
        )
        .unwrap()
    }

    fn upload(
        batch: &mut StagingConsumeStruct,
        gpu: &DummyGpuResourceManager,
        dst: &RenderHandleReference,
        regions: Vec<BufferTextureCopyRegion>,
    ) {
        let op = StagingCopyStruct {
            src_handle: gpu.create_buffer(&BufferDescriptor::staging(256)).unwrap(),
            dst_handle: dst.clone(),
            ..Default::default()
        };
        batch.push_buffer_to_image(op, regions);
    }

    fn mip_region(mip: u32, origin_x: u32, width: u32) -> BufferTextureCopyRegion {
        BufferTextureCopyRegion::new(
            BufferTextureLayout::at_offset(0),
            TextureCopyLocation::mip(mip).with_origin(TextureOrigin {
                x: origin_x,
                y: 0,
                z: 0,
            }),
            Extent3d::new_2d(width, 8 >> mip),
        )
    }

    fn record_uploads(
        gpu: &DummyGpuResourceManager,
        batch: &StagingConsumeStruct,
    ) -> RenderCommandList {
        let mut cmd = RenderCommandList::new();
        RenderStaging::default().copy_staging_to_images(&mut cmd, gpu, &[batch]);
        cmd
    }

    fn barriers_of(
        cmd: &RenderCommandList,
        point: usize,
        handle: RenderHandle,
    ) -> Vec<&ResourceBarrier> {
        cmd.barrier_list().barrier_points()[point]
            .barriers
            .iter()
            .filter(|barrier| barrier.handle() == handle)
            .collect()
    }

    fn blit_levels(cmd: &RenderCommandList) -> Vec<(u32, u32)> {
        cmd.commands()
            .iter()
            .filter_map(|command| match command {
                RenderCommand::BlitImage { region, .. } => {
                    Some((region.src_mip_level, region.dst_mip_level))
                }
                _ => None,
            })
            .collect()
    }

    /// Replays the recorded commands against per-mip layouts of `image`.
    ///
    /// Every barrier must start from the tracked layout, copies must write
    /// `TransferDst` mips and blits must read `TransferSrc` mips.
    fn replay_layouts(
        cmd: &RenderCommandList,
        image: RenderHandle,
        mip_count: u32,
    ) -> Vec<ImageLayout> {
        let mut layouts = vec![ImageLayout::Undefined; mip_count as usize];
        for command in cmd.commands() {
            match command {
                RenderCommand::BarrierPoint {
                    barrier_point_index,
                    ..
                } => {
                    let point = cmd
                        .barrier_list()
                        .barrier_point(*barrier_point_index)
                        .unwrap();
                    for barrier in &point.barriers {
                        let ResourceBarrier::Image {
                            handle,
                            src,
                            dst,
                            range,
                        } = barrier
                        else {
                            continue;
                        };
                        if *handle != image {
                            continue;
                        }
                        let end = match range.level_count {
                            ImageSubresourceRange::REMAINING => mip_count,
                            count => range.base_mip_level + count,
                        };
                        for mip in range.base_mip_level..end {
                            let layout = &mut layouts[mip as usize];
                            assert_eq!(*layout, src.layout, "mip {} before {:?}", mip, barrier);
                            *layout = dst.layout;
                        }
                    }
                }
                RenderCommand::CopyBufferToImage { dst, region, .. } if *dst == image => {
                    let mip = region.texture_location.mip_level as usize;
                    assert_eq!(layouts[mip], ImageLayout::TransferDst);
                }
                RenderCommand::BlitImage { dst, region, .. } if *dst == image => {
                    assert_eq!(layouts[region.src_mip_level as usize], ImageLayout::TransferSrc);
                    assert_eq!(layouts[region.dst_mip_level as usize], ImageLayout::TransferDst);
                }
                _ => {}
            }
        }
        layouts
    }

    #[test]
    fn test_one_input_and_output_barrier_per_image() {
        let gpu = DummyGpuResourceManager::new(2);
        let a = texture(&gpu, 1, EngineTextureCreationFlags::empty());
        let b = texture(&gpu, 1, EngineTextureCreationFlags::empty());
        let mut batch = StagingConsumeStruct::default();
        upload(&mut batch, &gpu, &a, vec![mip_region(0, 0, 4)]);
        upload(&mut batch, &gpu, &b, vec![mip_region(0, 0, 8)]);
        upload(&mut batch, &gpu, &a, vec![mip_region(0, 4, 4)]);

        let cmd = record_uploads(&gpu, &batch);

        assert_eq!(cmd.barrier_list().barrier_points().len(), 2);
        for handle in [a.handle(), b.handle()] {
            let input = barriers_of(&cmd, 0, handle);
            assert_eq!(input.len(), 1);
            assert_eq!(input[0].src().layout, ImageLayout::Undefined);
            assert_eq!(input[0].dst().layout, ImageLayout::TransferDst);
            let output = barriers_of(&cmd, 1, handle);
            assert_eq!(output.len(), 1);
            assert_eq!(output[0].dst().layout, ImageLayout::ShaderReadOnly);
        }
        // copies into one image are recorded together
        let dsts: Vec<RenderHandle> = cmd
            .commands()
            .iter()
            .filter_map(|command| match command {
                RenderCommand::CopyBufferToImage { dst, .. } => Some(*dst),
                _ => None,
            })
            .collect();
        assert_eq!(dsts, vec![a.handle(), a.handle(), b.handle()]);
    }

    #[test]
    fn test_dynamic_barrier_image_gets_no_explicit_barriers() {
        let gpu = DummyGpuResourceManager::new(2);
        let tracked = texture(&gpu, 1, EngineTextureCreationFlags::empty());
        let dynamic = texture(&gpu, 1, EngineTextureCreationFlags::DYNAMIC_BARRIERS);
        assert!(dynamic.handle().is_dynamic_resource());
        let mut batch = StagingConsumeStruct::default();
        upload(&mut batch, &gpu, &tracked, vec![mip_region(0, 0, 8)]);
        upload(&mut batch, &gpu, &dynamic, vec![mip_region(0, 0, 8)]);

        let cmd = record_uploads(&gpu, &batch);

        assert_eq!(cmd.work_command_count(), 2);
        assert_eq!(barriers_of(&cmd, 0, tracked.handle()).len(), 1);
        assert_eq!(barriers_of(&cmd, 1, tracked.handle()).len(), 1);
        let total_dynamic = cmd
            .barrier_list()
            .barrier_points()
            .iter()
            .flat_map(|point| &point.barriers)
            .filter(|barrier| barrier.handle() == dynamic.handle())
            .count();
        assert_eq!(total_dynamic, 0);
    }

    #[test]
    fn test_dynamic_mip_chain_records_blits_without_barriers() {
        let gpu = DummyGpuResourceManager::new(2);
        let flags = EngineTextureCreationFlags::DYNAMIC_BARRIERS
            | EngineTextureCreationFlags::GENERATE_MIPS;
        let image = texture(&gpu, 3, flags);
        let mut batch = StagingConsumeStruct::default();
        upload(&mut batch, &gpu, &image, vec![mip_region(0, 0, 8)]);

        let cmd = record_uploads(&gpu, &batch);

        assert_eq!(blit_levels(&cmd), vec![(0, 1), (1, 2)]);
        assert_eq!(cmd.barrier_list().total_barrier_count(), 0);
    }

    #[test]
    fn test_two_uploads_into_mip_generated_image() {
        let gpu = DummyGpuResourceManager::new(2);
        let image = texture(&gpu, 3, EngineTextureCreationFlags::GENERATE_MIPS);
        let mut batch = StagingConsumeStruct::default();
        upload(&mut batch, &gpu, &image, vec![mip_region(0, 0, 4)]);
        upload(&mut batch, &gpu, &image, vec![mip_region(0, 4, 4)]);

        let cmd = record_uploads(&gpu, &batch);

        assert_eq!(blit_levels(&cmd), vec![(0, 1), (1, 2)]);
        let layouts = replay_layouts(&cmd, image.handle(), 3);
        assert_eq!(layouts, vec![ImageLayout::ShaderReadOnly; 3]);
    }

    #[test]
    fn test_full_mip_chain_upload_skips_generation() {
        let gpu = DummyGpuResourceManager::new(2);
        let image = texture(&gpu, 3, EngineTextureCreationFlags::GENERATE_MIPS);
        let mut batch = StagingConsumeStruct::default();
        let regions = (0..3).map(|mip| mip_region(mip, 0, 8 >> mip)).collect();
        upload(&mut batch, &gpu, &image, regions);

        let cmd = record_uploads(&gpu, &batch);

        assert!(blit_levels(&cmd).is_empty());
        let layouts = replay_layouts(&cmd, image.handle(), 3);
        assert_eq!(layouts, vec![ImageLayout::ShaderReadOnly; 3]);
    }

    #[test]
    fn test_mip_chain_starts_at_last_uploaded_mip() {
        let gpu = DummyGpuResourceManager::new(2);
        let image = texture(&gpu, 4, EngineTextureCreationFlags::GENERATE_MIPS);
        let mut batch = StagingConsumeStruct::default();
        upload(&mut batch, &gpu, &image, vec![mip_region(2, 0, 2)]);

        let cmd = record_uploads(&gpu, &batch);

        assert_eq!(blit_levels(&cmd), vec![(2, 3)]);
        let layouts = replay_layouts(&cmd, image.handle(), 4);
        assert_eq!(
            layouts,
            vec![
                ImageLayout::Undefined,
                ImageLayout::Undefined,
                ImageLayout::ShaderReadOnly,
                ImageLayout::ShaderReadOnly,
            ]
        );
    }

    #[test]
    fn test_lower_mips_uploaded_below_chain_base() {
        let gpu = DummyGpuResourceManager::new(2);
        let image = texture(&gpu, 4, EngineTextureCreationFlags::GENERATE_MIPS);
        let mut batch = StagingConsumeStruct::default();
        upload(&mut batch, &gpu, &image, vec![mip_region(1, 0, 4)]);
        upload(&mut batch, &gpu, &image, vec![mip_region(0, 0, 8)]);

        let cmd = record_uploads(&gpu, &batch);

        assert_eq!(blit_levels(&cmd), vec![(1, 2), (2, 3)]);
        let layouts = replay_layouts(&cmd, image.handle(), 4);
        assert_eq!(layouts, vec![ImageLayout::ShaderReadOnly; 4]);
    }

    #[test]
    fn test_direct_copy_with_overflowing_region_is_skipped() {
        let gpu = DummyGpuResourceManager::new(2);
        let dst = gpu.create_buffer(&BufferDescriptor::staging(16)).unwrap();
        gpu.handle_pending_allocations();
        let direct = StagingDirectDataCopyConsumeStruct {
            data_copies: vec![
                StagingDirectDataCopy {
                    data: vec![9; 4],
                    dst_handle: dst.clone(),
                    region: BufferCopyRegion::new(0, u64::MAX - 1, 4),
                },
                StagingDirectDataCopy {
                    data: vec![7; 4],
                    dst_handle: dst.clone(),
                    region: BufferCopyRegion::new(0, 4, 4),
                },
            ],
        };

        RenderStaging::default().copy_direct_data(&gpu, &direct);

        let bytes = gpu.read_buffer(dst.handle()).unwrap();
        assert_eq!(&bytes[..8], &[0, 0, 0, 0, 7, 7, 7, 7]);
    }
}
