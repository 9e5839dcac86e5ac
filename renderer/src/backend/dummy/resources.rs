use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::device::{GpuResourceManager, MappedBuffer};
use crate::error::RendererError;
use crate::handle::{RenderHandle, RenderHandleInfoFlags, RenderHandleReference, RenderHandleType};
use crate::staging::{StagingConsumeStruct, StagingCopyStruct, StagingData};
use crate::types::{
    BufferCopyRegion, BufferDescriptor, BufferTextureCopyRegion, EngineBufferCreationFlags,
    EngineTextureCreationFlags, MemoryPropertyFlags, TextureDescriptor,
};

const GENERATION_MASK: u32 = 0x00FF_FFFF;

#[derive(Debug, Clone)]
enum ResourceDesc {
    Buffer(BufferDescriptor),
    Texture(TextureDescriptor),
}

#[derive(Debug)]
struct ResourceEntry {
    reference: RenderHandleReference,
    desc: ResourceDesc,
    committed: bool,
    destroyed_at: Option<u64>,
    unreferenced_since: Option<u64>,
}

#[derive(Debug)]
struct ResourceSlot {
    generation: u32,
    entry: Option<ResourceEntry>,
}

#[derive(Debug, Default)]
struct ResourceTable {
    slots: Vec<ResourceSlot>,
    free: Vec<u32>,
    pending: Vec<u32>,
}

impl ResourceTable {
    fn entry(&self, handle: RenderHandle) -> Option<&ResourceEntry> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.entry.as_ref())
            .filter(|entry| entry.destroyed_at.is_none() && entry.reference.handle() == handle)
    }
}

#[derive(Debug, Default)]
struct ImplicitStaging {
    accumulating: StagingConsumeStruct,
    frame: StagingConsumeStruct,
}

/// Host-memory resource manager.
///
/// Buffers are backed by `Vec<u8>` once committed. Textures carry no
/// memory. Resources whose only reference is the manager's own are
/// collected `buffering_count` frames after they became unreferenced;
/// destroyed resources likewise.
#[derive(Debug)]
pub struct DummyGpuResourceManager {
    buffering_count: u32,
    table: RwLock<ResourceTable>,
    memory: Mutex<HashMap<u32, Vec<u8>>>,
    staging: Mutex<ImplicitStaging>,
    fail_mapping: AtomicBool,
    frame_counter: AtomicU64,
}

impl DummyGpuResourceManager {
    /// Create a manager for `buffering_count` frames in flight.
    pub fn new(buffering_count: u32) -> Self {
        Self {
            buffering_count: buffering_count.max(1),
            table: RwLock::new(ResourceTable::default()),
            memory: Mutex::new(HashMap::new()),
            staging: Mutex::new(ImplicitStaging::default()),
            fail_mapping: AtomicBool::new(false),
            frame_counter: AtomicU64::new(0),
        }
    }

    /// Make every `map_buffer` call fail.
    pub fn set_fail_mapping(&self, fail: bool) {
        self.fail_mapping.store(fail, Ordering::Release);
    }

    /// Number of live (not yet collected) resources.
    pub fn resource_count(&self) -> usize {
        self.table
            .read()
            .slots
            .iter()
            .filter(|slot| slot.entry.is_some())
            .count()
    }

    /// Number of resources waiting for `handle_pending_allocations`.
    pub fn pending_allocation_count(&self) -> usize {
        self.table.read().pending.len()
    }

    /// Whether a live resource is backed by memory.
    pub fn is_committed(&self, handle: RenderHandle) -> bool {
        self.table.read().entry(handle).is_some_and(|entry| entry.committed)
    }

    /// Copy of a committed buffer's contents.
    pub fn read_buffer(&self, handle: RenderHandle) -> Option<Vec<u8>> {
        if !self.is_committed(handle) {
            return None;
        }
        self.memory.lock().get(&handle.index()).cloned()
    }

    /// Execute a buffer to buffer copy on host memory.
    ///
    /// Returns `false` for uncommitted buffers and out of range regions.
    pub fn copy_buffer(
        &self,
        src: RenderHandle,
        dst: RenderHandle,
        region: BufferCopyRegion,
    ) -> bool {
        if !self.is_committed(src) || !self.is_committed(dst) {
            return false;
        }
        let (Some(src_range), Some(dst_range)) = (region.src_range(), region.dst_range()) else {
            return false;
        };
        let mut memory = self.memory.lock();
        let Some(bytes) = memory
            .get(&src.index())
            .and_then(|m| m.get(src_range))
            .map(<[u8]>::to_vec)
        else {
            return false;
        };
        match memory.get_mut(&dst.index()).and_then(|m| m.get_mut(dst_range)) {
            Some(target) => {
                target.copy_from_slice(&bytes);
                true
            }
            None => false,
        }
    }

    fn insert(
        &self,
        handle_type: RenderHandleType,
        flags: RenderHandleInfoFlags,
        desc: ResourceDesc,
    ) -> RenderHandleReference {
        let mut table = self.table.write();
        let index = match table.free.pop() {
            Some(index) => index,
            None => {
                table.slots.push(ResourceSlot {
                    generation: 0,
                    entry: None,
                });
                (table.slots.len() - 1) as u32
            }
        };
        let slot = &mut table.slots[index as usize];
        let handle = RenderHandle::new(handle_type, index, slot.generation, flags);
        let reference = RenderHandleReference::new(handle);
        slot.entry = Some(ResourceEntry {
            reference: reference.clone(),
            desc,
            committed: false,
            destroyed_at: None,
            unreferenced_since: None,
        });
        table.pending.push(index);
        reference
    }

    fn queue_upload(
        &self,
        byte_size: u64,
        data: &[u8],
    ) -> Result<StagingCopyStruct, RendererError> {
        let staging_buffer = self.create_buffer(&BufferDescriptor::staging(byte_size))?;
        Ok(StagingCopyStruct {
            data: StagingData::Host(data.to_vec()),
            src_handle: staging_buffer,
            staging_buffer_byte_size: byte_size,
            ..Default::default()
        })
    }
}

impl GpuResourceManager for DummyGpuResourceManager {
    fn create_buffer(
        &self,
        descriptor: &BufferDescriptor,
    ) -> Result<RenderHandleReference, RendererError> {
        if descriptor.size == 0 {
            return Err(RendererError::InvalidParameter(format!(
                "buffer {:?} has zero size",
                descriptor.label
            )));
        }
        let mut flags = RenderHandleInfoFlags::NONE;
        if descriptor.engine_flags.contains(EngineBufferCreationFlags::DYNAMIC_BARRIERS) {
            flags = flags | RenderHandleInfoFlags::DYNAMIC_BARRIERS;
        }
        if descriptor.engine_flags.contains(EngineBufferCreationFlags::SINGLE_SHOT_STAGING) {
            flags = flags | RenderHandleInfoFlags::STAGING;
        }
        log::trace!(
            "DummyGpuResourceManager: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        let desc = ResourceDesc::Buffer(descriptor.clone());
        Ok(self.insert(RenderHandleType::GpuBuffer, flags, desc))
    }

    fn create_buffer_with_data(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> Result<RenderHandleReference, RendererError> {
        let byte_size = data.len() as u64;
        if byte_size > descriptor.size {
            return Err(RendererError::InvalidParameter(format!(
                "{} bytes do not fit buffer of size {}",
                byte_size, descriptor.size
            )));
        }
        let buffer = self.create_buffer(descriptor)?;
        if byte_size > 0 {
            let mut op = self.queue_upload(byte_size, data)?;
            op.dst_handle = buffer.clone();
            self.staging
                .lock()
                .accumulating
                .push_buffer_to_buffer(op, [BufferCopyRegion::whole(byte_size)]);
        }
        Ok(buffer)
    }

    fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<RenderHandleReference, RendererError> {
        if descriptor.size.texel_count() == 0
            || descriptor.mip_level_count == 0
            || descriptor.layer_count == 0
        {
            return Err(RendererError::InvalidParameter(format!(
                "texture {:?} has an empty extent",
                descriptor.label
            )));
        }
        let mut flags = RenderHandleInfoFlags::NONE;
        if descriptor.engine_flags.contains(EngineTextureCreationFlags::DYNAMIC_BARRIERS) {
            flags = flags | RenderHandleInfoFlags::DYNAMIC_BARRIERS;
        }
        log::trace!(
            "DummyGpuResourceManager: creating texture {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        let desc = ResourceDesc::Texture(descriptor.clone());
        Ok(self.insert(RenderHandleType::GpuImage, flags, desc))
    }

    fn create_texture_with_data(
        &self,
        descriptor: &TextureDescriptor,
        data: &[u8],
    ) -> Result<RenderHandleReference, RendererError> {
        let byte_size = data.len() as u64;
        if byte_size < descriptor.mip_byte_size(0) {
            return Err(RendererError::InvalidParameter(format!(
                "{} bytes are less than mip 0 of texture {:?}",
                byte_size, descriptor.label
            )));
        }
        let texture = self.create_texture(descriptor)?;
        let mut op = self.queue_upload(byte_size, data)?;
        op.dst_handle = texture.clone();
        self.staging
            .lock()
            .accumulating
            .push_buffer_to_image(op, [BufferTextureCopyRegion::whole(descriptor.size)]);
        Ok(texture)
    }

    fn destroy(&self, handle: RenderHandle) {
        let frame = self.frame_counter.load(Ordering::Acquire);
        {
            let mut table = self.table.write();
            let Some(entry) = table
                .slots
                .get_mut(handle.index() as usize)
                .filter(|slot| slot.generation == handle.generation())
                .and_then(|slot| slot.entry.as_mut())
                .filter(|entry| entry.destroyed_at.is_none())
            else {
                log::debug!("DummyGpuResourceManager: destroy of unknown handle {:?}", handle);
                return;
            };
            entry.destroyed_at = Some(frame);
        }
        let mut staging = self.staging.lock();
        let invalidated = staging.accumulating.invalidate_handle(handle)
            + staging.frame.invalidate_handle(handle);
        log::trace!(
            "DummyGpuResourceManager: destroyed {:?}, {} queued uploads invalidated",
            handle,
            invalidated
        );
    }

    fn is_gpu_buffer(&self, handle: RenderHandle) -> bool {
        self.buffer_descriptor(handle).is_some()
    }

    fn is_gpu_image(&self, handle: RenderHandle) -> bool {
        self.texture_descriptor(handle).is_some()
    }

    fn buffer_descriptor(&self, handle: RenderHandle) -> Option<BufferDescriptor> {
        match &self.table.read().entry(handle)?.desc {
            ResourceDesc::Buffer(desc) => Some(desc.clone()),
            ResourceDesc::Texture(_) => None,
        }
    }

    fn texture_descriptor(&self, handle: RenderHandle) -> Option<TextureDescriptor> {
        match &self.table.read().entry(handle)?.desc {
            ResourceDesc::Texture(desc) => Some(desc.clone()),
            ResourceDesc::Buffer(_) => None,
        }
    }

    fn map_buffer(&self, handle: RenderHandle) -> Option<MappedBuffer<'_>> {
        if self.fail_mapping.load(Ordering::Acquire) {
            return None;
        }
        {
            let table = self.table.read();
            let entry = table.entry(handle)?;
            let ResourceDesc::Buffer(desc) = &entry.desc else {
                return None;
            };
            if !entry.committed || !desc.memory.contains(MemoryPropertyFlags::HOST_VISIBLE) {
                return None;
            }
        }
        let memory = MutexGuard::try_map(self.memory.lock(), |memory| {
            memory.get_mut(&handle.index()).map(Vec::as_mut_slice)
        })
        .ok()?;
        Some(MappedBuffer::new(handle, Box::new(memory)))
    }

    fn handle_pending_allocations(&self) {
        let mut table = self.table.write();
        let pending = std::mem::take(&mut table.pending);
        if pending.is_empty() {
            return;
        }
        let mut memory = self.memory.lock();
        for index in &pending {
            let Some(entry) = table.slots[*index as usize].entry.as_mut() else {
                continue;
            };
            entry.committed = true;
            if let ResourceDesc::Buffer(desc) = &entry.desc {
                memory.insert(*index, vec![0; desc.size as usize]);
            }
        }
        log::trace!("DummyGpuResourceManager: committed {} resources", pending.len());
    }

    fn lock_frame_staging_data(&self) {
        let mut staging = self.staging.lock();
        let incoming = std::mem::take(&mut staging.accumulating);
        if staging.frame.is_empty() {
            staging.frame = incoming;
        } else {
            log::debug!("DummyGpuResourceManager: merging unconsumed staging batch");
            staging.frame.append(incoming);
        }
    }

    fn consume_frame_staging_data(&self) -> StagingConsumeStruct {
        std::mem::take(&mut self.staging.lock().frame)
    }

    fn end_frame(&self) {
        let frame = self.frame_counter.fetch_add(1, Ordering::AcqRel) + 1;
        let buffering = u64::from(self.buffering_count);
        let mut table = self.table.write();
        let mut memory = self.memory.lock();
        let mut freed = Vec::new();

        for (index, slot) in table.slots.iter_mut().enumerate() {
            let Some(entry) = slot.entry.as_mut() else {
                continue;
            };
            let since = if let Some(at) = entry.destroyed_at {
                Some(at)
            } else if entry.reference.ref_count() <= 1 {
                Some(*entry.unreferenced_since.get_or_insert(frame))
            } else {
                entry.unreferenced_since = None;
                None
            };
            if since.is_some_and(|since| frame - since >= buffering) {
                slot.entry = None;
                slot.generation = slot.generation.wrapping_add(1) & GENERATION_MASK;
                memory.remove(&(index as u32));
                freed.push(index as u32);
            }
        }
        if !freed.is_empty() {
            log::trace!("DummyGpuResourceManager: collected {} resources", freed.len());
        }
        table.pending.retain(|index| !freed.contains(index));
        table.free.extend(freed);
    }
}
