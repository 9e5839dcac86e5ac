//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be used as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be used as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer can be used as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Buffer can be used as a storage buffer.
        const STORAGE = 1 << 3;
        /// Buffer can be copied from.
        const TRANSFER_SRC = 1 << 4;
        /// Buffer can be copied to.
        const TRANSFER_DST = 1 << 5;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags! {
    /// Memory properties requested for a buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryPropertyFlags: u32 {
        /// Fast device memory, not necessarily visible to the host.
        const DEVICE_LOCAL = 1 << 0;
        /// Memory can be mapped by the host.
        const HOST_VISIBLE = 1 << 1;
        /// Host writes are visible to the device without explicit flushes.
        const HOST_COHERENT = 1 << 2;
        /// Host reads are cached.
        const HOST_CACHED = 1 << 3;
    }
}

impl Default for MemoryPropertyFlags {
    fn default() -> Self {
        Self::DEVICE_LOCAL
    }
}

bitflags! {
    /// Engine-side creation flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EngineBufferCreationFlags: u32 {
        /// Barrier state is tracked automatically by the command list.
        const DYNAMIC_BARRIERS = 1 << 0;
        /// Transient staging buffer, destroyed after the frame that uses it.
        const SINGLE_SHOT_STAGING = 1 << 1;
    }
}

impl Default for EngineBufferCreationFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
    /// Memory properties.
    pub memory: MemoryPropertyFlags,
    /// Engine creation flags.
    pub engine_flags: EngineBufferCreationFlags,
}

impl BufferDescriptor {
    /// Create a new device-local buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
            memory: MemoryPropertyFlags::DEVICE_LOCAL,
            engine_flags: EngineBufferCreationFlags::empty(),
        }
    }

    /// Descriptor of a transient, host-visible staging buffer.
    pub fn staging(size: u64) -> Self {
        Self {
            label: Some("staging".to_string()),
            size,
            usage: BufferUsage::TRANSFER_SRC,
            memory: MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
            engine_flags: EngineBufferCreationFlags::SINGLE_SHOT_STAGING,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the memory properties.
    pub fn with_memory(mut self, memory: MemoryPropertyFlags) -> Self {
        self.memory = memory;
        self
    }

    /// Set the engine creation flags.
    pub fn with_engine_flags(mut self, flags: EngineBufferCreationFlags) -> Self {
        self.engine_flags = flags;
        self
    }

    /// Whether the host can write the buffer directly without a staging copy.
    pub fn is_host_writable(&self) -> bool {
        self.memory
            .contains(MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT)
    }
}
