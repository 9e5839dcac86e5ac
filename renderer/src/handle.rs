//! Render handles.
//!
//! A [`RenderHandle`] is a plain 64-bit id naming a GPU resource, a render
//! node graph or a per-node object. It is `Copy` and carries no ownership.
//!
//! A [`RenderHandleReference`] is the owning counterpart: the manager that
//! created the object keeps one reference, every holder (a staging batch, a
//! render node, the application) keeps a clone. When the manager observes
//! that it holds the last reference, the object is collected.
//!
//! # Bit layout
//!
//! ```text
//! 63             40 39           16 15      8 7    4 3    0
//! ┌────────────────┬───────────────┬─────────┬──────┬──────┐
//! │   generation   │     index     │ unused  │flags │ type │
//! └────────────────┴───────────────┴─────────┴──────┴──────┘
//! ```

use std::sync::Arc;

use static_assertions::const_assert;

const TYPE_BITS: u64 = 4;
const FLAG_BITS: u64 = 4;
const INDEX_SHIFT: u64 = 16;
const INDEX_BITS: u64 = 24;
const GENERATION_SHIFT: u64 = INDEX_SHIFT + INDEX_BITS;
const GENERATION_BITS: u64 = 24;

const TYPE_MASK: u64 = (1 << TYPE_BITS) - 1;
const FLAG_MASK: u64 = ((1 << FLAG_BITS) - 1) << TYPE_BITS;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;
const GENERATION_MASK: u64 = (1 << GENERATION_BITS) - 1;

const_assert!(GENERATION_SHIFT + GENERATION_BITS == 64);
const_assert!(TYPE_BITS + FLAG_BITS <= INDEX_SHIFT);

/// Kind of object a [`RenderHandle`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RenderHandleType {
    /// Not a valid handle.
    Undefined = 0,
    /// GPU buffer.
    GpuBuffer = 1,
    /// GPU image (texture).
    GpuImage = 2,
    /// GPU sampler.
    GpuSampler = 3,
    /// Render node graph.
    RenderNodeGraph = 4,
    /// Descriptor set owned by a node context.
    DescriptorSet = 5,
    /// Compute pipeline state object.
    ComputePso = 6,
    /// Graphics pipeline state object.
    GraphicsPso = 7,
}

impl RenderHandleType {
    fn from_bits(bits: u64) -> Self {
        match bits {
            1 => Self::GpuBuffer,
            2 => Self::GpuImage,
            3 => Self::GpuSampler,
            4 => Self::RenderNodeGraph,
            5 => Self::DescriptorSet,
            6 => Self::ComputePso,
            7 => Self::GraphicsPso,
            _ => Self::Undefined,
        }
    }
}

/// Per-handle information bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderHandleInfoFlags(u8);

impl RenderHandleInfoFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// Barrier state of the resource is tracked automatically by the command
    /// list machinery; staging must not bracket it with explicit barriers.
    pub const DYNAMIC_BARRIERS: Self = Self(1 << 0);
    /// Resource was created as a single-frame staging resource.
    pub const STAGING: Self = Self(1 << 1);

    /// Check whether all bits of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for RenderHandleInfoFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Copyable, non-owning id of a render object.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderHandle {
    id: u64,
}

impl RenderHandle {
    /// The invalid handle.
    pub const INVALID: Self = Self { id: u64::MAX };

    /// Build a handle from its parts.
    pub fn new(
        handle_type: RenderHandleType,
        index: u32,
        generation: u32,
        flags: RenderHandleInfoFlags,
    ) -> Self {
        debug_assert!(u64::from(index) <= INDEX_MASK, "render handle index overflow");
        let id = (handle_type as u64 & TYPE_MASK)
            | ((u64::from(flags.0) << TYPE_BITS) & FLAG_MASK)
            | ((u64::from(index) & INDEX_MASK) << INDEX_SHIFT)
            | ((u64::from(generation) & GENERATION_MASK) << GENERATION_SHIFT);
        Self { id }
    }

    /// Raw 64-bit id.
    pub fn id(self) -> u64 {
        self.id
    }

    /// Whether this handle is not [`RenderHandle::INVALID`] and has a type.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID && self.handle_type() != RenderHandleType::Undefined
    }

    /// Object kind.
    pub fn handle_type(self) -> RenderHandleType {
        if self.id == u64::MAX {
            return RenderHandleType::Undefined;
        }
        RenderHandleType::from_bits(self.id & TYPE_MASK)
    }

    /// Slot index inside the owning manager.
    pub fn index(self) -> u32 {
        ((self.id >> INDEX_SHIFT) & INDEX_MASK) as u32
    }

    /// Generation of the slot when the handle was created.
    pub fn generation(self) -> u32 {
        ((self.id >> GENERATION_SHIFT) & GENERATION_MASK) as u32
    }

    /// Information flags.
    pub fn info_flags(self) -> RenderHandleInfoFlags {
        RenderHandleInfoFlags(((self.id & FLAG_MASK) >> TYPE_BITS) as u8)
    }

    /// Whether the resource's barriers are tracked automatically.
    pub fn is_dynamic_resource(self) -> bool {
        self.is_valid()
            && self
                .info_flags()
                .contains(RenderHandleInfoFlags::DYNAMIC_BARRIERS)
    }

    /// Whether this is a GPU buffer handle.
    pub fn is_gpu_buffer(self) -> bool {
        self.handle_type() == RenderHandleType::GpuBuffer
    }

    /// Whether this is a GPU image handle.
    pub fn is_gpu_image(self) -> bool {
        self.handle_type() == RenderHandleType::GpuImage
    }
}

impl Default for RenderHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.is_valid() {
            return write!(f, "RenderHandle(invalid)");
        }
        write!(
            f,
            "RenderHandle({:?} #{} gen {})",
            self.handle_type(),
            self.index(),
            self.generation()
        )
    }
}

/// Shared-ownership reference to a render object.
///
/// Clones share one counter. The creating manager keeps one clone itself, so
/// [`ref_count`](Self::ref_count) of `1` seen from the manager means no
/// external holder is left.
#[derive(Debug, Clone, Default)]
pub struct RenderHandleReference {
    handle: RenderHandle,
    counter: Option<Arc<()>>,
}

impl RenderHandleReference {
    /// Create the first reference for a freshly created object.
    pub fn new(handle: RenderHandle) -> Self {
        Self {
            handle,
            counter: Some(Arc::new(())),
        }
    }

    /// The referenced handle.
    pub fn handle(&self) -> RenderHandle {
        self.handle
    }

    /// Whether the reference points at a valid handle.
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    /// Number of live references (0 for the default/invalid reference).
    pub fn ref_count(&self) -> usize {
        self.counter.as_ref().map_or(0, Arc::strong_count)
    }
}

impl PartialEq for RenderHandleReference {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for RenderHandleReference {}
