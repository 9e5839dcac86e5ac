//! Device and GPU resource manager interfaces.
//!
//! The renderer never talks to a graphics API directly. It drives a
//! [`Device`] (frame fences, activation, shader reload notifications) and a
//! [`GpuResourceManager`] (resource creation, mapping, pending allocations,
//! implicit staging). Concrete implementations live outside this crate; an
//! in-process stand-in is provided by [`crate::backend::dummy`].

mod resource_manager;

pub use resource_manager::{GpuResourceManager, MappedBuffer};

use std::sync::Arc;

use crate::error::RendererError;
use crate::handle::RenderHandle;
use crate::types::Extent3d;

/// Graphics API family behind a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceBackendType {
    /// Vulkan.
    #[default]
    Vulkan,
    /// Desktop OpenGL.
    OpenGl,
    /// OpenGL ES. Has no hardware image clear outside render passes.
    OpenGles,
}

impl DeviceBackendType {
    /// Whether images must be cleared through CPU-filled staging copies.
    pub fn requires_staging_clears(self) -> bool {
        self == Self::OpenGles
    }
}

/// Per-device feature flags the scheduler consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCapabilities {
    /// Command lists may be recorded from worker threads.
    pub allow_thread_command_list_recording: bool,
    /// More than one hardware queue is usable.
    pub multi_queue: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            allow_thread_command_list_recording: true,
            multi_queue: false,
        }
    }
}

/// Queue family a render node submits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GpuQueueType {
    /// Graphics queue.
    #[default]
    Graphics,
    /// Async compute queue.
    Compute,
    /// Transfer queue.
    Transfer,
}

/// Queue a render node submits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GpuQueue {
    /// Queue family.
    pub queue_type: GpuQueueType,
    /// Index inside the family.
    pub index: u32,
}

impl GpuQueue {
    /// Create a queue reference.
    pub fn new(queue_type: GpuQueueType, index: u32) -> Self {
        Self { queue_type, index }
    }
}

/// What the backend renders into and presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackBufferType {
    /// A window swapchain.
    #[default]
    Swapchain,
    /// An application-provided image.
    GpuImage,
    /// Nothing is presented.
    Headless,
}

/// Back buffer setup passed to the backend every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BackBufferConfiguration {
    /// Back buffer kind.
    pub back_buffer_type: BackBufferType,
    /// Target image when `back_buffer_type` is [`BackBufferType::GpuImage`].
    pub image: RenderHandle,
    /// Size of the back buffer.
    pub extent: Extent3d,
}

impl BackBufferConfiguration {
    /// Swapchain back buffer of the given size.
    pub fn swapchain(width: u32, height: u32) -> Self {
        Self {
            back_buffer_type: BackBufferType::Swapchain,
            image: RenderHandle::INVALID,
            extent: Extent3d::new_2d(width, height),
        }
    }

    /// No presentation.
    pub fn headless() -> Self {
        Self {
            back_buffer_type: BackBufferType::Headless,
            ..Default::default()
        }
    }

    /// Render into an application image.
    pub fn with_image(mut self, image: RenderHandle) -> Self {
        self.back_buffer_type = BackBufferType::GpuImage;
        self.image = image;
        self
    }
}

/// A GPU device as seen by the frame scheduler.
pub trait Device: Send + Sync {
    /// API family.
    fn backend_type(&self) -> DeviceBackendType;

    /// Feature flags.
    fn capabilities(&self) -> DeviceCapabilities;

    /// Resource manager of this device.
    fn gpu_resource_manager(&self) -> Arc<dyn GpuResourceManager>;

    /// Number of frames in flight (ring size of per-frame resources).
    fn command_buffering_count(&self) -> u32;

    /// Make the device current on the calling thread.
    fn activate(&self);

    /// Release the device from the calling thread.
    fn deactivate(&self);

    /// Called at the very start of a frame.
    fn frame_start(&self);

    /// Wait until the frame slot about to be reused is no longer in flight.
    ///
    /// Returns [`RendererError::DeviceLost`] when the device is gone.
    fn wait_for_frame_fence(&self) -> Result<(), RendererError>;

    /// Called at the very end of a frame.
    fn frame_end(&self);

    /// Whether shaders were reloaded since the last call. Clears the flag.
    fn has_reloaded_shaders(&self) -> bool;

    /// Block until all submitted work finished.
    fn wait_for_idle(&self);
}
