//! Dummy device, resource manager and backend for testing and development.
//!
//! Nothing here touches a GPU. The resource manager keeps buffer memory on
//! the host, the device only tracks frame state and the backend records
//! what it was asked to submit so callers can inspect it afterwards.

mod resources;

pub use resources::DummyGpuResourceManager;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::RenderBackend;
use crate::command::{RenderCommand, RenderCommandFrameData, SubmitDependencies};
use crate::device::{
    BackBufferConfiguration, Device, DeviceBackendType, DeviceCapabilities, GpuResourceManager,
};
use crate::error::RendererError;

/// Frame counters of a [`DummyDevice`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DummyDeviceStats {
    /// `frame_start` calls.
    pub frames_started: u64,
    /// `frame_end` calls.
    pub frames_ended: u64,
    /// Successful fence waits.
    pub fence_waits: u64,
    /// `activate` calls.
    pub activations: u64,
    /// `wait_for_idle` calls.
    pub idle_waits: u64,
}

/// Device without a GPU.
#[derive(Debug)]
pub struct DummyDevice {
    backend_type: DeviceBackendType,
    capabilities: DeviceCapabilities,
    buffering_count: u32,
    gpu: Arc<DummyGpuResourceManager>,
    device_lost: AtomicBool,
    shaders_reloaded: AtomicBool,
    active: AtomicBool,
    frames_started: AtomicU64,
    frames_ended: AtomicU64,
    fence_waits: AtomicU64,
    activations: AtomicU64,
    idle_waits: AtomicU64,
}

impl DummyDevice {
    /// Default frames in flight.
    pub const DEFAULT_BUFFERING_COUNT: u32 = 2;

    /// Vulkan-flavoured device with default capabilities.
    pub fn new() -> Self {
        Self {
            backend_type: DeviceBackendType::Vulkan,
            capabilities: DeviceCapabilities::default(),
            buffering_count: Self::DEFAULT_BUFFERING_COUNT,
            gpu: Arc::new(DummyGpuResourceManager::new(Self::DEFAULT_BUFFERING_COUNT)),
            device_lost: AtomicBool::new(false),
            shaders_reloaded: AtomicBool::new(false),
            active: AtomicBool::new(false),
            frames_started: AtomicU64::new(0),
            frames_ended: AtomicU64::new(0),
            fence_waits: AtomicU64::new(0),
            activations: AtomicU64::new(0),
            idle_waits: AtomicU64::new(0),
        }
    }

    /// Pretend to be another API family.
    pub fn with_backend_type(mut self, backend_type: DeviceBackendType) -> Self {
        self.backend_type = backend_type;
        self
    }

    /// Set capability flags.
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set frames in flight. Recreates the resource manager.
    pub fn with_command_buffering_count(mut self, count: u32) -> Self {
        self.buffering_count = count.max(1);
        self.gpu = Arc::new(DummyGpuResourceManager::new(self.buffering_count));
        self
    }

    /// The concrete resource manager.
    pub fn gpu(&self) -> &Arc<DummyGpuResourceManager> {
        &self.gpu
    }

    /// Make fence waits fail with [`RendererError::DeviceLost`].
    pub fn set_device_lost(&self, lost: bool) {
        self.device_lost.store(lost, Ordering::Release);
    }

    /// Flag a shader reload, reported once by `has_reloaded_shaders`.
    pub fn reload_shaders(&self) {
        self.shaders_reloaded.store(true, Ordering::Release);
    }

    /// Whether the device is current on some thread.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Snapshot of the frame counters.
    pub fn stats(&self) -> DummyDeviceStats {
        DummyDeviceStats {
            frames_started: self.frames_started.load(Ordering::Acquire),
            frames_ended: self.frames_ended.load(Ordering::Acquire),
            fence_waits: self.fence_waits.load(Ordering::Acquire),
            activations: self.activations.load(Ordering::Acquire),
            idle_waits: self.idle_waits.load(Ordering::Acquire),
        }
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for DummyDevice {
    fn backend_type(&self) -> DeviceBackendType {
        self.backend_type
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn gpu_resource_manager(&self) -> Arc<dyn GpuResourceManager> {
        self.gpu.clone()
    }

    fn command_buffering_count(&self) -> u32 {
        self.buffering_count
    }

    fn activate(&self) {
        self.active.store(true, Ordering::Release);
        self.activations.fetch_add(1, Ordering::AcqRel);
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    fn frame_start(&self) {
        self.frames_started.fetch_add(1, Ordering::AcqRel);
    }

    fn wait_for_frame_fence(&self) -> Result<(), RendererError> {
        if self.device_lost.load(Ordering::Acquire) {
            return Err(RendererError::DeviceLost);
        }
        self.fence_waits.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn frame_end(&self) {
        self.frames_ended.fetch_add(1, Ordering::AcqRel);
    }

    fn has_reloaded_shaders(&self) -> bool {
        self.shaders_reloaded.swap(false, Ordering::AcqRel)
    }

    fn wait_for_idle(&self) {
        self.idle_waits.fetch_add(1, Ordering::AcqRel);
    }
}

/// Owned copy of one submitted command context.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedContext {
    /// Graph name.
    pub render_graph_name: String,
    /// Node name.
    pub node_name: String,
    /// Recorded commands.
    pub commands: Vec<RenderCommand>,
    /// Barriers across all barrier points.
    pub barrier_count: usize,
    /// Submission dependencies.
    pub submit_dependencies: SubmitDependencies,
}

/// Owned copy of one submitted frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedFrame {
    /// Frame index.
    pub frame_index: u64,
    /// Contexts in submission order.
    pub contexts: Vec<RecordedContext>,
    /// Back buffer the frame was rendered with.
    pub back_buffer: BackBufferConfiguration,
}

impl RecordedFrame {
    /// `graph::node` names in submission order.
    pub fn node_names(&self) -> Vec<String> {
        self.contexts
            .iter()
            .map(|context| format!("{}::{}", context.render_graph_name, context.node_name))
            .collect()
    }

    /// Context of a node, by node name.
    pub fn context(&self, node_name: &str) -> Option<&RecordedContext> {
        self.contexts.iter().find(|context| context.node_name == node_name)
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    frames: Vec<RecordedFrame>,
    presents: u64,
}

/// Shared view of what a [`DummyRenderBackend`] received.
#[derive(Debug, Clone, Default)]
pub struct DummyBackendRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl DummyBackendRecorder {
    /// Every rendered frame.
    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.state.lock().frames.clone()
    }

    /// Most recent rendered frame.
    pub fn last_frame(&self) -> Option<RecordedFrame> {
        self.state.lock().frames.last().cloned()
    }

    /// Number of rendered frames.
    pub fn frame_count(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Number of presents.
    pub fn present_count(&self) -> u64 {
        self.state.lock().presents
    }
}

/// Backend recording submitted frames.
///
/// With a resource manager attached, buffer to buffer copies are executed on
/// host memory so uploads can be checked end to end.
#[derive(Debug, Default)]
pub struct DummyRenderBackend {
    recorder: DummyBackendRecorder,
    resources: Option<Arc<DummyGpuResourceManager>>,
}

impl DummyRenderBackend {
    /// Create a recording backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute buffer copies against `resources`.
    pub fn with_resource_manager(mut self, resources: Arc<DummyGpuResourceManager>) -> Self {
        self.resources = Some(resources);
        self
    }

    /// Shared recorder handle.
    pub fn recorder(&self) -> DummyBackendRecorder {
        self.recorder.clone()
    }
}

impl RenderBackend for DummyRenderBackend {
    fn render(
        &mut self,
        frame_data: &mut RenderCommandFrameData<'_>,
        back_buffer: &BackBufferConfiguration,
    ) {
        crate::profile_scope!("DummyRenderBackend::render");

        let mut frame = RecordedFrame {
            frame_index: frame_data.frame_index,
            contexts: Vec::with_capacity(frame_data.contexts.len()),
            back_buffer: *back_buffer,
        };
        for context in &frame_data.contexts {
            let commands = context.command_list.commands().to_vec();
            if let Some(resources) = &self.resources {
                for command in &commands {
                    if let RenderCommand::CopyBufferToBuffer { src, dst, region } = command {
                        if !resources.copy_buffer(*src, *dst, *region) {
                            log::warn!("DummyRenderBackend: copy {:?} -> {:?} failed", src, dst);
                        }
                    }
                }
            }
            frame.contexts.push(RecordedContext {
                render_graph_name: context.render_graph_name.to_string(),
                node_name: context.node_name.to_string(),
                commands,
                barrier_count: context.command_list.barrier_list().total_barrier_count(),
                submit_dependencies: context.submit_dependencies.clone(),
            });
        }
        log::trace!(
            "DummyRenderBackend: frame {} with {} contexts",
            frame.frame_index,
            frame.contexts.len()
        );
        self.recorder.state.lock().frames.push(frame);
    }

    fn present(&mut self, back_buffer: &BackBufferConfiguration) {
        log::trace!("DummyRenderBackend: present {:?}", back_buffer.back_buffer_type);
        self.recorder.state.lock().presents += 1;
    }
}
