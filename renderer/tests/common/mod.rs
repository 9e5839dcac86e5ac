//! Common utilities for renderer integration tests.
//!
//! Every test runs against the dummy device, resource manager and backend.
//! The backend executes buffer copies on host memory, so uploads can be
//! read back after a frame.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use redlilium_renderer::backend::dummy::{
    DummyBackendRecorder, DummyDevice, DummyGpuResourceManager, DummyRenderBackend, RecordedFrame,
};
use redlilium_renderer::command::{RenderCommand, RenderCommandList};
use redlilium_renderer::data_store::RenderDataStoreDefaultStaging;
use redlilium_renderer::device::GpuResourceManager;
use redlilium_renderer::node::RenderNodeContextManager;
use redlilium_renderer::types::{
    BufferDescriptor, BufferUsage, MemoryPropertyFlags, TextureDescriptor, TextureFormat,
    TextureUsage,
};
use redlilium_renderer::{
    RenderHandleReference, RenderNode, RenderNodeDesc, RenderNodeGraphDesc, RenderNodeRegistry,
    Renderer, RendererConfig,
};

/// Node type recording one draw per frame.
pub const DRAW_NODE: &str = "TestDrawNode";

/// Node type recording nothing.
pub const EMPTY_NODE: &str = "TestEmptyNode";

/// Initialize logging once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Test Nodes
// ============================================================================

/// Hook call counts shared by every [`CountingNode`] of a context.
#[derive(Debug, Default)]
pub struct NodeCounters {
    pub inits: AtomicUsize,
    pub pre_executes: AtomicUsize,
    pub executes: AtomicUsize,
}

impl NodeCounters {
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn pre_executes(&self) -> usize {
        self.pre_executes.load(Ordering::SeqCst)
    }

    pub fn executes(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }
}

/// Counts hook calls; optionally records a draw.
pub struct CountingNode {
    counters: Arc<NodeCounters>,
    record_draw: bool,
}

impl CountingNode {
    pub fn new(counters: Arc<NodeCounters>, record_draw: bool) -> Self {
        Self {
            counters,
            record_draw,
        }
    }
}

impl RenderNode for CountingNode {
    fn init_node(&mut self, _context: &mut RenderNodeContextManager) {
        self.counters.inits.fetch_add(1, Ordering::SeqCst);
    }

    fn pre_execute_frame(&mut self, _context: &mut RenderNodeContextManager) {
        self.counters.pre_executes.fetch_add(1, Ordering::SeqCst);
    }

    fn execute_frame(
        &mut self,
        _context: &mut RenderNodeContextManager,
        cmd: &mut RenderCommandList,
    ) {
        self.counters.executes.fetch_add(1, Ordering::SeqCst);
        if self.record_draw {
            cmd.draw(3, 1);
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// A renderer wired to dummy collaborators.
pub struct TestContext {
    pub device: Arc<DummyDevice>,
    pub renderer: Renderer,
    pub recorder: DummyBackendRecorder,
    pub staging: Arc<RenderDataStoreDefaultStaging>,
    pub counters: Arc<NodeCounters>,
}

impl TestContext {
    /// Vulkan-flavoured dummy device, default configuration.
    pub fn new() -> Self {
        Self::with_config(DummyDevice::new(), RendererConfig::default())
    }

    pub fn with_config(device: DummyDevice, config: RendererConfig) -> Self {
        Self::build(device, config, |_| {})
    }

    /// Build a context; `register` may add node types.
    pub fn build(
        device: DummyDevice,
        config: RendererConfig,
        register: impl FnOnce(&mut RenderNodeRegistry),
    ) -> Self {
        init_logging();

        let device = Arc::new(device);
        let backend = DummyRenderBackend::new().with_resource_manager(Arc::clone(device.gpu()));
        let recorder = backend.recorder();
        let counters = Arc::new(NodeCounters::default());

        let mut registry = RenderNodeRegistry::new();
        let draw_counters = Arc::clone(&counters);
        registry.register(DRAW_NODE, move || {
            Box::new(CountingNode::new(Arc::clone(&draw_counters), true))
        });
        let empty_counters = Arc::clone(&counters);
        registry.register(EMPTY_NODE, move || {
            Box::new(CountingNode::new(Arc::clone(&empty_counters), false))
        });
        register(&mut registry);

        let renderer = Renderer::new(device.clone(), Box::new(backend), registry, config)
            .expect("renderer creation failed");
        let staging = renderer
            .staging_data_store()
            .expect("default staging store missing");

        Self {
            device,
            renderer,
            recorder,
            staging,
            counters,
        }
    }

    pub fn gpu(&self) -> &Arc<DummyGpuResourceManager> {
        self.device.gpu()
    }

    /// Device-local buffer usable as a copy destination.
    pub fn create_buffer(&self, size: u64) -> RenderHandleReference {
        self.gpu()
            .create_buffer(&BufferDescriptor::new(
                size,
                BufferUsage::STORAGE | BufferUsage::TRANSFER_DST | BufferUsage::TRANSFER_SRC,
            ))
            .expect("buffer creation failed")
    }

    /// Host-visible, host-coherent buffer.
    pub fn create_host_buffer(&self, size: u64) -> RenderHandleReference {
        self.gpu()
            .create_buffer(
                &BufferDescriptor::new(size, BufferUsage::UNIFORM | BufferUsage::TRANSFER_DST)
                    .with_memory(
                        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT,
                    ),
            )
            .expect("buffer creation failed")
    }

    /// RGBA8 2D texture.
    pub fn create_texture(&self, width: u32, height: u32) -> RenderHandleReference {
        self.create_texture_with(TextureDescriptor::new_2d(
            width,
            height,
            TextureFormat::Rgba8Unorm,
            TextureUsage::SAMPLED | TextureUsage::TRANSFER_DST | TextureUsage::TRANSFER_SRC,
        ))
    }

    pub fn create_texture_with(&self, descriptor: TextureDescriptor) -> RenderHandleReference {
        self.gpu()
            .create_texture(&descriptor)
            .expect("texture creation failed")
    }

    /// Graph of `(type_name, node_name)` pairs in order.
    pub fn create_graph(&self, name: &str, nodes: &[(&str, &str)]) -> RenderHandleReference {
        let desc = nodes
            .iter()
            .fold(RenderNodeGraphDesc::new(name), |desc, (type_name, node_name)| {
                desc.with_node(RenderNodeDesc::new(*type_name, *node_name))
            });
        self.renderer
            .create_render_node_graph(desc)
            .expect("graph creation failed")
    }

    pub fn last_frame(&self) -> RecordedFrame {
        self.recorder.last_frame().expect("no frame was rendered")
    }
}

/// Commands a node submitted in `frame`, empty when the node was skipped.
pub fn node_commands(frame: &RecordedFrame, node_name: &str) -> Vec<RenderCommand> {
    frame
        .context(node_name)
        .map(|context| context.commands.clone())
        .unwrap_or_default()
}

/// Work commands only (no barrier points or markers).
pub fn work_commands(frame: &RecordedFrame, node_name: &str) -> Vec<RenderCommand> {
    node_commands(frame, node_name)
        .into_iter()
        .filter(RenderCommand::is_work)
        .collect()
}

/// Every work command sits between a barrier point before it and one after
/// it, and marker regions are balanced.
pub fn assert_bracketed(commands: &[RenderCommand]) {
    let mut disabled = 0i32;
    let mut seen_barrier = false;
    let mut pending_work = false;
    for command in commands {
        match command {
            RenderCommand::BeginDisableAutomaticBarrierPoints => disabled += 1,
            RenderCommand::EndDisableAutomaticBarrierPoints => {
                disabled -= 1;
                assert!(disabled >= 0, "unbalanced automatic barrier region");
            }
            RenderCommand::BarrierPoint { .. } => {
                seen_barrier = true;
                pending_work = false;
            }
            _ => {
                pending_work = true;
            }
        }
    }
    assert_eq!(disabled, 0, "automatic barrier region left open");
    assert!(!pending_work, "work recorded after the last barrier point");
    if commands.iter().any(RenderCommand::is_work) {
        assert!(seen_barrier);
    }
}
