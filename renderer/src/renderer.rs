//! Frame orchestration.
//!
//! [`Renderer::render_frame`] drives every graph of a frame through a fixed
//! sequence of phases:
//!
//! | # | Phase | Thread |
//! |---|-------|--------|
//! | 1 | tick the frame timer | orchestrator |
//! | 2 | gather graphs, initialize new nodes | orchestrator |
//! | 3 | swap staging batches, begin graphs | orchestrator |
//! | 4 | wait on the frame fence | orchestrator |
//! | 5 | commit pending allocations | orchestrator |
//! | 6 | pre-execute, commit again, execute nodes | workers |
//! | 7 | flatten command contexts | orchestrator |
//! | 8 | backend render and present | orchestrator |
//! | 9 | post-render and end-of-frame bookkeeping | orchestrator |
//!
//! The graph order of a frame is: default staging graph, user graphs in the
//! order given, the dev overlay graph (when enabled), the end-frame staging
//! graph.
//!
//! # Example
//!
//! ```ignore
//! let device = Arc::new(DummyDevice::new());
//! let renderer = Renderer::new(
//!     device.clone(),
//!     Box::new(DummyRenderBackend::new()),
//!     RenderNodeRegistry::new(),
//!     RendererConfig::default(),
//! )?;
//!
//! let forward = RenderNodeDesc::new("RenderNodeForward", "forward");
//! let graph = renderer.create_render_node_graph(RenderNodeGraphDesc::new("main").with_node(forward))?;
//! loop {
//!     renderer.render_frame(&[graph.clone()]);
//! }
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};

use crate::backend::RenderBackend;
use crate::command::{RenderCommandContext, RenderCommandFrameData, SubmitDependencies};
use crate::config::RendererConfig;
use crate::data_store::{
    RenderDataStoreContext, RenderDataStoreDefaultStaging, RenderDataStoreManager,
};
use crate::device::{BackBufferConfiguration, Device, GpuQueue, GpuResourceManager};
use crate::error::RendererError;
use crate::graph::{
    RenderNodeDesc, RenderNodeGraphDesc, RenderNodeGraphManager, RenderNodeGraphNodeStore,
};
use crate::handle::{RenderHandle, RenderHandleReference};
use crate::node::{
    RenderNodeContextShared, RenderNodeEndFrameStaging, RenderNodeRegistry, RenderNodeStaging,
};
use crate::task_queue::{ParallelTaskQueue, SequentialTaskQueue, TaskQueue, ThreadPool};
use crate::time::{FrameTimer, RenderTimings};

/// Name of the graph running first in every frame.
pub const STAGING_GRAPH_NAME: &str = "RenderGraphStaging";

/// Name of the graph running last in every frame.
pub const END_FRAME_STAGING_GRAPH_NAME: &str = "RenderGraphEndFrameStaging";

/// Why a frame was not presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameAbortReason {
    /// A graph handle was unknown or already destroyed.
    InvalidGraph(RenderHandle),
    /// The device was lost while waiting on the frame fence.
    DeviceLost,
}

/// Outcome of [`Renderer::render_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFrameStatus {
    /// The frame was submitted and presented.
    Presented {
        /// Index of the frame.
        frame_index: u64,
    },
    /// The frame was abandoned.
    Aborted(FrameAbortReason),
}

impl RenderFrameStatus {
    /// Whether the frame was presented.
    pub fn is_presented(&self) -> bool {
        matches!(self, Self::Presented { .. })
    }
}

struct FrameState {
    backend: Box<dyn RenderBackend>,
    timer: FrameTimer,
    back_buffer: BackBufferConfiguration,
    frame_index: u64,
    staging_graph: RenderHandleReference,
    end_frame_staging_graph: RenderHandleReference,
    dev_overlay_graph: Option<RenderHandleReference>,
    last_timings: RenderTimings,
}

/// Per-frame scheduler of render node graphs.
pub struct Renderer {
    device: Arc<dyn Device>,
    gpu: Arc<dyn GpuResourceManager>,
    config: Arc<RendererConfig>,
    data_store_manager: Arc<RenderDataStoreManager>,
    graph_manager: RenderNodeGraphManager,
    shared: RenderNodeContextShared,
    thread_pool: ThreadPool,
    frame: Mutex<FrameState>,
    deferred: Mutex<Vec<RenderHandleReference>>,
}

impl Renderer {
    /// Create a renderer, its default staging data store and staging graphs.
    ///
    /// `registry` must contain the staging node types
    /// ([`RenderNodeRegistry::new`] registers them).
    pub fn new(
        device: Arc<dyn Device>,
        backend: Box<dyn RenderBackend>,
        registry: RenderNodeRegistry,
        config: RendererConfig,
    ) -> Result<Self, RendererError> {
        if config.min_frame_rate.is_nan() || config.min_frame_rate <= 0.0 {
            return Err(RendererError::InvalidParameter(format!(
                "min_frame_rate must be positive, got {}",
                config.min_frame_rate
            )));
        }
        let config = Arc::new(config);
        let gpu = device.gpu_resource_manager();
        let backend_type = device.backend_type();
        let buffering_count = device.command_buffering_count();

        let data_store_manager = Arc::new(RenderDataStoreManager::new(RenderDataStoreContext {
            gpu_resource_manager: Arc::clone(&gpu),
            backend_type,
        }));
        data_store_manager.create(
            RenderDataStoreDefaultStaging::TYPE_NAME,
            &config.staging_data_store_name,
        )?;

        let graph_manager = RenderNodeGraphManager::new(registry, buffering_count);
        let staging_graph = graph_manager.create(
            RenderNodeGraphDesc::new(STAGING_GRAPH_NAME)
                .with_node(RenderNodeDesc::new(RenderNodeStaging::TYPE_NAME, "Staging")),
        )?;
        let end_frame_staging_graph = graph_manager.create(
            RenderNodeGraphDesc::new(END_FRAME_STAGING_GRAPH_NAME).with_node(RenderNodeDesc::new(
                RenderNodeEndFrameStaging::TYPE_NAME,
                "EndFrameStaging",
            )),
        )?;

        let thread_pool = match config.worker_threads {
            0 => ThreadPool::default_threads(),
            count => ThreadPool::new(count),
        };
        log::info!(
            "Renderer created: {:?} backend, {} frames in flight, {} worker threads",
            backend_type,
            buffering_count,
            thread_pool.num_threads()
        );

        let shared = RenderNodeContextShared {
            config: Arc::clone(&config),
            backend_type,
            command_buffering_count: buffering_count,
            gpu_resource_manager: Arc::clone(&gpu),
            data_store_manager: Arc::clone(&data_store_manager),
        };

        Ok(Self {
            frame: Mutex::new(FrameState {
                backend,
                timer: FrameTimer::new(config.max_frame_delta()),
                back_buffer: BackBufferConfiguration::default(),
                frame_index: 0,
                staging_graph,
                end_frame_staging_graph,
                dev_overlay_graph: None,
                last_timings: RenderTimings::default(),
            }),
            device,
            gpu,
            config,
            data_store_manager,
            graph_manager,
            shared,
            thread_pool,
            deferred: Mutex::new(Vec::new()),
        })
    }

    /// The device.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// The device's resource manager.
    pub fn gpu_resource_manager(&self) -> &Arc<dyn GpuResourceManager> {
        &self.gpu
    }

    /// Configuration the renderer was created with.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Data store manager.
    pub fn data_store_manager(&self) -> &Arc<RenderDataStoreManager> {
        &self.data_store_manager
    }

    /// Graph manager.
    pub fn graph_manager(&self) -> &RenderNodeGraphManager {
        &self.graph_manager
    }

    /// The default staging data store.
    pub fn staging_data_store(&self) -> Option<Arc<RenderDataStoreDefaultStaging>> {
        self.data_store_manager
            .get::<RenderDataStoreDefaultStaging>(&self.config.staging_data_store_name)
    }

    /// Create a render node graph.
    pub fn create_render_node_graph(
        &self,
        desc: RenderNodeGraphDesc,
    ) -> Result<RenderHandleReference, RendererError> {
        self.graph_manager.create(desc)
    }

    /// Back buffer used from the next frame on.
    pub fn set_back_buffer_configuration(&self, configuration: BackBufferConfiguration) {
        self.frame.lock().back_buffer = configuration;
    }

    /// Graph rendered after user graphs when the dev overlay is enabled.
    pub fn set_dev_overlay_graph(&self, graph: Option<RenderHandleReference>) {
        self.frame.lock().dev_overlay_graph = graph;
    }

    /// Timings of the most recent frame.
    pub fn last_timings(&self) -> RenderTimings {
        self.frame.lock().last_timings
    }

    /// Number of frames rendered or aborted so far.
    pub fn frame_count(&self) -> u64 {
        self.frame.lock().frame_index
    }

    /// Block until the device is idle.
    pub fn wait_for_idle(&self) {
        self.device.wait_for_idle();
    }

    /// Re-run `init_node` on every node next frame and drop cached PSOs.
    pub fn reinitialize_render_nodes(&self) {
        self.graph_manager.invalidate_all();
    }

    /// Queue graphs for the next [`render_deferred_frame`](Self::render_deferred_frame).
    pub fn render_deferred(&self, graphs: &[RenderHandleReference]) {
        self.deferred.lock().extend(graphs.iter().cloned());
    }

    /// Render every graph queued with [`render_deferred`](Self::render_deferred).
    pub fn render_deferred_frame(&self) -> RenderFrameStatus {
        let graphs = std::mem::take(&mut *self.deferred.lock());
        self.render_frame(&graphs)
    }

    fn gather_graphs(
        &self,
        state: &FrameState,
        graphs: &[RenderHandleReference],
    ) -> Vec<RenderHandle> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::with_capacity(graphs.len() + 3);

        let staging = state.staging_graph.handle();
        seen.insert(staging);
        ordered.push(staging);

        for graph in graphs {
            let handle = graph.handle();
            if seen.insert(handle) {
                ordered.push(handle);
            } else {
                log::warn!("render_frame: duplicate render node graph {:?} filtered", handle);
            }
        }

        if self.config.dev_overlay {
            if let Some(overlay) = &state.dev_overlay_graph {
                if seen.insert(overlay.handle()) {
                    ordered.push(overlay.handle());
                }
            }
        }

        let end_frame = state.end_frame_staging_graph.handle();
        if seen.insert(end_frame) {
            ordered.push(end_frame);
        }
        ordered
    }

    fn abort_frame(
        state: &mut FrameState,
        frame_index: u64,
        delta_seconds: f64,
        started: Instant,
        reason: FrameAbortReason,
    ) -> RenderFrameStatus {
        state.last_timings = RenderTimings {
            frame_index,
            delta_seconds,
            total_seconds: state.timer.total(),
            frame_cpu_time: started.elapsed(),
        };
        RenderFrameStatus::Aborted(reason)
    }

    fn execute_nodes(&self, stores: &mut [MutexGuard<'_, RenderNodeGraphNodeStore>]) {
        crate::profile_scope!("Renderer::execute_nodes");

        let threaded = self.config.threaded_recording
            && self.device.capabilities().allow_thread_command_list_recording;
        let mut parallel = ParallelTaskQueue::new(&self.thread_pool);
        let mut sequential = SequentialTaskQueue::new();
        let queue: &mut dyn TaskQueue<'_> = if threaded {
            &mut parallel
        } else {
            &mut sequential
        };

        for store in stores.iter_mut() {
            for entry in store.nodes.iter_mut() {
                if let Some(task) = entry.execute_task() {
                    queue.submit(task);
                }
            }
        }
        log::trace!("Renderer: executing {} render nodes (threaded: {})", queue.len(), threaded);
        queue.execute();
    }

    /// Render and present one frame of `graphs`.
    ///
    /// Unknown graph handles and a lost device abort the frame; queued
    /// staging work of an aborted frame is carried into the next one.
    pub fn render_frame(&self, graphs: &[RenderHandleReference]) -> RenderFrameStatus {
        crate::profile_function!();

        let started = Instant::now();
        let mut guard = self.frame.lock();
        let state = &mut *guard;
        let frame_index = state.frame_index;
        state.frame_index += 1;
        let delta = state.timer.tick();

        self.device.frame_start();
        if self.device.has_reloaded_shaders() {
            log::debug!("Renderer: shaders reloaded, re-initializing render nodes");
            self.graph_manager.invalidate_all();
        }
        self.graph_manager.handle_pending_graphs();

        let handles = self.gather_graphs(state, graphs);
        let mut stores = Vec::with_capacity(handles.len());
        for handle in handles {
            match self.graph_manager.get(handle) {
                Some(store) => stores.push(store),
                None => {
                    log::warn!(
                        "render_frame: unknown render node graph {:?}, frame {} aborted",
                        handle,
                        frame_index
                    );
                    return Self::abort_frame(
                        state,
                        frame_index,
                        delta,
                        started,
                        FrameAbortReason::InvalidGraph(handle),
                    );
                }
            }
        }

        let mut locked: Vec<MutexGuard<'_, RenderNodeGraphNodeStore>> =
            stores.iter().map(|store| store.lock()).collect();
        for store in locked.iter_mut() {
            store.init_nodes(&self.shared);
        }

        self.data_store_manager.pre_render();
        self.gpu.lock_frame_staging_data();
        for store in locked.iter_mut() {
            store.begin_frame();
        }

        if let Err(err) = self.device.wait_for_frame_fence() {
            log::warn!("render_frame: {}, frame {} aborted", err, frame_index);
            let reason = FrameAbortReason::DeviceLost;
            return Self::abort_frame(state, frame_index, delta, started, reason);
        }

        self.gpu.handle_pending_allocations();
        for store in locked.iter_mut() {
            store.pre_execute();
        }
        self.gpu.handle_pending_allocations();

        self.execute_nodes(&mut locked);

        let multi_queue = self.config.multi_queue && self.device.capabilities().multi_queue;
        let mut frame_data = flatten_contexts(&locked, multi_queue, frame_index);

        {
            crate::profile_scope!("Renderer::backend");
            self.device.activate();
            self.data_store_manager.pre_render_backend();
            state.backend.render(&mut frame_data, &state.back_buffer);
            state.backend.present(&state.back_buffer);
            self.device.deactivate();
        }
        drop(frame_data);
        drop(locked);

        self.data_store_manager.post_render();
        self.device.frame_end();
        self.gpu.end_frame();

        state.last_timings = RenderTimings {
            frame_index,
            delta_seconds: delta,
            total_seconds: state.timer.total(),
            frame_cpu_time: started.elapsed(),
        };
        crate::frame_mark!();
        RenderFrameStatus::Presented { frame_index }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.device.wait_for_idle();
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("backend_type", &self.device.backend_type())
            .field("config", &self.config)
            .field("graph_manager", &self.graph_manager)
            .finish_non_exhaustive()
    }
}

/// Turn every initialized node with recorded work into a command context.
///
/// Wait indices inside a graph are rewritten to positions in the flattened
/// list. A skipped node passes its own waits on to whoever waited for it.
/// Without multi-queue every context goes to the default queue and carries
/// no waits.
fn flatten_contexts<'a>(
    stores: &'a [MutexGuard<'_, RenderNodeGraphNodeStore>],
    multi_queue: bool,
    frame_index: u64,
) -> RenderCommandFrameData<'a> {
    let mut frame_data = RenderCommandFrameData {
        contexts: Vec::new(),
        frame_index,
    };

    for store in stores {
        let store: &RenderNodeGraphNodeStore = store;
        // flattened positions each node resolves to, per node index
        let mut resolved: Vec<Vec<usize>> = Vec::with_capacity(store.nodes.len());

        for entry in &store.nodes {
            let waits: Vec<usize> = match entry.context.as_ref() {
                Some(context) if multi_queue => {
                    let mut waits: Vec<usize> = context
                        .submit_info
                        .wait_node_indices
                        .iter()
                        .filter_map(|&index| resolved.get(index))
                        .flatten()
                        .copied()
                        .collect();
                    waits.sort_unstable();
                    waits.dedup();
                    waits
                }
                _ => Vec::new(),
            };

            let Some(context) = entry
                .initialized_context()
                .filter(|context| context.command_list.has_valid_render_commands())
            else {
                resolved.push(waits);
                continue;
            };

            let position = frame_data.contexts.len();
            for &wait in &waits {
                frame_data.contexts[wait].submit_dependencies.signal_semaphore = true;
            }
            resolved.push(vec![position]);
            frame_data.contexts.push(RenderCommandContext {
                render_graph_name: &store.render_graph_name,
                node_name: &entry.desc.node_name,
                command_list: &context.command_list,
                descriptor_set_manager: context.context.descriptor_set_manager(),
                pool_manager: context.context.pool_manager(),
                submit_dependencies: SubmitDependencies {
                    queue: if multi_queue {
                        context.submit_info.queue
                    } else {
                        GpuQueue::default()
                    },
                    signal_semaphore: false,
                    wait_for_context_indices: waits,
                },
            });
        }
    }
    frame_data
}
