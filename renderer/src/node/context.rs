//! Per render node context data.
//!
//! Every (graph, node) pair owns one [`RenderNodeContextData`]: its command
//! list, its submission info and a [`RenderNodeContextManager`] giving the
//! node access to shared collaborators and its own per-node managers. The
//! data is allocated on first initialization and reused for every later
//! frame.

use std::collections::HashMap;
use std::sync::Arc;

use crate::command::RenderCommandList;
use crate::config::RendererConfig;
use crate::data_store::RenderDataStoreManager;
use crate::device::{DeviceBackendType, GpuQueue, GpuResourceManager};
use crate::graph::RenderNodeGraphShareData;
use crate::handle::{RenderHandle, RenderHandleInfoFlags, RenderHandleType};

/// Submission info patched in at node initialization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderCommandListSubmitInfo {
    /// Queue the node submits to.
    pub queue: GpuQueue,
    /// A later node of the graph waits for this one.
    pub signal_semaphore: bool,
    /// Indices, inside the graph, of nodes this one waits for.
    pub wait_node_indices: Vec<usize>,
}

/// Descriptor sets owned by one node.
///
/// Persistent sets live as long as the node; one-frame sets are dropped at
/// the next [`begin_frame`](Self::begin_frame).
#[derive(Debug, Default)]
pub struct NodeContextDescriptorSetManager {
    next_index: u32,
    binding_counts: HashMap<RenderHandle, u32>,
    one_frame: Vec<RenderHandle>,
}

impl NodeContextDescriptorSetManager {
    /// Drop one-frame sets.
    pub fn begin_frame(&mut self) {
        for handle in self.one_frame.drain(..) {
            self.binding_counts.remove(&handle);
        }
    }

    fn allocate(&mut self, binding_count: u32) -> RenderHandle {
        let handle = RenderHandle::new(
            RenderHandleType::DescriptorSet,
            self.next_index,
            0,
            RenderHandleInfoFlags::NONE,
        );
        self.next_index += 1;
        self.binding_counts.insert(handle, binding_count);
        handle
    }

    /// Create a descriptor set that lives as long as the node.
    pub fn create_descriptor_set(&mut self, binding_count: u32) -> RenderHandle {
        self.allocate(binding_count)
    }

    /// Create a descriptor set valid for the current frame only.
    pub fn create_one_frame_descriptor_set(&mut self, binding_count: u32) -> RenderHandle {
        let handle = self.allocate(binding_count);
        self.one_frame.push(handle);
        handle
    }

    /// Binding count of a live set.
    pub fn binding_count(&self, handle: RenderHandle) -> Option<u32> {
        self.binding_counts.get(&handle).copied()
    }

    /// Number of live sets.
    pub fn descriptor_set_count(&self) -> usize {
        self.binding_counts.len()
    }
}

/// Pipeline state objects requested by one node, cached by shader name.
#[derive(Debug, Default)]
pub struct NodeContextPsoManager {
    next_index: u32,
    compute: HashMap<String, RenderHandle>,
    graphics: HashMap<String, RenderHandle>,
}

impl NodeContextPsoManager {
    fn get_or_create(
        map: &mut HashMap<String, RenderHandle>,
        next_index: &mut u32,
        handle_type: RenderHandleType,
        shader: &str,
    ) -> RenderHandle {
        *map.entry(shader.to_string()).or_insert_with(|| {
            let flags = RenderHandleInfoFlags::NONE;
            let handle = RenderHandle::new(handle_type, *next_index, 0, flags);
            *next_index += 1;
            handle
        })
    }

    /// Compute PSO for `shader`, created on first request.
    pub fn get_compute_pso(&mut self, shader: &str) -> RenderHandle {
        Self::get_or_create(
            &mut self.compute,
            &mut self.next_index,
            RenderHandleType::ComputePso,
            shader,
        )
    }

    /// Graphics PSO for `shader`, created on first request.
    pub fn get_graphics_pso(&mut self, shader: &str) -> RenderHandle {
        Self::get_or_create(
            &mut self.graphics,
            &mut self.next_index,
            RenderHandleType::GraphicsPso,
            shader,
        )
    }

    /// Forget every cached PSO (shader reload).
    pub fn invalidate(&mut self) {
        self.compute.clear();
        self.graphics.clear();
    }

    /// Number of cached PSOs.
    pub fn pso_count(&self) -> usize {
        self.compute.len() + self.graphics.len()
    }
}

/// Ring of per-frame command pools of one node.
#[derive(Debug)]
pub struct NodeContextPoolManager {
    buffering_count: u32,
    buffer_index: u32,
    frames_begun: u64,
}

impl NodeContextPoolManager {
    /// Create a ring of `buffering_count` pools.
    pub fn new(buffering_count: u32) -> Self {
        let buffering_count = buffering_count.max(1);
        Self {
            buffering_count,
            // first begin_frame lands on slot 0
            buffer_index: buffering_count - 1,
            frames_begun: 0,
        }
    }

    /// Advance to the next pool in the ring.
    pub fn begin_frame(&mut self) {
        self.buffer_index = (self.buffer_index + 1) % self.buffering_count;
        self.frames_begun += 1;
    }

    /// Pool slot used by the current frame.
    pub fn current_buffer_index(&self) -> u32 {
        self.buffer_index
    }

    /// Number of frames begun.
    pub fn frames_begun(&self) -> u64 {
        self.frames_begun
    }
}

/// Everything a render node may access while it runs.
pub struct RenderNodeContextManager {
    render_graph_name: String,
    node_name: String,
    node_index: usize,
    config: Arc<RendererConfig>,
    backend_type: DeviceBackendType,
    gpu_resource_manager: Arc<dyn GpuResourceManager>,
    data_store_manager: Arc<RenderDataStoreManager>,
    share_data: Arc<RenderNodeGraphShareData>,
    descriptor_set_manager: NodeContextDescriptorSetManager,
    pso_manager: NodeContextPsoManager,
    pool_manager: NodeContextPoolManager,
}

/// Shared collaborators every context of a frame is built from.
#[derive(Clone)]
pub struct RenderNodeContextShared {
    /// Renderer configuration.
    pub config: Arc<RendererConfig>,
    /// API family.
    pub backend_type: DeviceBackendType,
    /// Frames in flight.
    pub command_buffering_count: u32,
    /// GPU resource manager.
    pub gpu_resource_manager: Arc<dyn GpuResourceManager>,
    /// Data store manager.
    pub data_store_manager: Arc<RenderDataStoreManager>,
}

impl RenderNodeContextManager {
    /// Create the context of node `node_index` of graph `render_graph_name`.
    pub fn new(
        shared: &RenderNodeContextShared,
        render_graph_name: &str,
        node_name: &str,
        node_index: usize,
        share_data: Arc<RenderNodeGraphShareData>,
    ) -> Self {
        Self {
            render_graph_name: render_graph_name.to_string(),
            node_name: node_name.to_string(),
            node_index,
            config: Arc::clone(&shared.config),
            backend_type: shared.backend_type,
            gpu_resource_manager: Arc::clone(&shared.gpu_resource_manager),
            data_store_manager: Arc::clone(&shared.data_store_manager),
            share_data,
            descriptor_set_manager: NodeContextDescriptorSetManager::default(),
            pso_manager: NodeContextPsoManager::default(),
            pool_manager: NodeContextPoolManager::new(shared.command_buffering_count),
        }
    }

    /// Name of the owning graph.
    pub fn render_graph_name(&self) -> &str {
        &self.render_graph_name
    }

    /// Node name.
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Index of the node inside its graph.
    pub fn node_index(&self) -> usize {
        self.node_index
    }

    /// Renderer configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// API family of the device.
    pub fn backend_type(&self) -> DeviceBackendType {
        self.backend_type
    }

    /// GPU resource manager.
    pub fn gpu_resource_manager(&self) -> &dyn GpuResourceManager {
        self.gpu_resource_manager.as_ref()
    }

    /// Data store manager.
    pub fn data_store_manager(&self) -> &RenderDataStoreManager {
        &self.data_store_manager
    }

    /// Per-graph outputs shared between nodes.
    pub fn share_data(&self) -> &RenderNodeGraphShareData {
        &self.share_data
    }

    /// Descriptor sets.
    pub fn descriptor_set_manager(&self) -> &NodeContextDescriptorSetManager {
        &self.descriptor_set_manager
    }

    /// Descriptor sets, mutable.
    pub fn descriptor_set_manager_mut(&mut self) -> &mut NodeContextDescriptorSetManager {
        &mut self.descriptor_set_manager
    }

    /// PSO cache.
    pub fn pso_manager_mut(&mut self) -> &mut NodeContextPsoManager {
        &mut self.pso_manager
    }

    /// Command pool ring.
    pub fn pool_manager(&self) -> &NodeContextPoolManager {
        &self.pool_manager
    }

    pub(crate) fn begin_frame(&mut self) {
        self.descriptor_set_manager.begin_frame();
        self.pool_manager.begin_frame();
    }

    pub(crate) fn invalidate_psos(&mut self) {
        self.pso_manager.invalidate();
    }
}

/// Context of one (graph, node) pair.
pub struct RenderNodeContextData {
    /// One-time initialization ran.
    pub initialized: bool,
    /// Command list the node records into.
    pub command_list: RenderCommandList,
    /// Node-facing context.
    pub context: RenderNodeContextManager,
    /// Submission info.
    pub submit_info: RenderCommandListSubmitInfo,
}

impl RenderNodeContextData {
    /// Create uninitialized context data.
    pub fn new(
        context: RenderNodeContextManager,
        submit_info: RenderCommandListSubmitInfo,
    ) -> Self {
        Self {
            initialized: false,
            command_list: RenderCommandList::new(),
            context,
            submit_info,
        }
    }

    /// Reset the command list and per-frame managers.
    pub fn begin_frame(&mut self) {
        self.command_list.begin_frame();
        self.context.begin_frame();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_frame_descriptor_sets_dropped() {
        let mut manager = NodeContextDescriptorSetManager::default();
        let persistent = manager.create_descriptor_set(2);
        let transient = manager.create_one_frame_descriptor_set(4);
        assert_eq!(manager.descriptor_set_count(), 2);
        assert_ne!(persistent, transient);

        manager.begin_frame();
        assert_eq!(manager.binding_count(persistent), Some(2));
        assert_eq!(manager.binding_count(transient), None);
    }

    #[test]
    fn test_pso_cache() {
        let mut manager = NodeContextPsoManager::default();
        let a = manager.get_compute_pso("blur.comp");
        assert_eq!(manager.get_compute_pso("blur.comp"), a);
        let b = manager.get_graphics_pso("blur.comp");
        assert_ne!(a, b);
        assert_eq!(manager.pso_count(), 2);
        manager.invalidate();
        assert_eq!(manager.pso_count(), 0);
    }

    #[test]
    fn test_pool_ring_rotation() {
        let mut pools = NodeContextPoolManager::new(3);
        let slots: Vec<u32> = (0..5)
            .map(|_| {
                pools.begin_frame();
                pools.current_buffer_index()
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1]);
        assert_eq!(pools.frames_begun(), 5);
    }
}
