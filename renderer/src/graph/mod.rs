//! Render node graphs.
//!
//! A graph is an ordered list of render nodes created from a
//! [`RenderNodeGraphDesc`]. The [`RenderNodeGraphManager`] validates the
//! description, instantiates the nodes through a [`RenderNodeRegistry`] and
//! hands out a [`RenderHandleReference`] identifying the graph. The manager
//! keeps its own reference; once it holds the last one the graph is
//! collected by [`RenderNodeGraphManager::handle_pending_graphs`].
//!
//! # Validation
//!
//! | Rule | Error |
//! |------|-------|
//! | node names are unique inside the graph | [`RendererError::DuplicateNodeName`] |
//! | `wait_for` names an earlier node | [`RendererError::InvalidWaitDependency`] |
//! | node type is registered | [`RendererError::UnknownRenderNodeType`] |
//!
//! Since waits only point backwards, a valid graph is acyclic.

mod desc;
mod share_data;

pub use desc::{RenderNodeDesc, RenderNodeGraphDesc};
pub use share_data::RenderNodeGraphShareData;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::command::RenderCommandList;
use crate::error::RendererError;
use crate::handle::{RenderHandle, RenderHandleInfoFlags, RenderHandleReference, RenderHandleType};
use crate::node::{
    RenderCommandListSubmitInfo, RenderNode, RenderNodeContextData, RenderNodeContextManager,
    RenderNodeContextShared, RenderNodeRegistry,
};
use crate::task_queue::Task;

/// One instantiated node of a graph.
pub struct RenderNodeEntry {
    /// Description the node was created from.
    pub desc: RenderNodeDesc,
    /// Node instance.
    pub node: Box<dyn RenderNode>,
    /// Context data, allocated on first initialization.
    pub context: Option<RenderNodeContextData>,
    submit_info: RenderCommandListSubmitInfo,
}

impl RenderNodeEntry {
    /// Context data of an initialized node.
    pub fn initialized_context(&self) -> Option<&RenderNodeContextData> {
        self.context.as_ref().filter(|context| context.initialized)
    }

    /// Task running `execute_frame`, or `None` if the node is not initialized.
    pub(crate) fn execute_task(&mut self) -> Option<Task<'_>> {
        let Self { desc, node, context, .. } = self;
        let context = context.as_mut().filter(|context| context.initialized)?;
        Some(Box::new(move || {
            crate::profile_scope_dynamic!(desc.node_name.as_str());
            let RenderNodeContextData {
                command_list,
                context,
                ..
            } = context;
            node.execute_frame(context, command_list);
            log::trace!(
                "{}::{} recorded {} commands",
                context.render_graph_name(),
                desc.node_name,
                command_list.commands().len()
            );
        }))
    }
}

/// Nodes and per-node context data of one graph.
pub struct RenderNodeGraphNodeStore {
    /// Graph name.
    pub render_graph_name: String,
    /// Every node has been initialized.
    pub initialized: bool,
    /// Nodes in execution order.
    pub nodes: Vec<RenderNodeEntry>,
    /// Outputs shared between the nodes.
    pub share_data: Arc<RenderNodeGraphShareData>,
}

impl RenderNodeGraphNodeStore {
    /// Allocate missing context data and run `init_node` on uninitialized
    /// nodes. Initialized nodes are left alone.
    pub fn init_nodes(&mut self, shared: &RenderNodeContextShared) {
        if self.initialized {
            return;
        }
        crate::profile_scope!("RenderNodeGraphNodeStore::init_nodes");

        for (index, entry) in self.nodes.iter_mut().enumerate() {
            let context = entry.context.get_or_insert_with(|| {
                let manager = RenderNodeContextManager::new(
                    shared,
                    &self.render_graph_name,
                    &entry.desc.node_name,
                    index,
                    Arc::clone(&self.share_data),
                );
                RenderNodeContextData::new(manager, entry.submit_info.clone())
            });
            if context.initialized {
                continue;
            }
            context.submit_info = entry.submit_info.clone();
            entry.node.init_node(&mut context.context);
            context.initialized = true;
            log::debug!(
                "Initialized render node {}::{} ({})",
                self.render_graph_name,
                entry.desc.node_name,
                entry.desc.type_name
            );
        }
        self.initialized = true;
    }

    /// Rotate share data and reset every node's per-frame state.
    pub fn begin_frame(&mut self) {
        self.share_data.begin_frame();
        for context in self.nodes.iter_mut().filter_map(|entry| entry.context.as_mut()) {
            context.begin_frame();
        }
    }

    /// Run `pre_execute_frame` on every initialized node.
    pub fn pre_execute(&mut self) {
        for entry in &mut self.nodes {
            if let Some(context) = entry.context.as_mut().filter(|context| context.initialized) {
                entry.node.pre_execute_frame(&mut context.context);
            }
        }
    }

    /// Force re-initialization of every node and drop cached PSOs.
    pub fn invalidate(&mut self) {
        self.initialized = false;
        for context in self.nodes.iter_mut().filter_map(|entry| entry.context.as_mut()) {
            context.initialized = false;
            context.context.invalidate_psos();
        }
    }

    /// Command list of a node, by name.
    pub fn command_list(&self, node_name: &str) -> Option<&RenderCommandList> {
        self.nodes
            .iter()
            .find(|entry| entry.desc.node_name == node_name)
            .and_then(|entry| entry.context.as_ref())
            .map(|context| &context.command_list)
    }
}

impl std::fmt::Debug for RenderNodeGraphNodeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.nodes.iter().map(|e| e.desc.node_name.as_str()).collect();
        f.debug_struct("RenderNodeGraphNodeStore")
            .field("render_graph_name", &self.render_graph_name)
            .field("initialized", &self.initialized)
            .field("nodes", &names)
            .finish()
    }
}

/// Shared, lockable graph store.
pub type SharedNodeStore = Arc<Mutex<RenderNodeGraphNodeStore>>;

struct GraphSlot {
    generation: u32,
    reference: Option<RenderHandleReference>,
    store: Option<SharedNodeStore>,
    destroy_requested: bool,
}

#[derive(Default)]
struct GraphTable {
    slots: Vec<GraphSlot>,
    free: Vec<u32>,
}

impl GraphTable {
    fn slot(&self, handle: RenderHandle) -> Option<&GraphSlot> {
        if handle.handle_type() != RenderHandleType::RenderNodeGraph {
            return None;
        }
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation() && slot.store.is_some())
    }
}

/// Owner of every render node graph.
pub struct RenderNodeGraphManager {
    registry: RenderNodeRegistry,
    buffering_count: u32,
    table: Mutex<GraphTable>,
}

impl RenderNodeGraphManager {
    /// Create a manager instantiating nodes from `registry`.
    pub fn new(registry: RenderNodeRegistry, buffering_count: u32) -> Self {
        Self {
            registry,
            buffering_count,
            table: Mutex::new(GraphTable::default()),
        }
    }

    /// Node registry.
    pub fn registry(&self) -> &RenderNodeRegistry {
        &self.registry
    }

    fn build_submit_infos(
        desc: &RenderNodeGraphDesc,
    ) -> Result<Vec<RenderCommandListSubmitInfo>, RendererError> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut infos: Vec<RenderCommandListSubmitInfo> = Vec::with_capacity(desc.nodes.len());

        for (index, node) in desc.nodes.iter().enumerate() {
            if positions.contains_key(node.node_name.as_str()) {
                return Err(RendererError::DuplicateNodeName {
                    graph: desc.name.clone(),
                    node: node.node_name.clone(),
                });
            }
            let mut wait_node_indices = Vec::with_capacity(node.wait_for.len());
            for wait_for in &node.wait_for {
                let Some(&position) = positions.get(wait_for.as_str()) else {
                    return Err(RendererError::InvalidWaitDependency {
                        node: node.node_name.clone(),
                        wait_for: wait_for.clone(),
                    });
                };
                if !wait_node_indices.contains(&position) {
                    wait_node_indices.push(position);
                }
            }
            for &position in &wait_node_indices {
                infos[position].signal_semaphore = true;
            }
            infos.push(RenderCommandListSubmitInfo {
                queue: node.queue,
                signal_semaphore: false,
                wait_node_indices,
            });
            positions.insert(node.node_name.as_str(), index);
        }
        Ok(infos)
    }

    /// Validate `desc`, instantiate its nodes and register the graph.
    pub fn create(
        &self,
        desc: RenderNodeGraphDesc,
    ) -> Result<RenderHandleReference, RendererError> {
        let submit_infos = Self::build_submit_infos(&desc)?;
        let mut nodes = Vec::with_capacity(desc.nodes.len());
        for (node_desc, submit_info) in desc.nodes.into_iter().zip(submit_infos) {
            let node = self.registry.create(&node_desc.type_name)?;
            nodes.push(RenderNodeEntry {
                desc: node_desc,
                node,
                context: None,
                submit_info,
            });
        }

        let store = RenderNodeGraphNodeStore {
            render_graph_name: desc.name,
            initialized: false,
            nodes,
            share_data: Arc::new(RenderNodeGraphShareData::new(self.buffering_count)),
        };
        log::debug!(
            "Created render node graph '{}' with {} nodes",
            store.render_graph_name,
            store.nodes.len()
        );

        let mut table = self.table.lock();
        let index = match table.free.pop() {
            Some(index) => index,
            None => {
                table.slots.push(GraphSlot {
                    generation: 0,
                    reference: None,
                    store: None,
                    destroy_requested: false,
                });
                (table.slots.len() - 1) as u32
            }
        };
        let slot = &mut table.slots[index as usize];
        let reference = RenderHandleReference::new(RenderHandle::new(
            RenderHandleType::RenderNodeGraph,
            index,
            slot.generation,
            RenderHandleInfoFlags::NONE,
        ));
        slot.reference = Some(reference.clone());
        slot.store = Some(Arc::new(Mutex::new(store)));
        slot.destroy_requested = false;
        Ok(reference)
    }

    /// Request destruction; the graph goes away at the next
    /// [`handle_pending_graphs`](Self::handle_pending_graphs).
    pub fn destroy(&self, handle: RenderHandle) {
        let mut table = self.table.lock();
        if table.slot(handle).is_none() {
            log::warn!("destroy of unknown render node graph {:?}", handle);
            return;
        }
        table.slots[handle.index() as usize].destroy_requested = true;
    }

    /// Store of a live graph.
    pub fn get(&self, handle: RenderHandle) -> Option<SharedNodeStore> {
        let table = self.table.lock();
        table
            .slot(handle)
            .filter(|slot| !slot.destroy_requested)
            .and_then(|slot| slot.store.clone())
    }

    /// Whether `handle` names a live graph.
    pub fn is_valid(&self, handle: RenderHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live graphs.
    pub fn graph_count(&self) -> usize {
        self.table
            .lock()
            .slots
            .iter()
            .filter(|slot| slot.store.is_some())
            .count()
    }

    /// Drop graphs that were destroyed or are referenced only by the manager.
    pub fn handle_pending_graphs(&self) {
        let mut table = self.table.lock();
        let mut freed = Vec::new();
        for (index, slot) in table.slots.iter_mut().enumerate() {
            let Some(reference) = &slot.reference else {
                continue;
            };
            if slot.destroy_requested || reference.ref_count() <= 1 {
                log::debug!("Destroying render node graph {:?}", reference.handle());
                slot.reference = None;
                slot.store = None;
                slot.destroy_requested = false;
                slot.generation = slot.generation.wrapping_add(1) & 0x00FF_FFFF;
                freed.push(index as u32);
            }
        }
        table.free.extend(freed);
    }

    /// Force every graph to re-run node initialization next frame.
    pub fn invalidate_all(&self) {
        let stores: Vec<SharedNodeStore> = self
            .table
            .lock()
            .slots
            .iter()
            .filter_map(|slot| slot.store.clone())
            .collect();
        for store in stores {
            store.lock().invalidate();
        }
        log::debug!("Render node graphs invalidated");
    }
}

impl std::fmt::Debug for RenderNodeGraphManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderNodeGraphManager")
            .field("registry", &self.registry)
            .field("graphs", &self.graph_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyGpuResourceManager;
    use crate::config::RendererConfig;
    use crate::data_store::{RenderDataStoreContext, RenderDataStoreManager};
    use crate::device::DeviceBackendType;

    struct CountingNode {
        inits: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl RenderNode for CountingNode {
        fn init_node(&mut self, _context: &mut RenderNodeContextManager) {
            self.inits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }

        fn execute_frame(
            &mut self,
            _context: &mut RenderNodeContextManager,
            cmd: &mut RenderCommandList,
        ) {
            cmd.draw(3, 1);
        }
    }

    fn manager_with_counter() -> (RenderNodeGraphManager, Arc<std::sync::atomic::AtomicUsize>) {
        let inits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut registry = RenderNodeRegistry::empty();
        let counter = Arc::clone(&inits);
        registry.register("RenderNodeCounting", move || {
            Box::new(CountingNode {
                inits: Arc::clone(&counter),
            })
        });
        (RenderNodeGraphManager::new(registry, 2), inits)
    }

    fn counting_graph(name: &str) -> RenderNodeGraphDesc {
        RenderNodeGraphDesc::new(name).with_node(RenderNodeDesc::new("RenderNodeCounting", "a"))
    }

    fn shared() -> RenderNodeContextShared {
        let gpu = Arc::new(DummyGpuResourceManager::new(2));
        let context = RenderDataStoreContext {
            gpu_resource_manager: gpu.clone(),
            backend_type: DeviceBackendType::Vulkan,
        };
        RenderNodeContextShared {
            config: Arc::new(RendererConfig::default()),
            backend_type: DeviceBackendType::Vulkan,
            command_buffering_count: 2,
            gpu_resource_manager: gpu,
            data_store_manager: Arc::new(RenderDataStoreManager::new(context)),
        }
    }

    #[test]
    fn test_duplicate_node_name_rejected() {
        let (manager, _) = manager_with_counter();
        let desc = RenderNodeGraphDesc::new("main")
            .with_node(RenderNodeDesc::new("RenderNodeCounting", "a"))
            .with_node(RenderNodeDesc::new("RenderNodeCounting", "a"));
        assert!(matches!(
            manager.create(desc),
            Err(RendererError::DuplicateNodeName { .. })
        ));
    }

    #[test]
    fn test_forward_wait_rejected() {
        let (manager, _) = manager_with_counter();
        let desc = RenderNodeGraphDesc::new("main")
            .with_node(RenderNodeDesc::new("RenderNodeCounting", "a").with_wait_for("b"))
            .with_node(RenderNodeDesc::new("RenderNodeCounting", "b"));
        assert!(matches!(
            manager.create(desc),
            Err(RendererError::InvalidWaitDependency { .. })
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let (manager, _) = manager_with_counter();
        let desc = RenderNodeGraphDesc::new("main").with_node(RenderNodeDesc::new("Missing", "a"));
        assert!(matches!(
            manager.create(desc),
            Err(RendererError::UnknownRenderNodeType(_))
        ));
        assert_eq!(manager.graph_count(), 0);
    }

    #[test]
    fn test_submit_info_patching() {
        let (manager, _) = manager_with_counter();
        let desc = RenderNodeGraphDesc::new("main")
            .with_node(RenderNodeDesc::new("RenderNodeCounting", "a"))
            .with_node(RenderNodeDesc::new("RenderNodeCounting", "b"))
            .with_node(
                RenderNodeDesc::new("RenderNodeCounting", "c")
                    .with_wait_for("a")
                    .with_wait_for("a"),
            );
        let graph = manager.create(desc).unwrap();
        let store = manager.get(graph.handle()).unwrap();
        let mut store = store.lock();
        store.init_nodes(&shared());

        let infos: Vec<_> = store
            .nodes
            .iter()
            .map(|entry| entry.context.as_ref().unwrap().submit_info.clone())
            .collect();
        assert!(infos[0].signal_semaphore);
        assert!(!infos[1].signal_semaphore);
        assert_eq!(infos[2].wait_node_indices, vec![0]);
    }

    #[test]
    fn test_init_is_idempotent() {
        let (manager, inits) = manager_with_counter();
        let desc = RenderNodeGraphDesc::new("main")
            .with_node(RenderNodeDesc::new("RenderNodeCounting", "a"))
            .with_node(RenderNodeDesc::new("RenderNodeCounting", "b"));
        let graph = manager.create(desc).unwrap();
        let store = manager.get(graph.handle()).unwrap();
        let shared = shared();

        store.lock().init_nodes(&shared);
        store.lock().init_nodes(&shared);
        assert_eq!(inits.load(std::sync::atomic::Ordering::SeqCst), 2);

        store.lock().invalidate();
        store.lock().init_nodes(&shared);
        assert_eq!(inits.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[test]
    fn test_execute_task_records_commands() {
        let (manager, _) = manager_with_counter();
        let graph = manager
            .create(counting_graph("main"))
            .unwrap();
        let store = manager.get(graph.handle()).unwrap();
        let mut store = store.lock();
        assert!(store.nodes[0].execute_task().is_none());

        store.init_nodes(&shared());
        store.begin_frame();
        let task = store.nodes[0].execute_task().unwrap();
        task();
        assert!(store.command_list("a").unwrap().has_valid_render_commands());
    }

    #[test]
    fn test_graph_collected_when_unreferenced() {
        let (manager, _) = manager_with_counter();
        let graph = manager
            .create(counting_graph("main"))
            .unwrap();
        let handle = graph.handle();

        manager.handle_pending_graphs();
        assert!(manager.is_valid(handle));

        drop(graph);
        manager.handle_pending_graphs();
        assert!(!manager.is_valid(handle));
        assert_eq!(manager.graph_count(), 0);

        // slot reused with a new generation
        let again = manager
            .create(counting_graph("again"))
            .unwrap();
        assert_eq!(again.handle().index(), handle.index());
        assert_ne!(again.handle(), handle);
    }

    #[test]
    fn test_destroy_is_deferred() {
        let (manager, _) = manager_with_counter();
        let graph = manager
            .create(counting_graph("main"))
            .unwrap();
        manager.destroy(graph.handle());
        assert!(manager.get(graph.handle()).is_none());
        manager.handle_pending_graphs();
        assert_eq!(manager.graph_count(), 0);
    }
}
