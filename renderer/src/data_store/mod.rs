//! Render data stores.
//!
//! A data store is a named, thread-safe container that application code
//! fills during a frame and render nodes read during execution. The
//! [`RenderDataStoreManager`] owns every store, creates them through a
//! factory registry keyed by type name and forwards the per-frame hooks:
//!
//! | Hook | Called |
//! |------|--------|
//! | [`pre_render`](RenderDataStore::pre_render) | after graph gather, before nodes run |
//! | [`pre_render_backend`](RenderDataStore::pre_render_backend) | before backend submission |
//! | [`post_render`](RenderDataStore::post_render) | after present |

mod staging;

pub use staging::RenderDataStoreDefaultStaging;

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::device::{DeviceBackendType, GpuResourceManager};
use crate::error::RendererError;

/// A named per-frame data container.
pub trait RenderDataStore: Send + Sync + 'static {
    /// Instance name.
    fn name(&self) -> &str;

    /// Registered type name.
    fn type_name(&self) -> &'static str;

    /// Frame start, before render nodes run.
    fn pre_render(&self) {}

    /// Before the backend consumes recorded commands.
    fn pre_render_backend(&self) {}

    /// After the frame was presented.
    fn post_render(&self) {}

    /// Drop all queued data.
    fn clear(&self) {}

    /// Upcast for downcasting to the concrete store type.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Collaborators handed to data store factories.
#[derive(Clone)]
pub struct RenderDataStoreContext {
    /// GPU resource manager of the device.
    pub gpu_resource_manager: Arc<dyn GpuResourceManager>,
    /// Graphics API family of the device.
    pub backend_type: DeviceBackendType,
}

/// Creates a data store instance with the given name.
pub type RenderDataStoreFactory =
    fn(name: &str, context: &RenderDataStoreContext) -> Arc<dyn RenderDataStore>;

/// Owns every render data store.
pub struct RenderDataStoreManager {
    context: RenderDataStoreContext,
    factories: RwLock<HashMap<String, RenderDataStoreFactory>>,
    stores: RwLock<Vec<Arc<dyn RenderDataStore>>>,
}

impl RenderDataStoreManager {
    /// Create a manager with the built-in store types registered.
    pub fn new(context: RenderDataStoreContext) -> Self {
        let manager = Self {
            context,
            factories: RwLock::new(HashMap::new()),
            stores: RwLock::new(Vec::new()),
        };
        manager.register_factory(
            RenderDataStoreDefaultStaging::TYPE_NAME,
            RenderDataStoreDefaultStaging::create,
        );
        manager
    }

    /// Register (or replace) a factory for `type_name`.
    pub fn register_factory(&self, type_name: impl Into<String>, factory: RenderDataStoreFactory) {
        self.factories.write().insert(type_name.into(), factory);
    }

    /// Create a store of a registered type.
    pub fn create(
        &self,
        type_name: &str,
        name: &str,
    ) -> Result<Arc<dyn RenderDataStore>, RendererError> {
        let factory = self
            .factories
            .read()
            .get(type_name)
            .copied()
            .ok_or_else(|| RendererError::UnknownDataStoreType(type_name.to_string()))?;

        let mut stores = self.stores.write();
        if stores.iter().any(|s| s.name() == name) {
            return Err(RendererError::DuplicateDataStore(name.to_string()));
        }
        let store = factory(name, &self.context);
        log::debug!("created render data store '{}' ({})", name, type_name);
        stores.push(Arc::clone(&store));
        Ok(store)
    }

    /// Destroy a store by name. Holders of an `Arc` keep it alive.
    pub fn destroy(&self, name: &str) -> bool {
        let mut stores = self.stores.write();
        let before = stores.len();
        stores.retain(|s| s.name() != name);
        stores.len() != before
    }

    /// Look up a store by name.
    pub fn get_dyn(&self, name: &str) -> Option<Arc<dyn RenderDataStore>> {
        self.stores
            .read()
            .iter()
            .find(|s| s.name() == name)
            .cloned()
    }

    /// Look up a store by name and concrete type.
    pub fn get<T: RenderDataStore>(&self, name: &str) -> Option<Arc<T>> {
        self.get_dyn(name)?.into_any().downcast::<T>().ok()
    }

    /// Number of live stores.
    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    /// Whether no store exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn RenderDataStore>> {
        self.stores.read().clone()
    }

    /// Forward [`RenderDataStore::pre_render`] to every store.
    pub fn pre_render(&self) {
        for store in self.snapshot() {
            store.pre_render();
        }
    }

    /// Forward [`RenderDataStore::pre_render_backend`] to every store.
    pub fn pre_render_backend(&self) {
        for store in self.snapshot() {
            store.pre_render_backend();
        }
    }

    /// Forward [`RenderDataStore::post_render`] to every store.
    pub fn post_render(&self) {
        for store in self.snapshot() {
            store.post_render();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyGpuResourceManager;

    fn manager() -> RenderDataStoreManager {
        RenderDataStoreManager::new(RenderDataStoreContext {
            gpu_resource_manager: Arc::new(DummyGpuResourceManager::new(2)),
            backend_type: DeviceBackendType::Vulkan,
        })
    }

    #[test]
    fn test_create_and_get_typed() {
        let manager = manager();
        manager
            .create(RenderDataStoreDefaultStaging::TYPE_NAME, "staging")
            .unwrap();

        let store = manager.get::<RenderDataStoreDefaultStaging>("staging");
        assert!(store.is_some());
        assert!(manager.get::<RenderDataStoreDefaultStaging>("missing").is_none());
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let manager = manager();
        manager
            .create(RenderDataStoreDefaultStaging::TYPE_NAME, "staging")
            .unwrap();
        assert_eq!(
            manager
                .create(RenderDataStoreDefaultStaging::TYPE_NAME, "staging")
                .err(),
            Some(RendererError::DuplicateDataStore("staging".into()))
        );
        assert!(matches!(
            manager.create("RenderDataStoreFoo", "foo"),
            Err(RendererError::UnknownDataStoreType(_))
        ));
    }

    #[test]
    fn test_destroy() {
        let manager = manager();
        manager
            .create(RenderDataStoreDefaultStaging::TYPE_NAME, "staging")
            .unwrap();
        assert!(manager.destroy("staging"));
        assert!(manager.is_empty());
        assert!(!manager.destroy("staging"));
    }
}
