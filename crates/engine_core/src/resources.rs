// crates/engine_core/src/resources.rs

use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core_object::{CoreObjectId, CoreObjectManager, CoreObjectTracker};
use crate::error::{EngineError, Result};
use crate::subsystem::{LiveSubsystems, Subsystem};

struct Entry {
    object: CoreObjectId,
    type_name: &'static str,
}

/// Named resources, backed by the core object tracker.
#[derive(Clone)]
pub struct ResourceStore {
    tracker: CoreObjectTracker,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl ResourceStore {
    fn new(tracker: CoreObjectTracker) -> Self {
        Self {
            tracker,
            entries: Arc::default(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores `resource` under `name`, replacing whatever was there.
    pub fn insert<R: Any + Send + Sync>(&self, name: &str, resource: R) -> Arc<R> {
        let resource = Arc::new(resource);
        let object = self.tracker.register(type_name::<R>(), Arc::clone(&resource));
        let previous = self.lock().insert(
            name.to_owned(),
            Entry {
                object,
                type_name: type_name::<R>(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(resource = name, "replacing resource");
            self.tracker.destroy(previous.object);
        }
        resource
    }

    pub fn get<R: Any + Send + Sync>(&self, name: &str) -> Option<Arc<R>> {
        let object = self.lock().get(name)?.object;
        self.tracker.get::<R>(object)
    }

    /// Like `get`, but says why nothing came back.
    pub fn require<R: Any + Send + Sync>(&self, name: &str) -> Result<Arc<R>> {
        let stored = self
            .lock()
            .get(name)
            .map(|entry| entry.type_name)
            .ok_or_else(|| EngineError::UnknownResource(name.to_owned()))?;
        self.get::<R>(name).ok_or_else(|| EngineError::ResourceType {
            name: name.to_owned(),
            stored,
            requested: type_name::<R>(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn unload(&self, name: &str) -> bool {
        match self.lock().remove(name) {
            Some(entry) => self.tracker.destroy(entry.object),
            None => false,
        }
    }

    pub fn unload_all(&self) -> usize {
        let entries = std::mem::take(&mut *self.lock());
        let count = entries.len();
        for entry in entries.into_values() {
            self.tracker.destroy(entry.object);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct Resources {
    store: Option<ResourceStore>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> Result<ResourceStore> {
        self.store.clone().ok_or(EngineError::SubsystemNotLive("Resources"))
    }
}

impl Subsystem for Resources {
    fn name(&self) -> &'static str {
        "Resources"
    }

    fn start(&mut self, live: &LiveSubsystems<'_>) -> Result<()> {
        let tracker = live.get::<CoreObjectManager>()?.tracker();
        self.store = Some(ResourceStore::new(tracker));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(store) = self.store.take() {
            let unloaded = store.unload_all();
            if unloaded > 0 {
                tracing::info!(unloaded, "resources released");
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
