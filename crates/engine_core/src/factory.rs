// crates/engine_core/src/factory.rs
//
// Process-wide tables plugins register into from their `loadPlugin` entry
// point, keyed by the plugin's logical module name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

pub type Factory<P> = Arc<dyn Fn() -> P + Send + Sync>;

pub struct FactoryTable<P> {
    entries: OnceLock<Mutex<HashMap<String, Factory<P>>>>,
}

impl<P> FactoryTable<P> {
    pub const fn new() -> Self {
        Self {
            entries: OnceLock::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Factory<P>>> {
        self.entries
            .get_or_init(Default::default)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers (or replaces) the factory for `name`.
    pub fn register(&self, name: &str, factory: impl Fn() -> P + Send + Sync + 'static) {
        if self.lock().insert(name.to_owned(), Arc::new(factory)).is_some() {
            tracing::warn!(name, "factory replaced");
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Builds a new product. The table lock is not held while the factory runs.
    pub fn create(&self, name: &str) -> Option<P> {
        let factory = self.lock().get(name).cloned()?;
        Some(factory())
    }
}

impl<P> Default for FactoryTable<P> {
    fn default() -> Self {
        Self::new()
    }
}
