// crates/engine_core/src/core_object.rs

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::subsystem::{LiveSubsystems, Subsystem};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoreObjectId(u64);

type Payload = Arc<dyn Any + Send + Sync>;

struct TrackedObject {
    kind: &'static str,
    payload: Payload,
}

#[derive(Default)]
struct TrackerState {
    objects: BTreeMap<CoreObjectId, TrackedObject>,
}

/// Cloneable registry of engine objects that must be gone before modules are
/// unmapped.
#[derive(Clone, Default)]
pub struct CoreObjectTracker {
    state: Arc<Mutex<TrackerState>>,
    next_id: Arc<AtomicU64>,
}

impl CoreObjectTracker {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register<T: Any + Send + Sync>(&self, kind: &'static str, object: Arc<T>) -> CoreObjectId {
        let id = CoreObjectId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().objects.insert(id, TrackedObject { kind, payload: object });
        id
    }

    pub fn get<T: Any + Send + Sync>(&self, id: CoreObjectId) -> Option<Arc<T>> {
        let payload = Arc::clone(&self.lock().objects.get(&id)?.payload);
        payload.downcast::<T>().ok()
    }

    /// Stops tracking `id`. The object itself is freed with its last `Arc`.
    pub fn destroy(&self, id: CoreObjectId) -> bool {
        self.lock().objects.remove(&id).is_some()
    }

    pub fn contains(&self, id: CoreObjectId) -> bool {
        self.lock().objects.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.lock().objects.len()
    }

    /// Destroys everything still tracked, newest first. Returns how many.
    fn destroy_all(&self) -> usize {
        let leftovers = std::mem::take(&mut self.lock().objects);
        let count = leftovers.len();
        for (id, object) in leftovers.into_iter().rev() {
            tracing::warn!(?id, kind = object.kind, "core object still alive at shutdown");
        }
        count
    }
}

#[derive(Default)]
pub struct CoreObjectManager {
    tracker: CoreObjectTracker,
}

impl CoreObjectManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracker(&self) -> CoreObjectTracker {
        self.tracker.clone()
    }
}

impl Subsystem for CoreObjectManager {
    fn name(&self) -> &'static str {
        "CoreObjectManager"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {
        self.tracker.destroy_all();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
