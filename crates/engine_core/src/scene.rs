// crates/engine_core/src/scene.rs

use crate::factory::FactoryTable;

/// Per-frame scene logic, ticked on the simulation thread.
pub trait SceneManager: Send {
    fn name(&self) -> &str;

    fn update(&mut self, delta: f32);
}

static SCENE_MANAGERS: FactoryTable<Box<dyn SceneManager>> = FactoryTable::new();

pub fn register_scene_manager(
    name: &str,
    factory: impl Fn() -> Box<dyn SceneManager> + Send + Sync + 'static,
) {
    SCENE_MANAGERS.register(name, factory);
}

pub fn unregister_scene_manager(name: &str) -> bool {
    SCENE_MANAGERS.unregister(name)
}

pub fn create_scene_manager(name: &str) -> Option<Box<dyn SceneManager>> {
    SCENE_MANAGERS.create(name)
}
