// crates/engine_core/src/render_system.rs

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::factory::FactoryTable;
use crate::render_window::RenderWindowDesc;
use crate::subsystem::{LiveSubsystems, Subsystem};

/// Graphics backend. Everything but `create_window` runs on the core thread.
pub trait RenderSystem: Send + Sync {
    fn name(&self) -> &str;

    /// Shading language accepted by `GpuProgramManager` while this backend is active.
    fn shading_language(&self) -> &str;

    /// Validates and prepares the backend side of a new window.
    fn create_window(&self, desc: &RenderWindowDesc) -> Result<()>;

    /// Resolves GPU queries issued during the previous frame.
    fn update_queries(&self);

    fn device_update(&self) {}
}

static RENDER_SYSTEMS: FactoryTable<Arc<dyn RenderSystem>> = FactoryTable::new();

pub fn register_render_system(
    name: &str,
    factory: impl Fn() -> Arc<dyn RenderSystem> + Send + Sync + 'static,
) {
    RENDER_SYSTEMS.register(name, factory);
}

pub fn unregister_render_system(name: &str) -> bool {
    RENDER_SYSTEMS.unregister(name)
}

pub const NULL_RENDER_SYSTEM: &str = "NullRenderSystem";

/// Backend that accepts everything and draws nothing.
#[derive(Default)]
pub struct NullRenderSystem {
    query_updates: AtomicU64,
}

impl NullRenderSystem {
    pub fn query_updates(&self) -> u64 {
        self.query_updates.load(Ordering::Relaxed)
    }
}

impl RenderSystem for NullRenderSystem {
    fn name(&self) -> &str {
        NULL_RENDER_SYSTEM
    }

    fn shading_language(&self) -> &str {
        "null"
    }

    fn create_window(&self, desc: &RenderWindowDesc) -> Result<()> {
        if desc.width == 0 || desc.height == 0 {
            return Err(EngineError::startup(
                "RenderSystemManager",
                format!("window '{}' has a zero-sized surface", desc.title),
            ));
        }
        Ok(())
    }

    fn update_queries(&self) {
        self.query_updates.fetch_add(1, Ordering::Relaxed);
    }
}

/// Picks and owns the active render backend.
#[derive(Default)]
pub struct RenderSystemManager {
    active: Option<Arc<dyn RenderSystem>>,
}

impl RenderSystemManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiates the backend registered under `name` and makes it active.
    pub fn initialize(&mut self, name: &str) -> Result<Arc<dyn RenderSystem>> {
        let system = RENDER_SYSTEMS.create(name).ok_or_else(|| {
            EngineError::startup("RenderSystemManager", format!("no render system named '{name}'"))
        })?;

        tracing::info!(
            render_system = system.name(),
            language = system.shading_language(),
            "render system initialised"
        );
        self.active = Some(Arc::clone(&system));
        Ok(system)
    }

    pub fn is_available(&self, name: &str) -> bool {
        RENDER_SYSTEMS.contains(name)
    }

    pub fn active(&self) -> Option<Arc<dyn RenderSystem>> {
        self.active.clone()
    }

    /// Drops the active backend.
    pub fn release(&mut self) {
        if let Some(system) = self.active.take() {
            tracing::info!(render_system = system.name(), "render system shut down");
        }
    }
}

impl Subsystem for RenderSystemManager {
    fn name(&self) -> &'static str {
        "RenderSystemManager"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        if !RENDER_SYSTEMS.contains(NULL_RENDER_SYSTEM) {
            register_render_system(NULL_RENDER_SYSTEM, || Arc::new(NullRenderSystem::default()));
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.release();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::SubsystemRegistry;

    #[test]
    fn null_backend_is_always_available() {
        let mut registry = SubsystemRegistry::new().with(RenderSystemManager::new());
        registry.start_all().unwrap();

        let manager = registry.get_mut::<RenderSystemManager>().unwrap();
        let system = manager.initialize(NULL_RENDER_SYSTEM).unwrap();
        assert_eq!(system.name(), NULL_RENDER_SYSTEM);
        assert!(manager.active().is_some());

        assert!(system.create_window(&RenderWindowDesc::default()).is_ok());
        let flat = RenderWindowDesc {
            height: 0,
            ..RenderWindowDesc::default()
        };
        assert!(system.create_window(&flat).is_err());

        registry.stop_all();
    }

    #[test]
    fn unknown_backend_fails_startup() {
        let mut manager = RenderSystemManager::new();
        assert!(matches!(
            manager.initialize("Vulkan9000"),
            Err(EngineError::StartupFailure { subsystem: "RenderSystemManager", .. })
        ));
        assert!(manager.active().is_none());
    }
}
