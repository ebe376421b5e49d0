// crates/engine_core/src/renderer.rs

use std::any::Any;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::factory::FactoryTable;
use crate::subsystem::{LiveSubsystems, Subsystem};

/// Draws a frame. `render_all` is queued by the simulation thread and runs on
/// the core thread.
pub trait Renderer: Send + Sync {
    fn name(&self) -> &str;

    fn render_all(&self, frame: u64);
}

static RENDERERS: FactoryTable<Arc<dyn Renderer>> = FactoryTable::new();

pub fn register_renderer(name: &str, factory: impl Fn() -> Arc<dyn Renderer> + Send + Sync + 'static) {
    RENDERERS.register(name, factory);
}

pub fn unregister_renderer(name: &str) -> bool {
    RENDERERS.unregister(name)
}

/// Holds the renderer the frame loop draws with.
#[derive(Default)]
pub struct RendererManager {
    active: Option<Arc<dyn Renderer>>,
}

impl RendererManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self, name: &str) -> bool {
        RENDERERS.contains(name)
    }

    /// Builds the renderer registered under `name` and makes it active.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let renderer = RENDERERS
            .create(name)
            .ok_or_else(|| EngineError::UnknownFactory(name.to_owned()))?;
        tracing::info!(renderer = renderer.name(), "renderer active");
        self.active = Some(renderer);
        Ok(())
    }

    pub fn active(&self) -> Option<Arc<dyn Renderer>> {
        self.active.clone()
    }

    /// Drops the active renderer. Commands already queued keep their own reference.
    pub fn clear_active(&mut self) {
        if let Some(renderer) = self.active.take() {
            tracing::debug!(renderer = renderer.name(), "renderer released");
        }
    }
}

impl Subsystem for RendererManager {
    fn name(&self) -> &'static str {
        "RendererManager"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {
        self.clear_active();
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
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct Counting {
        frames: AtomicU64,
    }

    impl Renderer for Counting {
        fn name(&self) -> &str {
            "Counting"
        }

        fn render_all(&self, _frame: u64) {
            self.frames.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn set_active_builds_from_the_registered_factory() {
        let mut manager = RendererManager::new();
        assert!(matches!(
            manager.set_active("CountingRendererTest"),
            Err(EngineError::UnknownFactory(_))
        ));

        register_renderer("CountingRendererTest", || Arc::new(Counting::default()));
        assert!(manager.is_available("CountingRendererTest"));
        manager.set_active("CountingRendererTest").unwrap();

        let renderer = manager.active().unwrap();
        renderer.render_all(0);
        assert_eq!(renderer.name(), "Counting");

        manager.clear_active();
        assert!(manager.active().is_none());
        assert!(unregister_renderer("CountingRendererTest"));
    }
}
