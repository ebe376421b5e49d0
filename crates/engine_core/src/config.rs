// crates/engine_core/src/config.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::platform::hardware_concurrency;
use crate::render_system::NULL_RENDER_SYSTEM;
use crate::render_window::RenderWindowDesc;

/// Everything `Application::start_up` needs, usually read from `engine.toml`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartUpDesc {
    pub render_system: String,
    pub primary_window: RenderWindowDesc,
    pub renderer: String,
    pub scene_manager: Option<String>,
    pub input: Option<String>,
    /// Loaded in this order.
    pub importers: Vec<String>,
    /// Defaults to one less than the hardware thread count.
    pub worker_threads: Option<usize>,
    pub module_dir: Option<PathBuf>,
}

impl Default for StartUpDesc {
    fn default() -> Self {
        Self {
            render_system: NULL_RENDER_SYSTEM.into(),
            primary_window: RenderWindowDesc::default(),
            renderer: "NullRenderer".into(),
            scene_manager: Some("BasicSceneManager".into()),
            input: None,
            importers: Vec::new(),
            worker_threads: None,
            module_dir: None,
        }
    }
}

impl StartUpDesc {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let desc = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "start-up description loaded");
        Ok(desc)
    }

    /// The simulation thread is one of the hardware threads, so the pool gets the rest.
    pub fn worker_thread_count(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| hardware_concurrency().saturating_sub(1))
            .max(1)
    }
}
