// crates/engine_core/src/gpu_program.rs

use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{EngineError, Result};
use crate::subsystem::{LiveSubsystems, Subsystem};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GpuProgramStage {
    Vertex,
    Fragment,
    Compute,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GpuProgramDesc {
    pub language: String,
    pub stage: GpuProgramStage,
    pub entry_point: String,
    pub source: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GpuProgram {
    pub id: u64,
    pub desc: GpuProgramDesc,
}

/// Knows which shading languages the active render system accepts.
#[derive(Default)]
pub struct GpuProgramManager {
    languages: HashSet<String>,
    next_id: AtomicU64,
}

impl GpuProgramManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_language(&mut self, language: &str) {
        if self.languages.insert(language.to_owned()) {
            tracing::debug!(language, "gpu program language registered");
        }
    }

    pub fn unregister_language(&mut self, language: &str) -> bool {
        self.languages.remove(language)
    }

    pub fn is_supported(&self, language: &str) -> bool {
        self.languages.contains(language)
    }

    pub fn create(&self, desc: GpuProgramDesc) -> Result<GpuProgram> {
        if !self.is_supported(&desc.language) {
            return Err(EngineError::UnsupportedGpuProgram(desc.language));
        }
        Ok(GpuProgram {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            desc,
        })
    }
}

impl Subsystem for GpuProgramManager {
    fn name(&self) -> &'static str {
        "GpuProgramManager"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {
        self.languages.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
