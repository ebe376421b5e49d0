// crates/engine_core/src/importer.rs

use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::factory::FactoryTable;
use crate::subsystem::{LiveSubsystems, Subsystem};

/// Host-side result of an import. Holds no plugin code, so it may outlive the
/// plugin that produced it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedResource {
    pub name: String,
    pub kind: String,
    pub data: Vec<u8>,
    pub properties: BTreeMap<String, String>,
}

/// Imports files with particular extensions.
pub trait SpecificImporter: Send + Sync {
    fn name(&self) -> &str;

    /// Lower-case extensions without the dot.
    fn extensions(&self) -> &[&str];

    fn import(&self, path: &Path, bytes: &[u8]) -> Result<ImportedResource>;
}

static IMPORTERS: FactoryTable<Box<dyn SpecificImporter>> = FactoryTable::new();

pub fn register_importer(
    name: &str,
    factory: impl Fn() -> Box<dyn SpecificImporter> + Send + Sync + 'static,
) {
    IMPORTERS.register(name, factory);
}

pub fn unregister_importer(name: &str) -> bool {
    IMPORTERS.unregister(name)
}

struct Registered {
    /// Plugin the importer came from, `None` for host-provided importers.
    plugin: Option<String>,
    importer: Box<dyn SpecificImporter>,
}

/// Dispatches files to the importer that claims their extension. Later
/// registrations win over earlier ones for the same extension.
#[derive(Default)]
pub struct Importer {
    importers: Vec<Registered>,
}

impl Importer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, importer: Box<dyn SpecificImporter>) {
        self.importers.push(Registered {
            plugin: None,
            importer,
        });
    }

    /// Adds the importer a plugin registered under its module name.
    pub fn register_from_plugin(&mut self, plugin: &str) -> Result<()> {
        let importer = IMPORTERS
            .create(plugin)
            .ok_or_else(|| EngineError::UnknownFactory(plugin.to_owned()))?;
        tracing::debug!(
            plugin,
            importer = importer.name(),
            extensions = ?importer.extensions(),
            "importer registered"
        );
        self.importers.push(Registered {
            plugin: Some(plugin.to_owned()),
            importer,
        });
        Ok(())
    }

    /// Drops every importer that came from a plugin. Returns how many.
    pub fn release_plugin_importers(&mut self) -> usize {
        let before = self.importers.len();
        self.importers.retain(|registered| registered.plugin.is_none());
        before - self.importers.len()
    }

    pub fn importer_count(&self) -> usize {
        self.importers.len()
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    pub fn import(&self, path: &Path) -> Result<ImportedResource> {
        let importer = self.find(path).ok_or_else(|| EngineError::Import {
            path: path.to_owned(),
            reason: "no importer for this extension".into(),
        })?;
        let bytes = fs::read(path)?;

        tracing::debug!(path = %path.display(), importer = importer.name(), "importing");
        importer.import(path, &bytes)
    }

    fn find(&self, path: &Path) -> Option<&dyn SpecificImporter> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        self.importers
            .iter()
            .rev()
            .map(|registered| registered.importer.as_ref())
            .find(|importer| importer.extensions().contains(&extension.as_str()))
    }
}

impl Subsystem for Importer {
    fn name(&self) -> &'static str {
        "Importer"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {
        let released = self.release_plugin_importers();
        if released > 0 {
            tracing::warn!(released, "plugin importers still registered at shutdown");
        }
        self.importers.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
