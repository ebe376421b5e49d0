// crates/engine_plugins/src/text_importer.rs

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::path::Path;

use engine_core::error::{EngineError, Result};
use engine_core::importer::{register_importer, unregister_importer, ImportedResource, SpecificImporter};

use crate::shims::{guard_load, guard_unload};

pub const NAME: &str = "TextImporter";

/// Imports UTF-8 text files as-is.
pub struct TextImporter;

impl SpecificImporter for TextImporter {
    fn name(&self) -> &str {
        NAME
    }

    fn extensions(&self) -> &[&str] {
        &["txt", "md", "toml"]
    }

    fn import(&self, path: &Path, bytes: &[u8]) -> Result<ImportedResource> {
        let text = std::str::from_utf8(bytes).map_err(|err| EngineError::Import {
            path: path.to_owned(),
            reason: err.to_string(),
        })?;

        let mut properties = BTreeMap::new();
        properties.insert("lines".to_owned(), text.lines().count().to_string());

        Ok(ImportedResource {
            name: path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
            kind: "Text".into(),
            data: bytes.to_vec(),
            properties,
        })
    }
}

pub extern "C" fn load() -> *mut c_void {
    guard_load(NAME, || {
        register_importer(NAME, || Box::new(TextImporter));
        std::ptr::null_mut()
    })
}

pub extern "C" fn unload() {
    guard_unload(NAME, || {
        unregister_importer(NAME);
    })
}
