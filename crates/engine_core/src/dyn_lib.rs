// crates/engine_core/src/dyn_lib.rs

use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;

use libloading::Library;

use engine_shared::plugin_api::{
    LoadPluginFn, UnloadPluginFn, LOAD_PLUGIN_SYMBOL, UNLOAD_PLUGIN_SYMBOL,
};

use crate::error::{EngineError, Result};
use crate::plugin_loader::resolve_module_name;
use crate::subsystem::{LiveSubsystems, Subsystem};

/// A mapped module. Entry points are only valid while it stays loaded.
pub trait LoadedModule: Send {
    fn load_entry(&self) -> Option<LoadPluginFn>;
    fn unload_entry(&self) -> Option<UnloadPluginFn>;
}

/// Turns a module file name (`foo.so`) into a mapped module.
pub trait ModuleLoader: Send {
    fn load(&self, file_name: &str) -> Result<Box<dyn LoadedModule>>;
}

// ----------------------------------------------------------------------------
// Native shared libraries
// ----------------------------------------------------------------------------

struct NativeModule {
    library: Library,
}

impl LoadedModule for NativeModule {
    fn load_entry(&self) -> Option<LoadPluginFn> {
        // SAFETY: the symbol type is fixed by the plugin contract.
        unsafe { self.library.get::<LoadPluginFn>(LOAD_PLUGIN_SYMBOL.as_bytes()) }
            .ok()
            .map(|symbol| *symbol)
    }

    fn unload_entry(&self) -> Option<UnloadPluginFn> {
        // SAFETY: the symbol type is fixed by the plugin contract.
        unsafe { self.library.get::<UnloadPluginFn>(UNLOAD_PLUGIN_SYMBOL.as_bytes()) }
            .ok()
            .map(|symbol| *symbol)
    }
}

/// Maps modules from disk with `libloading`.
#[derive(Default)]
pub struct NativeModuleLoader {
    search_dir: Option<PathBuf>,
}

impl NativeModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks for modules in `dir` instead of the loader's default search path.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            search_dir: Some(dir.into()),
        }
    }
}

impl ModuleLoader for NativeModuleLoader {
    fn load(&self, file_name: &str) -> Result<Box<dyn LoadedModule>> {
        let path = match &self.search_dir {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        };

        // SAFETY: running a module's initialisers is the point of loading it.
        let library = unsafe { Library::new(&path) }.map_err(|err| EngineError::PluginLoad {
            name: file_name.to_owned(),
            reason: err.to_string(),
        })?;

        Ok(Box::new(NativeModule { library }))
    }
}

// ----------------------------------------------------------------------------
// Statically linked modules
// ----------------------------------------------------------------------------

/// Entry points of a module linked into the executable.
#[derive(Clone, Copy)]
pub struct StaticModule {
    pub name: &'static str,
    pub load: Option<LoadPluginFn>,
    pub unload: Option<UnloadPluginFn>,
}

impl LoadedModule for StaticModule {
    fn load_entry(&self) -> Option<LoadPluginFn> {
        self.load
    }

    fn unload_entry(&self) -> Option<UnloadPluginFn> {
        self.unload
    }
}

/// Serves statically linked modules under their platform file names, and
/// hands anything else to an optional fallback loader.
pub struct StaticModuleLoader {
    modules: HashMap<String, StaticModule>,
    fallback: Option<Box<dyn ModuleLoader>>,
}

impl StaticModuleLoader {
    pub fn new(modules: impl IntoIterator<Item = StaticModule>) -> Self {
        let modules = modules
            .into_iter()
            .map(|module| (resolve_module_name(module.name), module))
            .collect();
        Self {
            modules,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.fallback = Some(Box::new(loader));
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load(&self, file_name: &str) -> Result<Box<dyn LoadedModule>> {
        if let Some(module) = self.modules.get(file_name) {
            return Ok(Box::new(*module));
        }
        match &self.fallback {
            Some(fallback) => fallback.load(file_name),
            None => Err(EngineError::PluginLoad {
                name: file_name.to_owned(),
                reason: "no statically linked module with that name".into(),
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Manager
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DynLibId(u32);

struct DynLib {
    id: DynLibId,
    file_name: String,
    module: Box<dyn LoadedModule>,
    loads: usize,
}

/// Owns every loaded module. Loading the same file twice shares the mapping;
/// it is released once every load has been matched by an unload.
pub struct DynLibManager {
    loader: Box<dyn ModuleLoader>,
    libs: Vec<DynLib>,
    next_id: u32,
}

impl DynLibManager {
    pub fn new(loader: impl ModuleLoader + 'static) -> Self {
        Self::with_boxed_loader(Box::new(loader))
    }

    pub fn with_boxed_loader(loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            loader,
            libs: Vec::new(),
            next_id: 0,
        }
    }

    pub fn load(&mut self, file_name: &str) -> Result<DynLibId> {
        if let Some(lib) = self.libs.iter_mut().find(|lib| lib.file_name == file_name) {
            lib.loads += 1;
            return Ok(lib.id);
        }

        let module = self.loader.load(file_name)?;
        let id = DynLibId(self.next_id);
        self.next_id += 1;

        tracing::debug!(module = file_name, "module loaded");
        self.libs.push(DynLib {
            id,
            file_name: file_name.to_owned(),
            module,
            loads: 1,
        });
        Ok(id)
    }

    pub fn load_entry(&self, id: DynLibId) -> Option<LoadPluginFn> {
        self.find(id)?.module.load_entry()
    }

    pub fn unload_entry(&self, id: DynLibId) -> Option<UnloadPluginFn> {
        self.find(id)?.module.unload_entry()
    }

    pub fn file_name(&self, id: DynLibId) -> Option<&str> {
        self.find(id).map(|lib| lib.file_name.as_str())
    }

    /// Drops one load of `id`. Returns `false` for an unknown id.
    pub fn unload(&mut self, id: DynLibId) -> bool {
        let Some(index) = self.libs.iter().position(|lib| lib.id == id) else {
            return false;
        };

        let lib = &mut self.libs[index];
        lib.loads -= 1;
        if lib.loads == 0 {
            let lib = self.libs.remove(index);
            tracing::debug!(module = %lib.file_name, "module unloaded");
        }
        true
    }

    pub fn is_loaded(&self, file_name: &str) -> bool {
        self.libs.iter().any(|lib| lib.file_name == file_name)
    }

    pub fn loaded_count(&self) -> usize {
        self.libs.len()
    }

    fn find(&self, id: DynLibId) -> Option<&DynLib> {
        self.libs.iter().find(|lib| lib.id == id)
    }
}

impl Subsystem for DynLibManager {
    fn name(&self) -> &'static str {
        "DynLibManager"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        Ok(())
    }

    /// Unmaps anything still loaded, newest first.
    fn stop(&mut self) {
        while let Some(lib) = self.libs.pop() {
            tracing::warn!(module = %lib.file_name, "module still loaded at shutdown");
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
