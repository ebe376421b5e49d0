// crates/engine_core/src/app.rs

use std::path::Path;
use std::sync::Arc;

use engine_shared::plugin_api::PluginContext;

use crate::config::StartUpDesc;
use crate::core_object::CoreObjectManager;
use crate::core_thread::CoreThread;
use crate::deferred_call::DeferredCallManager;
use crate::dyn_lib::{DynLibId, DynLibManager, ModuleLoader, NativeModuleLoader};
use crate::engine_loop::{EngineLoop, LoopContext, LoopStopper};
use crate::error::{EngineError, Result};
use crate::frame_sync::FrameSyncGate;
use crate::gpu_program::GpuProgramManager;
use crate::importer::{ImportedResource, Importer};
use crate::input::Input;
use crate::platform::Platform;
use crate::plugin_loader;
use crate::profiler::Profiler;
use crate::render_system::RenderSystemManager;
use crate::render_window::{RenderWindowId, RenderWindowManager};
use crate::renderer::RendererManager;
use crate::resource_managers::{FontManager, MaterialManager, MeshManager};
use crate::resources::Resources;
use crate::scene::{self, SceneManager};
use crate::subsystem::{Subsystem, SubsystemRegistry};
use crate::task_scheduler::{TaskScheduler, WorkerSlots};
use crate::thread_pool::ThreadPool;
use crate::time::Time;

/// Why a plugin was loaded. Decides which service is released before it is unloaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PluginRole {
    RenderSystem,
    Renderer,
    SceneManager,
    Importer,
    Input,
    User,
}

pub struct LoadedPlugin {
    name: String,
    role: PluginRole,
    library: DynLibId,
    context: Option<PluginContext>,
}

impl LoadedPlugin {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> PluginRole {
        self.role
    }

    pub fn context(&self) -> Option<PluginContext> {
        self.context
    }
}

/// The declared start order. Shutdown walks it backwards.
fn declare_subsystems(worker_threads: usize, loader: Box<dyn ModuleLoader>) -> SubsystemRegistry {
    SubsystemRegistry::new()
        .with(Platform::new())
        .with(Profiler::new())
        .with(ThreadPool::new(worker_threads))
        .with(TaskScheduler::new())
        .with(CoreThread::new())
        .with(DeferredCallManager::new())
        .with(Time::new())
        .with(DynLibManager::with_boxed_loader(loader))
        .with(CoreObjectManager::new())
        .with(Resources::new())
        .with(GpuProgramManager::new())
        .with(RenderSystemManager::new())
        .with(RenderWindowManager::new())
        .with(Input::new())
        .with(RendererManager::new())
        .with(MeshManager::new())
        .with(MaterialManager::new())
        .with(FontManager::new())
        .with(Importer::new())
}

/// Owns the subsystems, the primary window and every plugin loaded at start-up.
pub struct Application {
    registry: SubsystemRegistry,
    loader: Option<Box<dyn ModuleLoader>>,
    primary_window: Option<RenderWindowId>,
    plugins: Vec<LoadedPlugin>,
    scene_manager: Option<Box<dyn SceneManager>>,
    engine_loop: EngineLoop,
}

impl Application {
    /// Plugins are loaded from disk, from `StartUpDesc::module_dir` if set.
    pub fn new() -> Self {
        Self {
            registry: SubsystemRegistry::new(),
            loader: None,
            primary_window: None,
            plugins: Vec::new(),
            scene_manager: None,
            engine_loop: EngineLoop::new(),
        }
    }

    pub fn with_module_loader(loader: impl ModuleLoader + 'static) -> Self {
        let mut app = Self::new();
        app.loader = Some(Box::new(loader));
        app
    }

    /// Brings every subsystem up in declared order and loads the configured
    /// plugins once the subsystems they register into are live.
    ///
    /// On failure nothing is rolled back; call `shut_down`.
    pub fn start_up(&mut self, desc: &StartUpDesc) -> Result<()> {
        if !self.registry.is_empty() {
            return Err(EngineError::startup("Application", "already started"));
        }

        let loader = self.loader.take().unwrap_or_else(|| -> Box<dyn ModuleLoader> {
            match &desc.module_dir {
                Some(dir) => Box::new(NativeModuleLoader::in_dir(dir)),
                None => Box::new(NativeModuleLoader::new()),
            }
        });
        self.registry = declare_subsystems(desc.worker_thread_count(), loader);
        tracing::info!(
            subsystems = self.registry.len(),
            workers = desc.worker_thread_count(),
            "starting engine"
        );

        self.registry.start_until::<TaskScheduler>()?;
        // The simulation thread is one of the workers; it lends its slot back while it waits.
        self.registry.get::<TaskScheduler>()?.remove_worker();

        self.registry.start_until::<RenderWindowManager>()?;
        self.create_primary_window(desc)?;

        self.registry.start_until::<RendererManager>()?;
        self.load_role_plugin(&desc.renderer, PluginRole::Renderer);
        self.registry
            .get_mut::<RendererManager>()?
            .set_active(&desc.renderer)
            .map_err(|err| {
                EngineError::startup("RendererManager", format!("renderer unavailable: {err}"))
            })?;

        if let Some(name) = &desc.scene_manager {
            self.load_role_plugin(name, PluginRole::SceneManager);
            match scene::create_scene_manager(name) {
                Some(manager) => {
                    tracing::info!(scene_manager = manager.name(), "scene manager active");
                    self.scene_manager = Some(manager);
                }
                None => tracing::warn!(scene_manager = %name, "scene manager unavailable"),
            }
        }

        self.registry.start_all()?;

        for name in &desc.importers {
            if self.load_role_plugin(name, PluginRole::Importer) {
                if let Err(err) = self.registry.get_mut::<Importer>()?.register_from_plugin(name) {
                    tracing::warn!(plugin = %name, %err, "importer plugin registered nothing");
                }
            }
        }

        if let Some(name) = &desc.input {
            if self.load_role_plugin(name, PluginRole::Input) {
                if let Err(err) = self.registry.get_mut::<Input>()?.set_handler(name) {
                    tracing::warn!(plugin = %name, %err, "input plugin registered nothing");
                }
            }
        }

        tracing::info!(plugins = self.plugins.len(), "engine started");
        Ok(())
    }

    fn create_primary_window(&mut self, desc: &StartUpDesc) -> Result<()> {
        if !self.registry.get::<RenderSystemManager>()?.is_available(&desc.render_system) {
            self.load_role_plugin(&desc.render_system, PluginRole::RenderSystem);
        }
        let system = self
            .registry
            .get_mut::<RenderSystemManager>()?
            .initialize(&desc.render_system)?;
        self.registry
            .get_mut::<GpuProgramManager>()?
            .register_language(system.shading_language());

        system.create_window(&desc.primary_window)?;
        let id = self
            .registry
            .get_mut::<RenderWindowManager>()?
            .add(&desc.primary_window, true);
        self.primary_window = Some(id);
        Ok(())
    }

    /// Loads a start-up plugin. Returns whether the module was found.
    fn load_role_plugin(&mut self, name: &str, role: PluginRole) -> bool {
        let Ok(dyn_libs) = self.registry.get_mut::<DynLibManager>() else {
            return false;
        };
        match plugin_loader::load_plugin(dyn_libs, name) {
            (Some(library), context) => {
                self.plugins.push(LoadedPlugin {
                    name: name.to_owned(),
                    role,
                    library,
                    context,
                });
                true
            }
            (None, _) => false,
        }
    }

    /// Loads an extra plugin after start-up. It is unloaded with the others
    /// at shutdown unless `unload_plugin` is called first.
    pub fn load_plugin(&mut self, name: &str) -> Result<Option<PluginContext>> {
        if self.load_role_plugin(name, PluginRole::User) {
            Ok(self.plugins.last().and_then(LoadedPlugin::context))
        } else {
            Err(EngineError::PluginLoad {
                name: name.to_owned(),
                reason: "module could not be loaded".into(),
            })
        }
    }

    /// Unloads the most recently loaded plugin called `name`.
    pub fn unload_plugin(&mut self, name: &str) -> Result<bool> {
        let Some(index) = self.plugins.iter().rposition(|plugin| plugin.name == name) else {
            return Ok(false);
        };
        let plugin = self.plugins.remove(index);
        plugin_loader::unload_plugin(self.registry.get_mut::<DynLibManager>()?, plugin.library);
        Ok(true)
    }

    pub fn plugins(&self) -> &[LoadedPlugin] {
        &self.plugins
    }

    /// Runs frames on the calling thread until `stop_main_loop` is called.
    pub fn run_main_loop(&mut self) -> Result<()> {
        self.engine_loop.run(&mut self.registry, &mut self.scene_manager)
    }

    pub fn stop_main_loop(&self) {
        self.engine_loop.stopper().stop();
    }

    /// Lets other threads stop the loop.
    pub fn stopper(&self) -> LoopStopper {
        self.engine_loop.stopper()
    }

    pub fn set_main_loop_callback(
        &mut self,
        callback: impl FnMut(&LoopContext<'_>) + Send + 'static,
    ) {
        self.engine_loop.set_callback(Some(Box::new(callback)));
    }

    pub fn clear_main_loop_callback(&mut self) {
        self.engine_loop.set_callback(None);
    }

    pub fn frames(&self) -> u64 {
        self.engine_loop.frames()
    }

    pub fn frame_sync(&self) -> Arc<FrameSyncGate> {
        self.engine_loop.gate()
    }

    pub fn primary_window(&self) -> Option<RenderWindowId> {
        self.primary_window
    }

    pub fn subsystems(&self) -> &SubsystemRegistry {
        &self.registry
    }

    pub fn subsystem<T: Subsystem>(&self) -> Result<&T> {
        self.registry.get::<T>()
    }

    pub fn subsystem_mut<T: Subsystem>(&mut self) -> Result<&mut T> {
        self.registry.get_mut::<T>()
    }

    pub fn scene_manager(&self) -> Option<&dyn SceneManager> {
        self.scene_manager.as_deref()
    }

    /// Imports `path` and keeps the result in the resource store under the path.
    pub fn import_resource(&self, path: impl AsRef<Path>) -> Result<Arc<ImportedResource>> {
        let path = path.as_ref();
        let resource = self.registry.get::<Importer>()?.import(path)?;
        let store = self.registry.get::<Resources>()?.store()?;
        Ok(store.insert(&path.to_string_lossy(), resource))
    }

    /// Tears down in the reverse of start-up. Safe to call after a failed
    /// start-up and more than once.
    pub fn shut_down(&mut self) {
        if self.registry.live_count() == 0 && self.plugins.is_empty() {
            return;
        }
        tracing::info!("shutting down");

        if let Some(id) = self.primary_window.take() {
            if let Ok(windows) = self.registry.get_mut::<RenderWindowManager>() {
                windows.destroy(id);
            }
        }

        self.release_plugin_services();

        if let Ok(dyn_libs) = self.registry.get_mut::<DynLibManager>() {
            while let Some(plugin) = self.plugins.pop() {
                tracing::debug!(plugin = %plugin.name, role = ?plugin.role, "unloading plugin");
                plugin_loader::unload_plugin(dyn_libs, plugin.library);
            }
        } else {
            self.plugins.clear();
        }

        self.registry.stop_all();
        tracing::info!("engine stopped");
    }

    /// Drops every object built by plugin code, so no plugin code runs after its module is gone.
    fn release_plugin_services(&mut self) {
        self.scene_manager = None;
        if let Ok(renderers) = self.registry.get_mut::<RendererManager>() {
            renderers.clear_active();
        }
        if let Ok(input) = self.registry.get_mut::<Input>() {
            input.clear_handler();
        }
        if let Ok(importer) = self.registry.get_mut::<Importer>() {
            importer.release_plugin_importers();
        }
        if let Ok(render_systems) = self.registry.get_mut::<RenderSystemManager>() {
            render_systems.release();
        }
        // Renderer commands still queued hold their own reference; flush them.
        if let Ok(core) = self.registry.get::<CoreThread>() {
            if let Ok(flushed) = core.queue_return_command(|| ()) {
                let _ = flushed.wait();
            }
        }
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if self.registry.live_count() > 0 || !self.plugins.is_empty() {
            tracing::warn!("application dropped without shut_down");
            self.shut_down();
        }
    }
}
