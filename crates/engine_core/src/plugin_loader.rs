// crates/engine_core/src/plugin_loader.rs
//
// Loads modules that follow the two-symbol plugin contract: an optional
// `loadPlugin` called right after mapping, an optional `unloadPlugin` called
// right before unmapping.

use engine_shared::plugin_api::{PluginContext, MODULE_SUFFIX};

use crate::dyn_lib::{DynLibId, DynLibManager};

/// Appends the platform module suffix unless `name` already ends with it.
pub fn resolve_module_name(name: &str) -> String {
    resolve_module_name_with(name, MODULE_SUFFIX)
}

pub fn resolve_module_name_with(name: &str, suffix: &str) -> String {
    if name.ends_with(suffix) {
        name.to_owned()
    } else {
        format!("{name}{suffix}")
    }
}

/// Loads `name` and runs its `loadPlugin` entry point if it has one.
///
/// A module that cannot be loaded yields `(None, None)`; the failure is
/// logged and no entry point runs. A loaded module without `loadPlugin`, or
/// whose `loadPlugin` returns null, yields a handle and no context.
pub fn load_plugin(
    dyn_libs: &mut DynLibManager,
    name: &str,
) -> (Option<DynLibId>, Option<PluginContext>) {
    let file_name = resolve_module_name(name);

    let id = match dyn_libs.load(&file_name) {
        Ok(id) => id,
        Err(err) => {
            tracing::error!(plugin = name, %err, "plugin could not be loaded");
            return (None, None);
        }
    };

    let Some(entry) = dyn_libs.load_entry(id) else {
        tracing::debug!(plugin = name, "no loadPlugin entry point");
        return (Some(id), None);
    };

    // SAFETY: the entry point comes from a module that stays loaded for the call.
    let context = PluginContext::from_raw(unsafe { entry() });
    tracing::info!(plugin = name, "plugin loaded");
    (Some(id), context)
}

/// Runs `unloadPlugin` if present, then releases the module.
pub fn unload_plugin(dyn_libs: &mut DynLibManager, id: DynLibId) {
    match dyn_libs.unload_entry(id) {
        // SAFETY: the module is still mapped until the `unload` below.
        Some(entry) => unsafe { entry() },
        None => tracing::debug!(?id, "no unloadPlugin entry point"),
    }

    if !dyn_libs.unload(id) {
        tracing::warn!(?id, "unloading a module that is not loaded");
    }
}
