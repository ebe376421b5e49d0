// crates/engine_shared/src/lib.rs
//! Binary contract between the engine host and its native plugin modules.

pub mod plugin_api;

pub use plugin_api::{
    LoadPluginFn, PluginContext, UnloadPluginFn, LOAD_PLUGIN_SYMBOL, MODULE_SUFFIX,
    UNLOAD_PLUGIN_SYMBOL,
};
