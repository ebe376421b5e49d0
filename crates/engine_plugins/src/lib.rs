// crates/engine_plugins/src/lib.rs
//
// Stock plugins. Each module exposes the `load`/`unload` pair a native
// module would export as `loadPlugin`/`unloadPlugin`.

pub mod basic_scene;
pub mod null_input;
pub mod null_renderer;
pub mod text_importer;

mod shims;

use engine_core::dyn_lib::StaticModule;

/// Every stock plugin, ready for a `StaticModuleLoader`.
pub fn static_modules() -> Vec<StaticModule> {
    vec![
        StaticModule {
            name: null_renderer::NAME,
            load: Some(null_renderer::load),
            unload: Some(null_renderer::unload),
        },
        StaticModule {
            name: basic_scene::NAME,
            load: Some(basic_scene::load),
            unload: Some(basic_scene::unload),
        },
        StaticModule {
            name: null_input::NAME,
            load: Some(null_input::load),
            unload: Some(null_input::unload),
        },
        StaticModule {
            name: text_importer::NAME,
            load: Some(text_importer::load),
            unload: Some(text_importer::unload),
        },
    ]
}
