// crates/engine_plugins/tests/stock.rs

use engine_core::dyn_lib::StaticModuleLoader;
use engine_core::input::Input;
use engine_core::{Application, PluginRole, StartUpDesc};
use engine_plugins::{basic_scene, null_input, null_renderer, static_modules, text_importer};

#[test]
fn engine_runs_on_the_stock_plugins() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "first\nsecond\n").unwrap();

    let desc = StartUpDesc {
        input: Some(null_input::NAME.into()),
        importers: vec![text_importer::NAME.into()],
        worker_threads: Some(2),
        ..StartUpDesc::default()
    };
    let mut app = Application::with_module_loader(StaticModuleLoader::new(static_modules()));
    app.start_up(&desc).unwrap();

    let roles: Vec<_> = app.plugins().iter().map(|plugin| plugin.role()).collect();
    assert_eq!(
        roles,
        [
            PluginRole::Renderer,
            PluginRole::SceneManager,
            PluginRole::Importer,
            PluginRole::Input,
        ]
    );
    assert_eq!(app.scene_manager().map(|scene| scene.name()), Some(basic_scene::NAME));
    assert!(app.subsystem::<Input>().unwrap().has_handler());

    let rendered_before = null_renderer::frames_rendered();
    app.set_main_loop_callback(|ctx| {
        if ctx.frame == 3 {
            ctx.stop();
        }
    });
    app.run_main_loop().unwrap();
    assert_eq!(app.frames(), 4);
    assert!(null_renderer::frames_rendered() >= rendered_before + 4);

    let imported = app.import_resource(&notes).unwrap();
    assert_eq!(imported.kind, "Text");
    assert_eq!(imported.properties["lines"], "2");

    app.shut_down();
    assert!(app.plugins().is_empty());
    assert_eq!(app.subsystems().live_count(), 0);
}
