// crates/engine_core/tests/lifecycle.rs
//
// Drives a whole Application through start-up, the frame loop and shutdown
// with plugins linked into the test binary. Factory tables are process-wide,
// so every test registers under its own names.

use std::ffi::c_void;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use engine_core::dyn_lib::{StaticModule, StaticModuleLoader};
use engine_core::importer::{register_importer, unregister_importer, ImportedResource, SpecificImporter};
use engine_core::renderer::{register_renderer, unregister_renderer, Renderer};
use engine_core::resources::Resources;
use engine_core::{Application, EngineError, StartUpDesc};

struct CountingRenderer {
    frames: &'static AtomicU64,
}

impl Renderer for CountingRenderer {
    fn name(&self) -> &str {
        "CountingRenderer"
    }

    fn render_all(&self, _frame: u64) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
}

fn desc_with_renderer(renderer: &str) -> StartUpDesc {
    StartUpDesc {
        renderer: renderer.to_owned(),
        scene_manager: None,
        worker_threads: Some(2),
        ..StartUpDesc::default()
    }
}

// ----------------------------------------------------------------------------
// Full run
// ----------------------------------------------------------------------------

static RUN_RENDERED: AtomicU64 = AtomicU64::new(0);

extern "C" fn run_renderer_load() -> *mut c_void {
    register_renderer("RunRenderer", || {
        Arc::new(CountingRenderer {
            frames: &RUN_RENDERED,
        })
    });
    std::ptr::null_mut()
}

extern "C" fn run_renderer_unload() {
    unregister_renderer("RunRenderer");
}

#[test]
fn runs_three_frames_and_shuts_down_cleanly() {
    let loader = StaticModuleLoader::new([StaticModule {
        name: "RunRenderer",
        load: Some(run_renderer_load),
        unload: Some(run_renderer_unload),
    }]);
    let mut app = Application::with_module_loader(loader);
    app.start_up(&desc_with_renderer("RunRenderer")).unwrap();

    assert!(app.subsystems().all_live());
    assert!(app.primary_window().is_some());
    assert_eq!(app.plugins().len(), 1);

    let calls = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&calls);
    app.set_main_loop_callback(move |ctx| {
        seen.fetch_add(1, Ordering::SeqCst);
        if ctx.frame == 2 {
            ctx.stop();
        }
    });
    app.run_main_loop().unwrap();

    let gate = app.frame_sync();
    assert_eq!(app.frames(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    // The loop waits for the last frame's core work before returning.
    assert_eq!(gate.signals(), 3);
    assert!(gate.is_open());
    assert_eq!(RUN_RENDERED.load(Ordering::SeqCst), 3);

    app.shut_down();
    assert_eq!(app.subsystems().live_count(), 0);
    assert!(app.plugins().is_empty());
    assert!(!app.subsystems().is_empty());
}

// ----------------------------------------------------------------------------
// Stopping from another thread
// ----------------------------------------------------------------------------

static REMOTE_RENDERED: AtomicU64 = AtomicU64::new(0);

extern "C" fn remote_renderer_load() -> *mut c_void {
    register_renderer("RemoteRenderer", || {
        Arc::new(CountingRenderer {
            frames: &REMOTE_RENDERED,
        })
    });
    std::ptr::null_mut()
}

#[test]
fn loop_stops_when_another_thread_asks() {
    let loader = StaticModuleLoader::new([StaticModule {
        name: "RemoteRenderer",
        load: Some(remote_renderer_load),
        unload: None,
    }]);
    let mut app = Application::with_module_loader(loader);
    app.start_up(&desc_with_renderer("RemoteRenderer")).unwrap();

    let calls = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&calls);
    app.set_main_loop_callback(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let stopper = app.stopper();
    let watched = Arc::clone(&calls);
    let remote = thread::spawn(move || {
        while watched.load(Ordering::SeqCst) < 5 {
            thread::sleep(Duration::from_millis(1));
        }
        stopper.stop();
        watched.load(Ordering::SeqCst)
    });

    app.run_main_loop().unwrap();
    let seen_at_stop = remote.join().unwrap();

    // The iteration in flight finishes; no further one starts.
    assert!(app.frames() >= 5);
    assert!(app.frames() <= seen_at_stop + 1);
    assert_eq!(app.frames(), calls.load(Ordering::SeqCst));
    assert_eq!(app.frame_sync().signals(), app.frames());

    app.shut_down();
    assert_eq!(app.subsystems().live_count(), 0);
}

// ----------------------------------------------------------------------------
// Start-up failure
// ----------------------------------------------------------------------------

#[test]
fn missing_renderer_fails_start_up() {
    let mut app = Application::with_module_loader(StaticModuleLoader::new(Vec::new()));
    let err = app
        .start_up(&desc_with_renderer("NoSuchRenderer"))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::StartupFailure {
            subsystem: "RendererManager",
            ..
        }
    ));

    // Everything that did come up goes down again.
    assert!(app.subsystems().live_count() > 0);
    app.shut_down();
    assert_eq!(app.subsystems().live_count(), 0);
}

#[test]
fn start_up_twice_is_rejected() {
    static TWICE_RENDERED: AtomicU64 = AtomicU64::new(0);

    extern "C" fn load() -> *mut c_void {
        register_renderer("TwiceRenderer", || {
            Arc::new(CountingRenderer {
                frames: &TWICE_RENDERED,
            })
        });
        std::ptr::null_mut()
    }

    let loader = StaticModuleLoader::new([StaticModule {
        name: "TwiceRenderer",
        load: Some(load),
        unload: None,
    }]);
    let mut app = Application::with_module_loader(loader);
    let desc = desc_with_renderer("TwiceRenderer");
    app.start_up(&desc).unwrap();
    assert!(matches!(
        app.start_up(&desc),
        Err(EngineError::StartupFailure { .. })
    ));
    app.shut_down();
}

// ----------------------------------------------------------------------------
// Plugin entry points
// ----------------------------------------------------------------------------

static EVENTS: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());
static MARKER: u8 = 0;

fn record(event: &'static str) {
    EVENTS.lock().unwrap().push(event);
}

extern "C" fn order_renderer_load() -> *mut c_void {
    record("load renderer");
    register_renderer("OrderRenderer", || {
        Arc::new(CountingRenderer {
            frames: &REMOTE_RENDERED,
        })
    });
    std::ptr::null_mut()
}

extern "C" fn order_renderer_unload() {
    record("unload renderer");
    unregister_renderer("OrderRenderer");
}

extern "C" fn first_load() -> *mut c_void {
    record("load first");
    std::ptr::addr_of!(MARKER) as *mut c_void
}

extern "C" fn first_unload() {
    record("unload first");
}

extern "C" fn second_load() -> *mut c_void {
    record("load second");
    std::ptr::null_mut()
}

extern "C" fn second_unload() {
    record("unload second");
}

#[test]
fn plugins_unload_in_reverse_load_order() {
    let loader = StaticModuleLoader::new([
        StaticModule {
            name: "OrderRenderer",
            load: Some(order_renderer_load),
            unload: Some(order_renderer_unload),
        },
        StaticModule {
            name: "FirstPlugin",
            load: Some(first_load),
            unload: Some(first_unload),
        },
        StaticModule {
            name: "SecondPlugin",
            load: Some(second_load),
            unload: Some(second_unload),
        },
    ]);
    let mut app = Application::with_module_loader(loader);
    app.start_up(&desc_with_renderer("OrderRenderer")).unwrap();

    let context = app.load_plugin("FirstPlugin").unwrap();
    assert_eq!(
        context.map(|context| context.as_ptr() as *const u8),
        Some(std::ptr::addr_of!(MARKER))
    );
    assert_eq!(app.load_plugin("SecondPlugin").unwrap(), None);
    assert!(app.load_plugin("MissingPlugin").is_err());

    app.shut_down();

    assert_eq!(
        *EVENTS.lock().unwrap(),
        [
            "load renderer",
            "load first",
            "load second",
            "unload second",
            "unload first",
            "unload renderer",
        ]
    );
}

#[test]
fn unload_plugin_runs_its_unload_entry_once() {
    static UNLOADS: AtomicU64 = AtomicU64::new(0);

    extern "C" fn renderer_load() -> *mut c_void {
        register_renderer("SoloRenderer", || {
            Arc::new(CountingRenderer {
                frames: &REMOTE_RENDERED,
            })
        });
        std::ptr::null_mut()
    }

    extern "C" fn solo_unload() {
        UNLOADS.fetch_add(1, Ordering::SeqCst);
    }

    let loader = StaticModuleLoader::new([
        StaticModule {
            name: "SoloRenderer",
            load: Some(renderer_load),
            unload: None,
        },
        StaticModule {
            name: "SoloPlugin",
            load: None,
            unload: Some(solo_unload),
        },
    ]);
    let mut app = Application::with_module_loader(loader);
    app.start_up(&desc_with_renderer("SoloRenderer")).unwrap();

    assert_eq!(app.load_plugin("SoloPlugin").unwrap(), None);
    assert!(app.unload_plugin("SoloPlugin").unwrap());
    assert!(!app.unload_plugin("SoloPlugin").unwrap());

    app.shut_down();
    assert_eq!(UNLOADS.load(Ordering::SeqCst), 1);
}

// ----------------------------------------------------------------------------
// Importing through a plugin
// ----------------------------------------------------------------------------

struct CsvImporter;

impl SpecificImporter for CsvImporter {
    fn name(&self) -> &str {
        "CsvImporter"
    }

    fn extensions(&self) -> &[&str] {
        &["csv"]
    }

    fn import(&self, path: &Path, bytes: &[u8]) -> engine_core::Result<ImportedResource> {
        let rows = bytes.split(|&b| b == b'\n').filter(|row| !row.is_empty()).count();
        let mut resource = ImportedResource {
            name: path.display().to_string(),
            kind: "Table".into(),
            data: bytes.to_vec(),
            ..ImportedResource::default()
        };
        resource.properties.insert("rows".into(), rows.to_string());
        Ok(resource)
    }
}

static IMPORT_RENDERED: AtomicU64 = AtomicU64::new(0);

extern "C" fn import_renderer_load() -> *mut c_void {
    register_renderer("ImportRenderer", || {
        Arc::new(CountingRenderer {
            frames: &IMPORT_RENDERED,
        })
    });
    std::ptr::null_mut()
}

extern "C" fn csv_load() -> *mut c_void {
    register_importer("CsvPlugin", || Box::new(CsvImporter));
    std::ptr::null_mut()
}

extern "C" fn csv_unload() {
    unregister_importer("CsvPlugin");
}

#[test]
fn imported_resources_outlive_their_importer_plugin() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scores.csv");
    std::fs::write(&path, "a,1\nb,2\n").unwrap();

    let loader = StaticModuleLoader::new([
        StaticModule {
            name: "ImportRenderer",
            load: Some(import_renderer_load),
            unload: None,
        },
        StaticModule {
            name: "CsvPlugin",
            load: Some(csv_load),
            unload: Some(csv_unload),
        },
    ]);
    let mut app = Application::with_module_loader(loader);
    let desc = StartUpDesc {
        importers: vec!["CsvPlugin".into()],
        ..desc_with_renderer("ImportRenderer")
    };
    app.start_up(&desc).unwrap();

    let imported = app.import_resource(&path).unwrap();
    assert_eq!(imported.kind, "Table");
    assert_eq!(imported.properties["rows"], "2");

    let store = app.subsystem::<Resources>().unwrap().store().unwrap();
    let stored = store
        .require::<ImportedResource>(&path.to_string_lossy())
        .unwrap();
    assert!(Arc::ptr_eq(&imported, &stored));

    assert!(matches!(
        app.import_resource(dir.path().join("scores.bin")),
        Err(EngineError::Import { .. })
    ));

    app.shut_down();
    assert_eq!(imported.data, b"a,1\nb,2\n");
}
