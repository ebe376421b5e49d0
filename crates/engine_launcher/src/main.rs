//! Engine launcher
//!
//! Starts the engine from a start-up description and runs the frame loop.
//!
//! Usage:
//!   engine_launcher [--config <engine.toml>] [--frames <n>] [--log-level <level>]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use engine_core::dyn_lib::{NativeModuleLoader, StaticModuleLoader};
use engine_core::{logging, Application, StartUpDesc};

#[derive(Parser)]
#[command(name = "engine_launcher")]
#[command(about = "Run the engine headless with the stock plugins")]
struct Args {
    /// Start-up description (TOML). Built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stop after this many frames (at least 1). Runs until the platform asks to quit otherwise.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    frames: Option<u64>,

    /// error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = logging::parse_level(&args.log_level)
        .with_context(|| format!("unknown log level '{}'", args.log_level))?;
    logging::init(level);

    let desc = match &args.config {
        Some(path) => StartUpDesc::load(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => StartUpDesc::default(),
    };

    // Stock plugins are linked in; anything else comes from disk.
    let disk = match &desc.module_dir {
        Some(dir) => NativeModuleLoader::in_dir(dir),
        None => NativeModuleLoader::new(),
    };
    let loader = StaticModuleLoader::new(engine_plugins::static_modules()).with_fallback(disk);
    let mut app = Application::with_module_loader(loader);

    if let Err(err) = app.start_up(&desc) {
        app.shut_down();
        return Err(err).context("engine start-up failed");
    }

    if let Some(limit) = args.frames {
        app.set_main_loop_callback(move |ctx| {
            if ctx.frame + 1 >= limit {
                ctx.stop();
            }
        });
    }

    let result = app.run_main_loop();
    tracing::info!(frames = app.frames(), "exiting");
    app.shut_down();

    result.context("main loop failed")
}
