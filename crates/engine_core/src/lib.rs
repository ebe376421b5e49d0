// crates/engine_core/src/lib.rs

// Lifecycle
pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod subsystem;

// Threads and the frame loop
pub mod core_thread;
pub mod engine_loop;
pub mod frame_sync;
pub mod task_scheduler;
pub mod thread_pool;

// Plugins
pub mod dyn_lib;
pub mod factory;
pub mod plugin_loader;

// Built-in subsystems
pub mod core_object;
pub mod deferred_call;
pub mod gpu_program;
pub mod importer;
pub mod input;
pub mod platform;
pub mod profiler;
pub mod render_system;
pub mod render_window;
pub mod renderer;
pub mod resource_managers;
pub mod resources;
pub mod scene;
pub mod time;

// Re-export the pieces embedders need most often
pub use app::{Application, LoadedPlugin, PluginRole};
pub use config::StartUpDesc;
pub use engine_loop::{LoopContext, LoopStopper};
pub use error::{EngineError, Result};
pub use frame_sync::FrameSyncGate;
pub use subsystem::{LiveSubsystems, Subsystem, SubsystemRegistry};
