// crates/engine_core/src/engine_loop.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core_thread::CoreThread;
use crate::deferred_call::DeferredCallManager;
use crate::error::Result;
use crate::frame_sync::FrameSyncGate;
use crate::input::Input;
use crate::platform::Platform;
use crate::profiler::{Profiler, ProfilerHandle};
use crate::render_system::RenderSystemManager;
use crate::render_window::RenderWindowManager;
use crate::renderer::RendererManager;
use crate::scene::SceneManager;
use crate::subsystem::SubsystemRegistry;
use crate::task_scheduler::TaskScheduler;
use crate::time::Time;

/// Cloneable stop switch for the main loop, usable from any thread.
#[derive(Clone, Default)]
pub struct LoopStopper(Arc<AtomicBool>);

impl LoopStopper {
    fn arm(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// The loop finishes its current iteration and exits.
    pub fn stop(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What the main-loop callback sees each iteration.
pub struct LoopContext<'a> {
    pub subsystems: &'a SubsystemRegistry,
    pub stopper: &'a LoopStopper,
    /// Number of frames completed before this one.
    pub frame: u64,
}

impl LoopContext<'_> {
    pub fn stop(&self) {
        self.stopper.stop();
    }
}

pub type MainLoopCallback = Box<dyn FnMut(&LoopContext<'_>) + Send>;

/// The simulation side of the dual-thread frame loop.
pub struct EngineLoop {
    stopper: LoopStopper,
    gate: Arc<FrameSyncGate>,
    callback: Option<MainLoopCallback>,
    frames: u64,
}

impl EngineLoop {
    pub fn new() -> Self {
        Self {
            stopper: LoopStopper::default(),
            gate: Arc::new(FrameSyncGate::new()),
            callback: None,
            frames: 0,
        }
    }

    pub fn stopper(&self) -> LoopStopper {
        self.stopper.clone()
    }

    pub fn gate(&self) -> Arc<FrameSyncGate> {
        Arc::clone(&self.gate)
    }

    pub fn set_callback(&mut self, callback: Option<MainLoopCallback>) {
        self.callback = callback;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Runs frames until stopped, then waits for the last frame's core work.
    pub fn run(
        &mut self,
        registry: &mut SubsystemRegistry,
        scene: &mut Option<Box<dyn SceneManager>>,
    ) -> Result<()> {
        self.stopper.arm();
        tracing::info!("main loop started");

        while self.stopper.is_running() {
            self.run_frame(registry, scene)?;
        }

        self.gate.wait_open(registry.get::<TaskScheduler>()?);
        tracing::info!(frames = self.frames, "main loop stopped");
        Ok(())
    }

    /// One simulation iteration. Queues this frame's core work and blocks
    /// only while the core thread is still busy with the previous frame.
    ///
    /// On error the frame is abandoned: its profiler sample is closed and the
    /// gate is reopened if this frame closed it without queueing the signal.
    pub fn run_frame(
        &mut self,
        registry: &mut SubsystemRegistry,
        scene: &mut Option<Box<dyn SceneManager>>,
    ) -> Result<()> {
        let profiler = registry.get::<Profiler>()?.handle();
        profiler.begin_thread("Sim");

        let mut gate_closed = false;
        let result = self.simulate_frame(registry, scene, &profiler, &mut gate_closed);
        if let Err(err) = &result {
            tracing::error!(frame = self.frames, %err, "frame abandoned");
            if gate_closed {
                self.gate.reopen();
            }
            profiler.end_thread();
        }
        result
    }

    fn simulate_frame(
        &mut self,
        registry: &mut SubsystemRegistry,
        scene: &mut Option<Box<dyn SceneManager>>,
        profiler: &ProfilerHandle,
        gate_closed: &mut bool,
    ) -> Result<()> {
        registry.get_mut::<CoreThread>()?.update()?;
        if registry.get_mut::<Platform>()?.update() {
            tracing::info!("quit requested by the platform");
            self.stopper.stop();
        }
        registry.get_mut::<DeferredCallManager>()?.update();
        registry.get_mut::<RenderWindowManager>()?.update();
        registry.get_mut::<Input>()?.update();

        if let Some(scene) = scene.as_mut() {
            scene.update(registry.get::<Time>()?.frame_delta());
        }

        let core = registry.get::<CoreThread>()?.handle()?;
        {
            let profiler = profiler.clone();
            core.queue_command(move || profiler.begin_thread("Core"))?;
        }
        let render_system = registry.get::<RenderSystemManager>()?.active();
        if let Some(system) = render_system.clone() {
            core.queue_command(move || system.update_queries())?;
        }

        if let Some(callback) = &mut self.callback {
            callback(&LoopContext {
                subsystems: registry,
                stopper: &self.stopper,
                frame: self.frames,
            });
        }

        if let Some(renderer) = registry.get::<RendererManager>()?.active() {
            let frame = self.frames;
            core.queue_command(move || renderer.render_all(frame))?;
        }

        self.gate.wait_and_close(registry.get::<TaskScheduler>()?);
        *gate_closed = true;

        let platform = registry.get::<Platform>()?.handle();
        core.queue_command(move || {
            platform.core_update();
            if let Some(system) = render_system {
                system.device_update();
            }
        })?;
        registry.get::<CoreThread>()?.submit_accessors()?;
        {
            let profiler = profiler.clone();
            core.queue_command(move || {
                profiler.end_thread();
                profiler.update_core();
            })?;
        }
        let gate = Arc::clone(&self.gate);
        core.queue_command(move || gate.signal())?;
        *gate_closed = false;

        registry.get_mut::<Time>()?.update();
        profiler.end_thread();
        profiler.update();

        self.frames += 1;
        tracing::trace!(frame = self.frames, "frame queued");
        Ok(())
    }
}

impl Default for EngineLoop {
    fn default() -> Self {
        Self::new()
    }
}
