// crates/engine_core/src/profiler.rs

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::subsystem::{LiveSubsystems, Subsystem};

/// Frame timings accumulated for one named thread ("Sim", "Core", ...).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ThreadFrameStats {
    pub frames: u64,
    pub last: Duration,
    pub longest: Duration,
    pub total: Duration,
}

impl ThreadFrameStats {
    pub fn average(&self) -> Duration {
        if self.frames == 0 {
            return Duration::ZERO;
        }
        self.total.div_f64(self.frames as f64)
    }

    fn record(&mut self, elapsed: Duration) {
        self.frames += 1;
        self.last = elapsed;
        self.longest = self.longest.max(elapsed);
        self.total += elapsed;
    }
}

#[derive(Default)]
struct ProfilerState {
    open: HashMap<ThreadId, (&'static str, Instant)>,
    stats: HashMap<&'static str, ThreadFrameStats>,
}

/// Shared by the simulation thread and the commands it queues for the core thread.
#[derive(Clone)]
pub struct ProfilerHandle {
    state: Arc<Mutex<ProfilerState>>,
    report_interval: u64,
}

impl ProfilerHandle {
    fn lock(&self) -> MutexGuard<'_, ProfilerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a frame sample for the calling thread.
    pub fn begin_thread(&self, name: &'static str) {
        let previous = self
            .lock()
            .open
            .insert(thread::current().id(), (name, Instant::now()));
        debug_assert!(previous.is_none(), "begin_thread({name}) while a sample is open");
    }

    /// Closes the calling thread's frame sample.
    pub fn end_thread(&self) {
        let mut state = self.lock();
        match state.open.remove(&thread::current().id()) {
            Some((name, started)) => state.stats.entry(name).or_default().record(started.elapsed()),
            None => tracing::warn!("end_thread without a matching begin_thread"),
        }
    }

    /// Simulation-side frame report.
    pub fn update(&self) {
        self.report("Sim");
    }

    /// Core-side frame report.
    pub fn update_core(&self) {
        self.report("Core");
    }

    pub fn stats(&self, name: &str) -> Option<ThreadFrameStats> {
        self.lock().stats.get(name).cloned()
    }

    fn report(&self, name: &'static str) {
        let Some(stats) = self.stats(name) else {
            return;
        };
        if self.report_interval > 0 && stats.frames % self.report_interval == 0 {
            tracing::trace!(
                thread = name,
                frames = stats.frames,
                average_us = stats.average().as_micros() as u64,
                longest_us = stats.longest.as_micros() as u64,
                "frame timings"
            );
        }
    }
}

pub struct Profiler {
    handle: ProfilerHandle,
}

impl Profiler {
    pub fn new() -> Self {
        Self::with_report_interval(120)
    }

    pub fn with_report_interval(frames: u64) -> Self {
        Self {
            handle: ProfilerHandle {
                state: Arc::default(),
                report_interval: frames,
            },
        }
    }

    pub fn handle(&self) -> ProfilerHandle {
        self.handle.clone()
    }
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Subsystem for Profiler {
    fn name(&self) -> &'static str {
        "Profiler"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        *self.handle.lock() = ProfilerState::default();
        Ok(())
    }

    fn stop(&mut self) {
        let state = self.handle.lock();
        for (name, stats) in &state.stats {
            tracing::info!(
                thread = *name,
                frames = stats.frames,
                average_us = stats.average().as_micros() as u64,
                "profiler summary"
            );
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
