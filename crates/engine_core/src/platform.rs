// crates/engine_core/src/platform.rs

use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::subsystem::{LiveSubsystems, Subsystem};

/// Number of hardware threads, including the calling one.
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[derive(Default)]
struct PlatformState {
    quit_requested: AtomicBool,
    sim_updates: AtomicU64,
    core_updates: AtomicU64,
}

/// Cloneable access to the platform layer from any thread.
#[derive(Clone, Default)]
pub struct PlatformHandle {
    state: Arc<PlatformState>,
}

impl PlatformHandle {
    /// Device-side platform work, runs once per frame on the core thread.
    pub fn core_update(&self) {
        self.state.core_updates.fetch_add(1, Ordering::Relaxed);
    }

    /// Asks the main loop to stop at its next iteration.
    pub fn request_quit(&self) {
        self.state.quit_requested.store(true, Ordering::Relaxed);
    }

    pub fn core_updates(&self) -> u64 {
        self.state.core_updates.load(Ordering::Relaxed)
    }
}

/// Headless platform layer. OS message pumping lives behind this boundary.
#[derive(Default)]
pub struct Platform {
    handle: PlatformHandle,
}

impl Platform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> PlatformHandle {
        self.handle.clone()
    }

    /// Simulation-side update. Returns `true` once for every quit request.
    pub fn update(&mut self) -> bool {
        self.handle.state.sim_updates.fetch_add(1, Ordering::Relaxed);
        self.handle.state.quit_requested.swap(false, Ordering::Relaxed)
    }

    pub fn sim_updates(&self) -> u64 {
        self.handle.state.sim_updates.load(Ordering::Relaxed)
    }
}

impl Subsystem for Platform {
    fn name(&self) -> &'static str {
        "Platform"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        tracing::info!(hardware_threads = hardware_concurrency(), "platform up");
        Ok(())
    }

    fn stop(&mut self) {
        self.handle.state.quit_requested.store(false, Ordering::Relaxed);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_request_is_reported_once() {
        let mut platform = Platform::new();
        let handle = platform.handle();

        assert!(!platform.update());
        handle.request_quit();
        assert!(platform.update());
        assert!(!platform.update());
        assert_eq!(platform.sim_updates(), 3);
    }

    #[test]
    fn core_updates_are_counted_through_handles() {
        let platform = Platform::new();
        let handle = platform.handle();
        std::thread::spawn(move || handle.core_update()).join().unwrap();
        assert_eq!(platform.handle().core_updates(), 1);
    }
}
