// crates/engine_core/src/frame_sync.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::task_scheduler::{WorkerDonation, WorkerSlots};

/// Hand-off between the simulation thread and the core thread.
///
/// Open means the core thread finished the previous frame. The simulation
/// thread closes the gate before queueing the next frame's tail, and the core
/// thread opens it again by running the `signal` command. At most one frame
/// of core work is therefore in flight.
pub struct FrameSyncGate {
    finished: Mutex<bool>,
    condition: Condvar,
    waits: AtomicU64,
    signals: AtomicU64,
}

impl FrameSyncGate {
    pub fn new() -> Self {
        Self {
            finished: Mutex::new(true),
            condition: Condvar::new(),
            waits: AtomicU64::new(0),
            signals: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.finished.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until the gate is open, then closes it.
    ///
    /// While blocked, one worker slot is lent to `slots` so the pool keeps its
    /// full width with the simulation thread parked.
    pub fn wait_and_close<S: WorkerSlots + ?Sized>(&self, slots: &S) {
        let mut finished = self.wait(slots);
        *finished = false;
    }

    /// Blocks until the gate is open without closing it.
    pub fn wait_open<S: WorkerSlots + ?Sized>(&self, slots: &S) {
        drop(self.wait(slots));
    }

    fn wait<S: WorkerSlots + ?Sized>(&self, slots: &S) -> MutexGuard<'_, bool> {
        self.waits.fetch_add(1, Ordering::Relaxed);
        let finished = self.lock();
        if *finished {
            return finished;
        }

        let _donation = WorkerDonation::new(slots);
        self.condition
            .wait_while(finished, |finished| !*finished)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the gate. Runs on the core thread once per frame.
    pub fn signal(&self) {
        let mut finished = self.lock();
        debug_assert!(!*finished, "frame sync gate signalled while already open");
        *finished = true;
        self.signals.fetch_add(1, Ordering::Relaxed);
        self.condition.notify_one();
    }

    /// Opens the gate for a frame that was abandoned before its signal was
    /// queued. Not counted as a signal.
    pub fn reopen(&self) {
        let mut finished = self.lock();
        *finished = true;
        self.condition.notify_one();
    }

    pub fn is_open(&self) -> bool {
        *self.lock()
    }

    pub fn waits(&self) -> u64 {
        self.waits.load(Ordering::Relaxed)
    }

    pub fn signals(&self) -> u64 {
        self.signals.load(Ordering::Relaxed)
    }
}

impl Default for FrameSyncGate {
    fn default() -> Self {
        Self::new()
    }
}
