// crates/engine_core/src/deferred_call.rs

use std::any::Any;

use crossbeam_channel::{Receiver, Sender};

use crate::error::{EngineError, Result};
use crate::subsystem::{LiveSubsystems, Subsystem};

type DeferredCall = Box<dyn FnOnce() + Send + 'static>;

/// Queues callbacks from any thread for the next simulation-thread update.
#[derive(Clone)]
pub struct DeferredCallQueue {
    sender: Sender<DeferredCall>,
}

impl DeferredCallQueue {
    pub fn queue(&self, call: impl FnOnce() + Send + 'static) -> Result<()> {
        self.sender
            .send(Box::new(call))
            .map_err(|_| EngineError::SubsystemNotLive("DeferredCallManager"))
    }
}

pub struct DeferredCallManager {
    sender: Sender<DeferredCall>,
    receiver: Receiver<DeferredCall>,
}

impl DeferredCallManager {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }

    pub fn queue(&self) -> DeferredCallQueue {
        DeferredCallQueue {
            sender: self.sender.clone(),
        }
    }

    /// Runs every call queued before this point. Calls queued by a running
    /// call wait for the next update. Returns how many ran.
    pub fn update(&mut self) -> usize {
        let ready = self.receiver.len();
        let mut ran = 0;
        for call in self.receiver.try_iter().take(ready) {
            call();
            ran += 1;
        }
        ran
    }
}

impl Default for DeferredCallManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Subsystem for DeferredCallManager {
    fn name(&self) -> &'static str {
        "DeferredCallManager"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) {
        let dropped = self.receiver.try_iter().count();
        if dropped > 0 {
            tracing::debug!(dropped, "discarding deferred calls at shutdown");
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
