// crates/engine_core/src/core_thread.rs

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{Receiver, Sender};

use crate::error::{EngineError, Result};
use crate::subsystem::{LiveSubsystems, Subsystem};

pub type CoreCommand = Box<dyn FnOnce() + Send + 'static>;

enum CoreMessage {
    Command(CoreCommand),
    Batch(Vec<CoreCommand>),
    Shutdown,
}

/// Result of a command queued with `queue_return_command`.
pub struct AsyncOp<R> {
    receiver: Receiver<R>,
}

impl<R> AsyncOp<R> {
    /// Blocks until the core thread has run the command.
    /// Fails if the command panicked or the core thread went away first.
    pub fn wait(self) -> Result<R> {
        self.receiver
            .recv()
            .map_err(|_| EngineError::CoreThreadTerminated)
    }

    pub fn try_get(&self) -> Option<R> {
        self.receiver.try_recv().ok()
    }
}

/// Cloneable sender side of the core command queue.
#[derive(Clone)]
pub struct CoreThreadHandle {
    sender: Sender<CoreMessage>,
    thread_id: ThreadId,
    executed: Arc<AtomicU64>,
}

impl CoreThreadHandle {
    pub fn queue_command(&self, command: impl FnOnce() + Send + 'static) -> Result<()> {
        self.send(CoreMessage::Command(Box::new(command)))
    }

    pub fn queue_return_command<R: Send + 'static>(
        &self,
        command: impl FnOnce() -> R + Send + 'static,
    ) -> Result<AsyncOp<R>> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.queue_command(move || {
            let _ = tx.send(command());
        })?;
        Ok(AsyncOp { receiver: rx })
    }

    pub fn is_core_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn executed_commands(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Asks the core thread to exit once it reaches this point of the queue.
    /// Later commands are never run.
    pub(crate) fn shutdown(&self) -> Result<()> {
        self.send(CoreMessage::Shutdown)
    }

    fn send(&self, message: CoreMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| EngineError::CoreThreadTerminated)
    }
}

/// Commands recorded on the simulation thread and handed over together by
/// `CoreThread::submit_accessors`.
#[derive(Clone, Default)]
pub struct AccessorBuffer {
    commands: Arc<Mutex<Vec<CoreCommand>>>,
}

impl AccessorBuffer {
    pub fn record(&self, command: impl FnOnce() + Send + 'static) {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(command));
    }

    pub fn len(&self) -> usize {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take(&self) -> Vec<CoreCommand> {
        std::mem::take(&mut *self.commands.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

fn execute(command: CoreCommand, executed: &AtomicU64) {
    if panic::catch_unwind(AssertUnwindSafe(command)).is_err() {
        tracing::error!("core thread command panicked");
    }
    executed.fetch_add(1, Ordering::Relaxed);
}

/// Owns the "Core" thread that executes device-side commands in submission order.
#[derive(Default)]
pub struct CoreThread {
    handle: Option<CoreThreadHandle>,
    worker: Option<JoinHandle<()>>,
    accessors: AccessorBuffer,
    frame: u64,
}

impl CoreThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> Result<CoreThreadHandle> {
        self.handle.clone().ok_or(EngineError::SubsystemNotLive("CoreThread"))
    }

    pub fn queue_command(&self, command: impl FnOnce() + Send + 'static) -> Result<()> {
        self.handle()?.queue_command(command)
    }

    pub fn queue_return_command<R: Send + 'static>(
        &self,
        command: impl FnOnce() -> R + Send + 'static,
    ) -> Result<AsyncOp<R>> {
        self.handle()?.queue_return_command(command)
    }

    pub fn accessor(&self) -> AccessorBuffer {
        self.accessors.clone()
    }

    /// Sends everything recorded into the accessor buffer as one batch.
    pub fn submit_accessors(&self) -> Result<()> {
        let batch = self.accessors.take();
        if batch.is_empty() {
            return Ok(());
        }
        tracing::trace!(commands = batch.len(), "submitting accessor batch");
        self.handle()?.send(CoreMessage::Batch(batch))
    }

    /// Once per simulation frame.
    pub fn update(&mut self) -> Result<()> {
        match &self.worker {
            Some(worker) if !worker.is_finished() => {
                self.frame += 1;
                Ok(())
            }
            _ => Err(EngineError::CoreThreadTerminated),
        }
    }

    pub fn is_core_thread(&self) -> bool {
        self.handle.as_ref().is_some_and(CoreThreadHandle::is_core_thread)
    }

    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    pub fn executed_commands(&self) -> u64 {
        self.handle.as_ref().map_or(0, CoreThreadHandle::executed_commands)
    }
}

impl Subsystem for CoreThread {
    fn name(&self) -> &'static str {
        "CoreThread"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        let (sender, receiver) = crossbeam_channel::unbounded::<CoreMessage>();
        let executed = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&executed);

        let worker = thread::Builder::new()
            .name("Core".into())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    match message {
                        CoreMessage::Command(command) => execute(command, &counter),
                        CoreMessage::Batch(commands) => {
                            for command in commands {
                                execute(command, &counter);
                            }
                        }
                        CoreMessage::Shutdown => break,
                    }
                }
            })
            .map_err(|err| EngineError::startup("CoreThread", err.to_string()))?;

        self.handle = Some(CoreThreadHandle {
            sender,
            thread_id: worker.thread().id(),
            executed,
        });
        self.worker = Some(worker);
        self.frame = 0;
        tracing::info!("core thread started");
        Ok(())
    }

    /// Runs whatever is still queued, then joins the thread.
    fn stop(&mut self) {
        let pending = self.accessors.take();
        if let Some(handle) = self.handle.take() {
            if !pending.is_empty() {
                let _ = handle.send(CoreMessage::Batch(pending));
            }
            let _ = handle.shutdown();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("core thread terminated abnormally");
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
