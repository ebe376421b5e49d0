// crates/engine_core/src/thread_pool.rs

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::error::{EngineError, Result};
use crate::subsystem::{LiveSubsystems, Subsystem};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolState {
    sender: Option<Sender<Job>>,
    receiver: Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
    /// Threads that are neither running a job nor reserved for one.
    idle: usize,
}

struct PoolShared {
    state: Mutex<PoolState>,
    capacity: usize,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable way to hand jobs to the worker threads.
#[derive(Clone)]
pub struct ThreadPoolHandle {
    shared: Arc<PoolShared>,
}

impl ThreadPoolHandle {
    /// Runs `job` on an idle worker, spawning a new one if none is free.
    /// `capacity` is a soft limit: going past it only logs a warning.
    pub fn run(&self, name: &str, job: impl FnOnce() + Send + 'static) -> Result<()> {
        let mut state = self.shared.lock();
        let sender = state.sender.clone().ok_or(EngineError::ThreadPoolStopped)?;

        if state.idle > 0 {
            state.idle -= 1;
        } else {
            if state.workers.len() >= self.shared.capacity {
                tracing::warn!(
                    job = name,
                    capacity = self.shared.capacity,
                    "thread pool over capacity, spawning an extra worker"
                );
            }
            spawn_worker(&self.shared, &mut state, false)?;
        }
        drop(state);

        sender
            .send(Box::new(job))
            .map_err(|_| EngineError::ThreadPoolStopped)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn thread_count(&self) -> usize {
        self.shared.lock().workers.len()
    }

    pub fn idle_count(&self) -> usize {
        self.shared.lock().idle
    }

    fn shutdown(&self) {
        let workers = {
            let mut state = self.shared.lock();
            state.sender = None;
            state.idle = 0;
            std::mem::take(&mut state.workers)
        };

        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("worker thread terminated abnormally");
            }
        }
    }
}

fn spawn_worker(shared: &Arc<PoolShared>, state: &mut PoolState, idle: bool) -> Result<()> {
    let index = state.workers.len();
    let receiver = state.receiver.clone();
    let owner = Arc::clone(shared);

    let worker = thread::Builder::new()
        .name(format!("Worker {index}"))
        .spawn(move || {
            while let Ok(job) = receiver.recv() {
                if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("job panicked on a worker thread");
                }
                let mut state = owner.lock();
                if state.sender.is_some() {
                    state.idle += 1;
                }
            }
        })?;

    state.workers.push(worker);
    if idle {
        state.idle += 1;
    }
    Ok(())
}

/// Background worker threads. Starts `capacity` idle workers.
pub struct ThreadPool {
    capacity: usize,
    handle: Option<ThreadPoolHandle>,
}

impl ThreadPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            handle: None,
        }
    }

    pub fn handle(&self) -> Result<ThreadPoolHandle> {
        self.handle.clone().ok_or(EngineError::ThreadPoolStopped)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Subsystem for ThreadPool {
    fn name(&self) -> &'static str {
        "ThreadPool"
    }

    fn start(&mut self, _live: &LiveSubsystems<'_>) -> Result<()> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                sender: Some(sender),
                receiver,
                workers: Vec::with_capacity(self.capacity),
                idle: 0,
            }),
            capacity: self.capacity,
        });

        {
            let mut state = shared.lock();
            for _ in 0..self.capacity {
                spawn_worker(&shared, &mut state, true)
                    .map_err(|err| EngineError::startup("ThreadPool", err.to_string()))?;
            }
        }

        tracing::info!(workers = self.capacity, "thread pool started");
        self.handle = Some(ThreadPoolHandle { shared });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
        }
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
    use crate::subsystem::SubsystemRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    fn started(capacity: usize) -> SubsystemRegistry {
        let mut registry = SubsystemRegistry::new().with(ThreadPool::new(capacity));
        registry.start_all().unwrap();
        registry
    }

    #[test]
    fn runs_jobs_on_worker_threads() {
        let mut registry = started(2);
        let pool = registry.get::<ThreadPool>().unwrap().handle().unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..16 {
            let done = Arc::clone(&done);
            pool.run("count", move || {
                assert!(thread::current().name().unwrap().starts_with("Worker"));
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        registry.stop_all();
        assert_eq!(done.load(Ordering::SeqCst), 16);
    }

    #[test]
    fn grows_past_capacity_when_every_worker_is_busy() {
        let mut registry = started(1);
        let pool = registry.get::<ThreadPool>().unwrap().handle().unwrap();
        let barrier = Arc::new(Barrier::new(3));

        // Three jobs that can only finish together need three threads.
        for _ in 0..2 {
            let barrier = Arc::clone(&barrier);
            pool.run("rendezvous", move || {
                barrier.wait();
            })
            .unwrap();
        }
        barrier.wait();

        assert_eq!(pool.thread_count(), 2);
        registry.stop_all();
    }

    #[test]
    fn a_panicking_job_does_not_lose_the_worker() {
        let mut registry = started(1);
        let pool = registry.get::<ThreadPool>().unwrap().handle().unwrap();

        pool.run("boom", || panic!("job failure")).unwrap();
        let (tx, rx) = crossbeam_channel::bounded(1);
        pool.run("after", move || tx.send(()).unwrap()).unwrap();
        rx.recv().unwrap();

        registry.stop_all();
    }

    #[test]
    fn run_after_stop_fails() {
        let mut registry = started(1);
        let pool = registry.get::<ThreadPool>().unwrap().handle().unwrap();
        registry.stop_all();

        assert!(matches!(pool.run("late", || {}), Err(EngineError::ThreadPoolStopped)));
        assert_eq!(pool.thread_count(), 0);
    }
}
