// crates/engine_core/src/task_scheduler.rs

use std::any::Any;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::error::{EngineError, Result};
use crate::subsystem::{LiveSubsystems, Subsystem};
use crate::thread_pool::{Job, ThreadPool, ThreadPoolHandle};

/// Something whose usable worker count can be raised and lowered by one.
pub trait WorkerSlots {
    fn add_worker(&self);
    fn remove_worker(&self);
}

/// Lends one worker slot for as long as it lives.
pub struct WorkerDonation<'a, S: WorkerSlots + ?Sized> {
    slots: &'a S,
}

impl<'a, S: WorkerSlots + ?Sized> WorkerDonation<'a, S> {
    pub fn new(slots: &'a S) -> Self {
        slots.add_worker();
        Self { slots }
    }
}

impl<S: WorkerSlots + ?Sized> Drop for WorkerDonation<'_, S> {
    fn drop(&mut self) {
        self.slots.remove_worker();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    VeryLow,
    Low,
    #[default]
    Normal,
    High,
    VeryHigh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    /// The task body panicked.
    Failed,
    /// Dropped before it ran because the scheduler stopped.
    Cancelled,
}

impl TaskStatus {
    fn is_finished(self) -> bool {
        !matches!(self, TaskStatus::Queued | TaskStatus::Running)
    }
}

struct TaskState {
    status: Mutex<TaskStatus>,
    changed: Condvar,
}

impl TaskState {
    fn set(&self, status: TaskStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
        self.changed.notify_all();
    }
}

/// Observes a submitted task.
#[derive(Clone)]
pub struct TaskHandle {
    name: Arc<str>,
    state: Arc<TaskState>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TaskStatus {
        *self.state.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_finished()
    }

    /// Blocks until the task completed, failed or was cancelled.
    pub fn wait(&self) -> TaskStatus {
        let status = self.state.status.lock().unwrap_or_else(PoisonError::into_inner);
        let status = self
            .state
            .changed
            .wait_while(status, |s| !s.is_finished())
            .unwrap_or_else(PoisonError::into_inner);
        *status
    }
}

struct QueuedTask {
    priority: TaskPriority,
    sequence: u64,
    handle: TaskHandle,
    work: Job,
}

// Higher priority first, then submission order.
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

struct SchedulerState {
    pending: BinaryHeap<QueuedTask>,
    active: usize,
    max_active: usize,
    next_sequence: u64,
    accepting: bool,
}

struct SchedulerShared {
    state: Mutex<SchedulerState>,
    idle: Condvar,
    pool: ThreadPoolHandle,
}

impl SchedulerShared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Claims the next pending task if a slot is free.
fn claim(state: &mut SchedulerState) -> Option<QueuedTask> {
    if !state.accepting || state.active >= state.max_active {
        return None;
    }
    let task = state.pending.pop()?;
    state.active += 1;
    Some(task)
}

/// Hands pending tasks to the pool while the active count is under the slot count.
fn dispatch(shared: &Arc<SchedulerShared>) {
    loop {
        let Some(task) = claim(&mut shared.lock()) else {
            return;
        };

        let name = Arc::clone(&task.handle.name);
        let owner = Arc::clone(shared);
        if let Err(err) = shared.pool.run(&name, move || run_tasks(&owner, task)) {
            tracing::error!(task = %name, %err, "task could not be handed to the thread pool");
            let mut state = shared.lock();
            state.active -= 1;
            shared.idle.notify_all();
            return;
        }
    }
}

/// Runs `first`, then keeps draining the queue on the same worker while its slot stays valid.
fn run_tasks(shared: &Arc<SchedulerShared>, first: QueuedTask) {
    let mut next = Some(first);
    while let Some(QueuedTask { handle, work, .. }) = next.take() {
        handle.state.set(TaskStatus::Running);
        let status = match panic::catch_unwind(AssertUnwindSafe(work)) {
            Ok(()) => TaskStatus::Completed,
            Err(_) => {
                tracing::error!(task = %handle.name, "task panicked");
                TaskStatus::Failed
            }
        };
        handle.state.set(status);

        let mut state = shared.lock();
        state.active -= 1;
        next = claim(&mut state);
        if state.active == 0 {
            shared.idle.notify_all();
        }
    }
}

/// Distributes prioritised tasks over the thread pool.
///
/// At most `max_workers()` tasks run at once. Starts with one slot per pool
/// thread; slots can be lent and reclaimed with `add_worker`/`remove_worker`.
#[derive(Default)]
pub struct TaskScheduler {
    shared: Option<Arc<SchedulerShared>>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn shared(&self) -> Result<&Arc<SchedulerShared>> {
        self.shared.as_ref().ok_or(EngineError::SubsystemNotLive("TaskScheduler"))
    }

    pub fn run(
        &self,
        name: &str,
        priority: TaskPriority,
        work: impl FnOnce() + Send + 'static,
    ) -> Result<TaskHandle> {
        let shared = self.shared()?;
        let handle = TaskHandle {
            name: Arc::from(name),
            state: Arc::new(TaskState {
                status: Mutex::new(TaskStatus::Queued),
                changed: Condvar::new(),
            }),
        };

        {
            let mut state = shared.lock();
            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.pending.push(QueuedTask {
                priority,
                sequence,
                handle: handle.clone(),
                work: Box::new(work),
            });
        }
        dispatch(shared);

        Ok(handle)
    }

    pub fn max_workers(&self) -> usize {
        self.shared.as_ref().map_or(0, |s| s.lock().max_active)
    }

    pub fn active_tasks(&self) -> usize {
        self.shared.as_ref().map_or(0, |s| s.lock().active)
    }

    pub fn pending_tasks(&self) -> usize {
        self.shared.as_ref().map_or(0, |s| s.lock().pending.len())
    }
}

impl WorkerSlots for TaskScheduler {
    fn add_worker(&self) {
        if let Some(shared) = &self.shared {
            shared.lock().max_active += 1;
            dispatch(shared);
        }
    }

    fn remove_worker(&self) {
        if let Some(shared) = &self.shared {
            let mut state = shared.lock();
            debug_assert!(state.max_active > 0, "remove_worker without a matching add_worker");
            state.max_active = state.max_active.saturating_sub(1);
        }
    }
}

impl Subsystem for TaskScheduler {
    fn name(&self) -> &'static str {
        "TaskScheduler"
    }

    fn start(&mut self, live: &LiveSubsystems<'_>) -> Result<()> {
        let pool = live.get::<ThreadPool>()?.handle()?;
        let max_active = pool.capacity();

        self.shared = Some(Arc::new(SchedulerShared {
            state: Mutex::new(SchedulerState {
                pending: BinaryHeap::new(),
                active: 0,
                max_active,
                next_sequence: 0,
                accepting: true,
            }),
            idle: Condvar::new(),
            pool,
        }));
        Ok(())
    }

    /// Cancels queued tasks and waits for running ones.
    fn stop(&mut self) {
        let Some(shared) = self.shared.take() else {
            return;
        };

        let cancelled: Vec<QueuedTask> = {
            let mut state = shared.lock();
            state.accepting = false;
            state.pending.drain().collect()
        };
        if !cancelled.is_empty() {
            tracing::warn!(count = cancelled.len(), "cancelling queued tasks");
        }
        for task in cancelled {
            task.handle.state.set(TaskStatus::Cancelled);
        }

        let state = shared.lock();
        let _idle = shared
            .idle
            .wait_while(state, |s| s.active > 0)
            .unwrap_or_else(PoisonError::into_inner);
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
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Barrier;
    use std::time::Duration;

    fn started(workers: usize) -> SubsystemRegistry {
        let mut registry = SubsystemRegistry::new()
            .with(ThreadPool::new(workers))
            .with(TaskScheduler::new());
        registry.start_all().unwrap();
        registry
    }

    #[test]
    fn tasks_complete() {
        let mut registry = started(2);
        let scheduler = registry.get::<TaskScheduler>().unwrap();
        let sum = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (1..=10)
            .map(|i| {
                let sum = Arc::clone(&sum);
                scheduler
                    .run("add", TaskPriority::Normal, move || {
                        sum.fetch_add(i, AtomicOrdering::SeqCst);
                    })
                    .unwrap()
            })
            .collect();

        for handle in &handles {
            assert_eq!(handle.wait(), TaskStatus::Completed);
        }
        assert_eq!(sum.load(AtomicOrdering::SeqCst), 55);
        registry.stop_all();
    }

    #[test]
    fn never_runs_more_tasks_than_slots() {
        let mut registry = started(4);
        let scheduler = registry.get::<TaskScheduler>().unwrap();
        scheduler.remove_worker();
        scheduler.remove_worker();
        scheduler.remove_worker();
        assert_eq!(scheduler.max_workers(), 1);

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                scheduler
                    .run("serial", TaskPriority::Normal, move || {
                        let now = running.fetch_add(1, AtomicOrdering::SeqCst) + 1;
                        peak.fetch_max(now, AtomicOrdering::SeqCst);
                        std::thread::sleep(Duration::from_millis(2));
                        running.fetch_sub(1, AtomicOrdering::SeqCst);
                    })
                    .unwrap()
            })
            .collect();

        handles.iter().for_each(|h| {
            h.wait();
        });
        assert_eq!(peak.load(AtomicOrdering::SeqCst), 1);
        registry.stop_all();
    }

    #[test]
    fn donated_slot_runs_a_waiting_task_and_is_reclaimed() {
        let mut registry = started(1);
        let scheduler = registry.get::<TaskScheduler>().unwrap();
        scheduler.remove_worker();
        assert_eq!(scheduler.max_workers(), 0);

        let handle = scheduler.run("starved", TaskPriority::High, || {}).unwrap();
        assert_eq!(handle.status(), TaskStatus::Queued);

        {
            let _donation = WorkerDonation::new(scheduler);
            assert_eq!(scheduler.max_workers(), 1);
            assert_eq!(handle.wait(), TaskStatus::Completed);
        }
        assert_eq!(scheduler.max_workers(), 0);
        registry.stop_all();
    }

    #[test]
    fn higher_priority_runs_first() {
        let mut registry = started(1);
        let scheduler = registry.get::<TaskScheduler>().unwrap();
        scheduler.remove_worker();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for (name, priority) in [
            ("low", TaskPriority::Low),
            ("high", TaskPriority::VeryHigh),
            ("normal", TaskPriority::Normal),
        ] {
            let order = Arc::clone(&order);
            handles.push(
                scheduler
                    .run(name, priority, move || order.lock().unwrap().push(name))
                    .unwrap(),
            );
        }

        scheduler.add_worker();
        handles.iter().for_each(|h| {
            h.wait();
        });
        scheduler.remove_worker();

        assert_eq!(*order.lock().unwrap(), vec!["high", "normal", "low"]);
        registry.stop_all();
    }

    #[test]
    fn stop_cancels_queued_tasks_and_waits_for_running_ones() {
        let mut registry = started(1);
        let scheduler = registry.get::<TaskScheduler>().unwrap();
        let gate = Arc::new(Barrier::new(2));

        let blocker = {
            let gate = Arc::clone(&gate);
            scheduler
                .run("blocker", TaskPriority::Normal, move || {
                    gate.wait();
                })
                .unwrap()
        };
        let queued = scheduler.run("queued", TaskPriority::Normal, || {}).unwrap();

        let release = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            gate.wait();
        });
        registry.stop_all();
        release.join().unwrap();

        assert_eq!(blocker.status(), TaskStatus::Completed);
        assert_eq!(queued.status(), TaskStatus::Cancelled);
    }

    #[test]
    fn panicking_task_is_reported_as_failed() {
        let mut registry = started(1);
        let scheduler = registry.get::<TaskScheduler>().unwrap();
        let handle = scheduler
            .run("boom", TaskPriority::Normal, || panic!("task failure"))
            .unwrap();
        assert_eq!(handle.wait(), TaskStatus::Failed);
        assert_eq!(handle.name(), "boom");
        registry.stop_all();
    }
}
