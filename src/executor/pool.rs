/*!
 * Worker Pool
 *
 * Fixed set of named worker threads draining a pluggable task queue. Owners
 * observe each run through `TaskHooks`; shutdown is either graceful (due work
 * still runs) or immediate (queued work is returned, in-flight work is
 * interrupted). Idle workers block on a condition variable.
 */

use super::queue::{Poll, TaskQueue};
use crate::core::errors::{ExecutionError, SubmitError};
use crate::core::id::{ProcessIdentity, ProcessKey};
use crate::process::ProcessTask;
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, warn};

/// Observes each run on the worker thread
pub trait TaskHooks: Send + Sync {
    /// Called before the body runs; may block
    fn before_execute(&self, task: &Arc<ProcessTask>);

    /// Called after the body returned; `thrown` is its error or panic
    fn after_execute(&self, task: &Arc<ProcessTask>, thrown: Option<ExecutionError>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    /// No new submissions; remaining queued work still runs
    Shutdown,
    /// Workers exit as soon as their current run ends
    Stop,
}

struct PoolState {
    queue: Box<dyn TaskQueue>,
    run_state: RunState,
    in_flight: Vec<Arc<ProcessTask>>,
}

struct PoolShared {
    name: String,
    state: Mutex<PoolState>,
    available: Condvar,
    hooks: Weak<dyn TaskHooks>,
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `size` workers named `<name>-<n>`
    pub fn new(
        name: &str,
        size: usize,
        queue: Box<dyn TaskQueue>,
        hooks: Weak<dyn TaskHooks>,
    ) -> Result<Self, SubmitError> {
        let shared = Arc::new(PoolShared {
            name: name.to_string(),
            state: Mutex::new(PoolState {
                queue,
                run_state: RunState::Running,
                in_flight: Vec::new(),
            }),
            available: Condvar::new(),
            hooks,
        });

        let pool = Self {
            shared,
            workers: Mutex::new(Vec::with_capacity(size)),
        };
        for n in 0..size.max(1) {
            let shared = pool.shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("{name}-{n}"))
                .spawn(move || worker_loop(shared));
            match spawned {
                Ok(handle) => pool.workers.lock().push(handle),
                Err(e) => {
                    pool.shutdown_now();
                    pool.await_termination();
                    return Err(SubmitError::Rejected(format!("failed to spawn {name}-{n}: {e}")));
                }
            }
        }
        debug!(pool = name, workers = size, "Worker pool started");
        Ok(pool)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn submit(&self, task: Arc<ProcessTask>) -> Result<(), SubmitError> {
        let mut state = self.shared.state.lock();
        if state.run_state != RunState::Running {
            return Err(SubmitError::NotRunning);
        }
        state.queue.push(task);
        drop(state);
        self.shared.available.notify_one();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().run_state == RunState::Running
    }

    pub fn queued_count(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.shared.state.lock().in_flight.len()
    }

    pub fn is_queued(&self, key: &ProcessKey) -> bool {
        self.shared.state.lock().queue.contains(key)
    }

    pub fn queued_tasks(&self) -> Vec<Arc<ProcessTask>> {
        self.shared.state.lock().queue.tasks()
    }

    /// Remove every queued task of the process
    pub fn remove(&self, key: &ProcessKey) -> Vec<Arc<ProcessTask>> {
        self.shared
            .state
            .lock()
            .queue
            .extract(&mut |t| &t.process_key() == key)
    }

    /// Stop accepting work. Everything queued still runs, delayed tasks once
    /// they come due; workers exit when the queue is empty.
    pub fn shutdown(&self) {
        let mut state = self.shared.state.lock();
        if state.run_state == RunState::Running {
            state.run_state = RunState::Shutdown;
        }
        drop(state);
        self.shared.available.notify_all();
    }

    /// Stop accepting work, return everything queued and interrupt runs in flight
    pub fn shutdown_now(&self) -> Vec<Arc<ProcessTask>> {
        let mut state = self.shared.state.lock();
        state.run_state = RunState::Stop;
        let unexecuted = state.queue.drain();
        for task in &state.in_flight {
            task.interrupt();
        }
        drop(state);
        self.shared.available.notify_all();
        unexecuted
    }

    /// Join the workers. A worker calling this on its own pool is skipped.
    pub fn await_termination(&self) {
        let current = thread::current().id();
        let handles: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                warn!(pool = %self.shared.name, "Worker thread panicked");
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.workers.lock().iter().all(|h| h.is_finished())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if state.run_state != RunState::Stop {
            state.run_state = RunState::Stop;
            drop(state);
            self.shared.available.notify_all();
        }
    }
}

fn next_task(shared: &PoolShared) -> Option<Arc<ProcessTask>> {
    let mut state = shared.state.lock();
    loop {
        if state.run_state == RunState::Stop {
            return None;
        }
        match state.queue.poll(Instant::now()) {
            Poll::Ready(task) => {
                state.in_flight.push(task.clone());
                return Some(task);
            }
            Poll::Wait(_) if state.run_state == RunState::Shutdown && state.queue.is_empty() => {
                return None;
            }
            Poll::Wait(Some(deadline)) => {
                shared.available.wait_until(&mut state, deadline);
            }
            Poll::Wait(None) => {
                shared.available.wait(&mut state);
            }
        }
    }
}

fn worker_loop(shared: Arc<PoolShared>) {
    while let Some(task) = next_task(&shared) {
        match shared.hooks.upgrade() {
            Some(hooks) => {
                hooks.before_execute(&task);
                let thrown = task.run();
                hooks.after_execute(&task, thrown);
            }
            None => {
                if let Some(err) = task.run() {
                    warn!(process = task.process_name(), error = %err, "Run failed");
                }
            }
        }
        shared
            .state
            .lock()
            .in_flight
            .retain(|t| !Arc::ptr_eq(t, &task));
    }
    debug!(pool = %shared.name, "Worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::queue::{DelayQueue, FifoQueue};
    use crate::process::ScheduledProcess;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct Counting {
        before: AtomicUsize,
        after: AtomicUsize,
        failed: AtomicUsize,
    }

    impl TaskHooks for Counting {
        fn before_execute(&self, _task: &Arc<ProcessTask>) {
            self.before.fetch_add(1, Ordering::SeqCst);
        }

        fn after_execute(&self, _task: &Arc<ProcessTask>, thrown: Option<ExecutionError>) {
            if thrown.is_some() {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            self.after.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn hooks_pair() -> (Arc<Counting>, Weak<dyn TaskHooks>) {
        let hooks = Arc::new(Counting::default());
        let dyn_hooks: Arc<dyn TaskHooks> = hooks.clone();
        let weak = Arc::downgrade(&dyn_hooks);
        (hooks, weak)
    }

    fn task(delay: Duration, fail: bool) -> Arc<ProcessTask> {
        let process = ScheduledProcess::builder("pool-test")
            .body(move |_| {
                if fail {
                    anyhow::bail!("failing on purpose");
                }
                Ok(())
            })
            .build()
            .unwrap();
        ProcessTask::new(process, delay)
    }

    #[test]
    fn test_runs_hooks_and_survives_failures() {
        let (hooks, weak) = hooks_pair();
        let pool = WorkerPool::new("test-pool", 2, Box::new(FifoQueue::new()), weak).unwrap();
        for i in 0..6 {
            pool.submit(task(Duration::ZERO, i % 2 == 0)).unwrap();
        }
        pool.shutdown();
        pool.await_termination();

        assert_eq!(hooks.before.load(Ordering::SeqCst), 6);
        assert_eq!(hooks.after.load(Ordering::SeqCst), 6);
        assert_eq!(hooks.failed.load(Ordering::SeqCst), 3);
        assert!(pool.is_terminated());
    }

    #[test]
    fn test_rejects_after_shutdown() {
        let (_hooks, weak) = hooks_pair();
        let pool = WorkerPool::new("test-pool", 1, Box::new(FifoQueue::new()), weak).unwrap();
        pool.shutdown();
        assert_eq!(
            pool.submit(task(Duration::ZERO, false)),
            Err(SubmitError::NotRunning)
        );
        pool.await_termination();
    }

    #[test]
    fn test_graceful_shutdown_runs_delayed_tasks_when_due() {
        let (hooks, weak) = hooks_pair();
        let pool = WorkerPool::new("test-pool", 1, Box::new(DelayQueue::new()), weak).unwrap();
        pool.submit(task(Duration::from_millis(200), false)).unwrap();
        assert_eq!(pool.queued_count(), 1);

        let begun = Instant::now();
        pool.shutdown();
        assert!(!pool.is_running());
        pool.await_termination();
        assert!(begun.elapsed() >= Duration::from_millis(150));
        assert_eq!(hooks.before.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.after.load(Ordering::SeqCst), 1);
        assert_eq!(pool.queued_count(), 0);
    }

    #[test]
    fn test_shutdown_now_returns_queue() {
        let (_hooks, weak) = hooks_pair();
        let pool = WorkerPool::new("test-pool", 1, Box::new(DelayQueue::new()), weak).unwrap();
        for _ in 0..3 {
            pool.submit(task(Duration::from_secs(60), false)).unwrap();
        }
        let unexecuted = pool.shutdown_now();
        pool.await_termination();
        assert_eq!(unexecuted.len(), 3);
    }
}
