/*!
 * Log Flusher
 *
 * Runs a periodic output handler on its own single-worker pool so flushing
 * never competes with scheduled processes for workers.
 */

use super::output::LogOutputHandler;
use crate::core::errors::{ExecutionError, SubmitError};
use crate::core::limits::FLUSH_WORKER_PREFIX;
use crate::executor::{DelayQueue, TaskHooks, WorkerPool};
use crate::process::ProcessTask;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

struct FlusherInner {
    handler: LogOutputHandler,
    pool: Mutex<Option<WorkerPool>>,
    executing: AtomicBool,
    running: AtomicBool,
}

impl FlusherInner {
    fn submit(&self) -> Result<(), SubmitError> {
        let process = self.handler.process().clone();
        let delay = process.delay();
        let task = ProcessTask::new(process, delay);
        match self.pool.lock().as_ref() {
            Some(pool) => pool.submit(task),
            None => Err(SubmitError::NotRunning),
        }
    }
}

impl TaskHooks for FlusherInner {
    fn before_execute(&self, _task: &Arc<ProcessTask>) {
        self.executing.store(true, Ordering::SeqCst);
    }

    fn after_execute(&self, task: &Arc<ProcessTask>, thrown: Option<ExecutionError>) {
        self.executing.store(false, Ordering::SeqCst);
        if let Some(err) = task.outcome(thrown) {
            warn!(handler = self.handler.name(), error = %err.describe(), "Log flush failed");
        }
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        let process = task.process();
        if !process.is_done() && process.delay().is_zero() {
            process.update_schedule(false);
        }
        if process.is_done() {
            debug!(handler = self.handler.name(), "Log flush schedule finished");
            return;
        }
        if let Err(e) = self.submit() {
            debug!(handler = self.handler.name(), error = %e, "Log flush not resubmitted");
        }
    }
}

/// Background runner of a periodic log output handler
pub struct LogFlusher {
    inner: Arc<FlusherInner>,
}

impl LogFlusher {
    /// Start flushing with `handler`. Returns `None` when the handler has no
    /// periodic schedule or its worker could not be started.
    pub fn start(handler: LogOutputHandler) -> Option<Self> {
        if !handler.is_periodic() {
            return None;
        }
        let inner = Arc::new(FlusherInner {
            handler,
            pool: Mutex::new(None),
            executing: AtomicBool::new(false),
            running: AtomicBool::new(true),
        });

        let hooks: Arc<dyn TaskHooks> = inner.clone();
        let weak: Weak<dyn TaskHooks> = Arc::downgrade(&hooks);
        drop(hooks);
        let pool = match WorkerPool::new(FLUSH_WORKER_PREFIX, 1, Box::new(DelayQueue::new()), weak) {
            Ok(pool) => pool,
            Err(e) => {
                warn!(error = %e, "Failed to start log flusher");
                return None;
            }
        };
        *inner.pool.lock() = Some(pool);

        if let Err(e) = inner.submit() {
            warn!(handler = inner.handler.name(), error = %e, "Failed to queue first log flush");
        }
        debug!(handler = inner.handler.name(), "Log flusher started");
        Some(Self { inner })
    }

    pub fn handler(&self) -> &LogOutputHandler {
        &self.inner.handler
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Whether a flush is in progress
    pub fn is_executing(&self) -> bool {
        self.inner.executing.load(Ordering::SeqCst)
    }

    /// Time until the next flush, if one is queued
    pub fn next_flush_in(&self) -> Option<Duration> {
        let pool = self.inner.pool.lock();
        pool.as_ref()?.queued_tasks().iter().map(|t| t.remaining()).min()
    }

    /// Cancel the periodic flush, wait for one in flight, then flush once more
    pub fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let pool = self.inner.pool.lock().take();
        if let Some(pool) = pool {
            pool.shutdown_now();
            pool.await_termination();
        }
        if let Err(e) = self.inner.handler.flush_now() {
            warn!(handler = self.inner.handler.name(), error = %e, "Final log flush failed");
        }
        debug!(handler = self.inner.handler.name(), "Log flusher stopped");
    }
}

impl Drop for LogFlusher {
    fn drop(&mut self) {
        self.stop();
    }
}
