/*!
 * Asynchronous Scheduler
 *
 * Runs processes on a fixed pool of workers in due-time order. Runs of the
 * same process id never overlap; unrelated processes run in parallel.
 * Periodic processes are re-queued after each run until their schedule is
 * done.
 */

use super::core::SchedulerCore;
use super::registry::ExecutionRegistry;
use super::traits::ProcessScheduler;
use crate::core::clock;
use crate::core::config::SchedulerConfig;
use crate::core::errors::{ExecutionError, SchedulerResult, SubmitError};
use crate::core::id::{ProcessIdentity, ProcessKey};
use crate::core::limits::{ASYNC_WORKER_PREFIX, DEFAULT_POOL_SIZE, STOP_PROCESS_WAIT};
use crate::executor::{DelayQueue, TaskHooks, WorkerPool};
use crate::logging::{LogLevel, LogOutputHandler, ProcessLogger};
use crate::process::{ExecStatus, ProcessTask, ScheduledProcess};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct AsyncInner {
    core: SchedulerCore,
    pool: Mutex<Option<WorkerPool>>,
    registry: ExecutionRegistry,
    running: AtomicBool,
    /// (core, max) worker counts
    sizes: Mutex<(usize, usize)>,
}

impl AsyncInner {
    fn enqueue(&self, process: &Arc<ScheduledProcess>) -> Result<(), SubmitError> {
        let delay = process.delay();
        let message = match process.scheduled_time() {
            Some(at) if !delay.is_zero() => {
                format!("Queued. Scheduled for {}.", clock::format_log_timestamp(at))
            }
            _ => "Queued. Execute with no delay".to_string(),
        };

        let pool = self.pool.lock();
        let pool = pool.as_ref().ok_or(SubmitError::NotRunning)?;
        self.core.log(process, LogLevel::Info, &message);
        pool.submit(ProcessTask::new(process.clone(), delay))
    }

    /// Advance a finished run's schedule and report whether to queue it again.
    /// Retry steps are only taken when the body asked for one.
    fn reschedule(&self, process: &ScheduledProcess) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        if !process.is_done() && process.delay().is_zero() {
            process.update_schedule(false);
        }
        let again = !process.is_done();
        let message = if again {
            "Process is re-submitted to the Execution Queue."
        } else {
            "Process Execution scheduling has been stopped."
        };
        self.core.log(process, LogLevel::Info, message);
        again
    }
}

impl TaskHooks for AsyncInner {
    fn before_execute(&self, task: &Arc<ProcessTask>) {
        self.registry.acquire(task);
        let process = task.process();
        process.attach_logger(self.core.logger().clone());
        self.core.log(process, LogLevel::Info, "Start Execution.");
    }

    fn after_execute(&self, task: &Arc<ProcessTask>, thrown: Option<ExecutionError>) {
        let process = task.process();
        let outcome = task.outcome(thrown);
        self.core.log_outcome(process, outcome.as_ref());

        let again = self.reschedule(process);
        process.detach_logger();
        self.core.logger().clear_log(&**process);

        // queued before the slot is released so stop_process sees it
        if again && !process.is_done() {
            if let Err(e) = self.enqueue(process) {
                warn!(
                    process_id = process.id().as_str(),
                    process = process.name(),
                    error = %e,
                    "Failed to re-submit process"
                );
            }
        }
        self.registry.release(task);
    }
}

/// Multi-worker scheduler with per-process mutual exclusion
pub struct AsyncScheduler {
    inner: Arc<AsyncInner>,
}

impl AsyncScheduler {
    pub fn new() -> Self {
        Self::with_config(&SchedulerConfig::default())
    }

    pub fn with_config(config: &SchedulerConfig) -> Self {
        let core_size = config.core_pool_size.max(1);
        Self {
            inner: Arc::new(AsyncInner {
                core: SchedulerCore::new(&config.logger),
                pool: Mutex::new(None),
                registry: ExecutionRegistry::new(),
                running: AtomicBool::new(false),
                sizes: Mutex::new((core_size, config.max_pool_size.max(core_size))),
            }),
        }
    }

    /// Start with `core_size` workers; `max_size` is clamped to at least
    /// `core_size`. No-op while running.
    pub fn start_with(&self, core_size: usize, max_size: usize) -> SchedulerResult<()> {
        let core_size = if core_size == 0 {
            DEFAULT_POOL_SIZE
        } else {
            core_size
        };
        let mut pool = self.inner.pool.lock();
        if self.inner.running.load(Ordering::SeqCst) && pool.is_some() {
            return Ok(());
        }
        *self.inner.sizes.lock() = (core_size, max_size.max(core_size));

        let hooks: Arc<dyn TaskHooks> = self.inner.clone();
        *pool = Some(WorkerPool::new(
            ASYNC_WORKER_PREFIX,
            core_size,
            Box::new(DelayQueue::new()),
            Arc::downgrade(&hooks),
        )?);
        self.inner.running.store(true, Ordering::SeqCst);
        drop(pool);

        self.inner.core.start_log_flusher();
        info!(workers = core_size, "Async scheduler started");
        Ok(())
    }

    pub fn core_pool_size(&self) -> usize {
        self.inner.sizes.lock().0
    }

    pub fn max_pool_size(&self) -> usize {
        self.inner.sizes.lock().1
    }

    /// Replace the logger's output handler; the periodic flush follows the new
    /// handler when running
    pub fn set_log_output(&self, handler: Option<LogOutputHandler>) {
        self.inner
            .core
            .set_output_handler(handler, self.is_running());
    }

    /// Stop the process's schedule, drop its queued runs and wait for a run
    /// in flight to finish. False when the run did not finish in time.
    pub fn stop_process(&self, process: &ScheduledProcess) -> bool {
        let key = process.process_key();
        process.stop_schedule();
        let mut removed = self.remove_queued(&key);

        let in_flight = self.inner.registry.running(&key);
        if in_flight.is_some_and(|task| task.is_current_thread()) {
            return true;
        }
        let released = self.inner.registry.wait_released(&key, STOP_PROCESS_WAIT);
        removed += self.remove_queued(&key);

        if removed > 0 {
            self.inner.core.log(
                process,
                LogLevel::Info,
                "Process removed from the Execution Queue.",
            );
            if !self.inner.registry.contains(&key) {
                self.inner.core.logger().clear_log(process);
            }
        }
        if !released {
            warn!(
                process_id = process.id().as_str(),
                process = process.name(),
                "Process still executing after stop request"
            );
        }
        released
    }

    fn remove_queued(&self, key: &ProcessKey) -> usize {
        self.inner
            .pool
            .lock()
            .as_ref()
            .map_or(0, |pool| pool.remove(key).len())
    }
}

impl ProcessScheduler for AsyncScheduler {
    fn start(&self) -> SchedulerResult<()> {
        let (core_size, max_size) = *self.inner.sizes.lock();
        self.start_with(core_size, max_size)
    }

    fn stop(&self, immediate: bool) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let pool = self.inner.pool.lock().take();
        if let Some(pool) = pool {
            if immediate {
                for task in &pool.shutdown_now() {
                    self.inner.core.log_not_executed(task.process());
                }
            } else {
                pool.shutdown();
            }
            pool.await_termination();
        }
        self.inner.registry.clear();
        self.inner.core.stop_log_flusher();
        info!(immediate, "Async scheduler stopped");
    }

    fn submit(&self, process: &Arc<ScheduledProcess>) -> bool {
        if !self.is_running() {
            warn!(
                process_id = process.id().as_str(),
                process = process.name(),
                "Scheduler is not running, process not queued"
            );
            return false;
        }
        match self.inner.enqueue(process) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    process_id = process.id().as_str(),
                    process = process.name(),
                    error = %e,
                    "Failed to queue process"
                );
                false
            }
        }
    }

    fn status(&self, process: &ScheduledProcess) -> ExecStatus {
        let key = process.process_key();
        if self.inner.registry.contains(&key) {
            return ExecStatus::Executing;
        }
        let queued = self
            .inner
            .pool
            .lock()
            .as_ref()
            .is_some_and(|pool| pool.is_queued(&key));
        if queued {
            ExecStatus::NotStarted
        } else {
            ExecStatus::Completed
        }
    }

    fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    fn queued_count(&self) -> usize {
        self.inner
            .pool
            .lock()
            .as_ref()
            .map_or(0, WorkerPool::queued_count)
    }

    fn executing_count(&self) -> usize {
        self.inner.registry.len()
    }

    fn logger(&self) -> &Arc<ProcessLogger> {
        self.inner.core.logger()
    }

    fn dump_process_log(&self) {
        self.inner.core.dump_process_log();
    }
}

impl Default for AsyncScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AsyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            debug!("Async scheduler dropped while running");
            self.stop(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        done()
    }

    #[test]
    fn test_submit_requires_start() {
        let scheduler = AsyncScheduler::new();
        let process = ScheduledProcess::builder("idle").body(|_| Ok(())).build().unwrap();
        assert!(!scheduler.submit(&process));
        assert_eq!(scheduler.queued_count(), 0);
    }

    #[test]
    fn test_pool_sizes_clamped() {
        let scheduler = AsyncScheduler::new();
        scheduler.start_with(3, 1).unwrap();
        assert_eq!(scheduler.core_pool_size(), 3);
        assert_eq!(scheduler.max_pool_size(), 3);
        // second start is a no-op
        scheduler.start_with(8, 8).unwrap();
        assert_eq!(scheduler.core_pool_size(), 3);
        scheduler.stop(false);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_one_time_process_completes() {
        let scheduler = AsyncScheduler::new();
        scheduler.start().unwrap();
        let process = ScheduledProcess::builder("once")
            .body(|ctx| {
                ctx.info("working");
                Ok(())
            })
            .build()
            .unwrap();
        assert!(scheduler.submit(&process));
        assert!(wait_for(|| {
            scheduler.logger().archived_entries(&*process).len() >= 5
        }));
        assert!(wait_for(|| scheduler.status(&process) == ExecStatus::Completed));

        let messages: Vec<String> = scheduler
            .logger()
            .archived_entries(&*process)
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert!(messages.contains(&"Start Execution.".to_string()));
        assert!(messages.contains(&"working".to_string()));
        assert!(messages.contains(&"Execution Successfully Completed.".to_string()));
        scheduler.stop(false);
    }

    #[test]
    fn test_delayed_process_is_queued() {
        let scheduler = AsyncScheduler::new();
        scheduler.start().unwrap();
        let process = ScheduledProcess::builder("later")
            .start_after(Duration::from_secs(60))
            .body(|_| Ok(()))
            .build()
            .unwrap();
        assert!(scheduler.submit(&process));
        assert_eq!(scheduler.status(&process), ExecStatus::NotStarted);
        assert_eq!(scheduler.queued_count(), 1);
        assert!(scheduler.stop_process(&process));
        assert_eq!(scheduler.queued_count(), 0);
        scheduler.stop(true);
    }
}
