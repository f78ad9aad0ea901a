/*!
 * Synchronous Scheduler
 *
 * Runs submissions one at a time on a single worker, in queue order. Each
 * submission runs exactly once. An optional maintenance process runs after a
 * run whenever its trigger policy fires, and once more during shutdown.
 */

use super::core::SchedulerCore;
use super::post_execute::{PostExecuteContext, PostExecutePolicy};
use super::traits::ProcessScheduler;
use crate::core::config::{QueueKind, SchedulerConfig};
use crate::core::errors::{ConfigError, ExecutionError, SchedulerResult, SubmitError};
use crate::core::id::ProcessIdentity;
use crate::core::limits::{POST_EXEC_THREAD, SINGLE_WORKER, SYNC_WORKER_PREFIX};
use crate::executor::{make_queue, TaskHooks, WorkerPool};
use crate::logging::{LogLevel, LogOutputHandler, ProcessLogger};
use crate::process::{ExecStatus, ProcessTask, ScheduledProcess};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Default)]
struct PostExecute {
    process: Option<Arc<ScheduledProcess>>,
    policy: Option<Box<dyn PostExecutePolicy>>,
}

struct SyncInner {
    core: SchedulerCore,
    queue: QueueKind,
    pool: Mutex<Option<WorkerPool>>,
    running: AtomicBool,
    executing: Mutex<Option<Arc<ProcessTask>>>,
    finished: Condvar,
    processed: AtomicU64,
    completed: AtomicU64,
    post: Mutex<PostExecute>,
    post_running: AtomicBool,
}

impl SyncInner {
    fn queued_count(&self) -> usize {
        self.pool
            .lock()
            .as_ref()
            .map_or(0, WorkerPool::queued_count)
    }

    fn post_execute(&self) {
        if !self.running.load(Ordering::SeqCst) || self.post_running.load(Ordering::SeqCst) {
            return;
        }
        let ctx = PostExecuteContext {
            queued: self.queued_count(),
            completed: self.completed.load(Ordering::SeqCst),
        };
        let process = {
            let mut guard = self.post.lock();
            let post = &mut *guard;
            let (Some(process), Some(policy)) = (post.process.as_ref(), post.policy.as_mut()) else {
                return;
            };
            if !policy.do_event(&ctx) {
                return;
            }
            process.clone()
        };

        self.run_post_task(&process);
        if let Some(policy) = self.post.lock().policy.as_mut() {
            policy.reset();
        }
    }

    /// Run the maintenance process on its own thread and wait for it
    fn run_post_task(&self, process: &Arc<ScheduledProcess>) {
        if self.post_running.swap(true, Ordering::SeqCst) {
            return;
        }
        process.attach_logger(self.core.logger().clone());
        self.core.log(process, LogLevel::Info, "Post Exec Task Started.");

        let task = ProcessTask::new(process.clone(), Duration::ZERO);
        let runner = task.clone();
        let joined = thread::Builder::new()
            .name(POST_EXEC_THREAD.to_string())
            .spawn(move || runner.run())
            .map_err(|e| ExecutionError::with_cause("Failed to start post-execute thread", e))
            .and_then(|handle| {
                handle
                    .join()
                    .map_err(|_| ExecutionError::Panicked("post-execute thread panicked".into()))
            });
        let outcome = match joined {
            Ok(thrown) => task.outcome(thrown),
            Err(e) => Some(e),
        };

        match outcome {
            Some(err) => self.core.log(
                process,
                LogLevel::Warning,
                &format!("Post Exec Task Failed: {}", err.describe()),
            ),
            None => self.core.log(process, LogLevel::Info, "Post Exec Task Completed."),
        }
        process.detach_logger();
        self.core.logger().clear_log(&**process);
        self.post_running.store(false, Ordering::SeqCst);
    }
}

impl TaskHooks for SyncInner {
    fn before_execute(&self, task: &Arc<ProcessTask>) {
        let mut executing = self.executing.lock();
        while executing.is_some() {
            self.finished.wait(&mut executing);
        }
        *executing = Some(task.clone());
        drop(executing);

        let process = task.process();
        process.attach_logger(self.core.logger().clone());
        self.core.log(process, LogLevel::Info, "Start Execution.");
    }

    fn after_execute(&self, task: &Arc<ProcessTask>, thrown: Option<ExecutionError>) {
        let process = task.process();
        let outcome = task.outcome(thrown);
        self.core.log_outcome(process, outcome.as_ref());
        process.detach_logger();
        self.core.logger().clear_log(&**process);

        *self.executing.lock() = None;
        self.finished.notify_all();
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.post_execute();
    }
}

/// Single-worker scheduler running each submission once, in queue order
pub struct SyncScheduler {
    inner: Arc<SyncInner>,
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::with_config(&SchedulerConfig::sequential())
    }

    pub fn with_config(config: &SchedulerConfig) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                core: SchedulerCore::new(&config.logger),
                queue: config.queue,
                pool: Mutex::new(None),
                running: AtomicBool::new(false),
                executing: Mutex::new(None),
                finished: Condvar::new(),
                processed: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                post: Mutex::new(PostExecute::default()),
                post_running: AtomicBool::new(false),
            }),
        }
    }

    /// Install (or with `None`, remove) the maintenance process and the policy
    /// deciding when it runs
    pub fn set_post_execute_task(
        &self,
        process: Option<Arc<ScheduledProcess>>,
        policy: Option<Box<dyn PostExecutePolicy>>,
    ) -> SchedulerResult<()> {
        if let (Some(process), None) = (&process, &policy) {
            return Err(ConfigError::InvalidValue {
                key: "post_execute_policy".into(),
                value: format!("none for {}", process.name()),
            }
            .into());
        }
        *self.inner.post.lock() = PostExecute { process, policy };
        Ok(())
    }

    pub fn has_post_execute_task(&self) -> bool {
        self.inner.post.lock().process.is_some()
    }

    /// Number of accepted submissions
    pub fn processed_count(&self) -> u64 {
        self.inner.processed.load(Ordering::SeqCst)
    }

    /// Number of finished runs
    pub fn completed_count(&self) -> u64 {
        self.inner.completed.load(Ordering::SeqCst)
    }

    pub fn queue_kind(&self) -> QueueKind {
        self.inner.queue
    }

    pub fn set_log_output(&self, handler: Option<LogOutputHandler>) {
        self.inner
            .core
            .set_output_handler(handler, self.is_running());
    }

    fn submit_task(&self, process: &Arc<ScheduledProcess>) -> Result<(), SubmitError> {
        let pool = self.inner.pool.lock();
        let pool = pool.as_ref().ok_or(SubmitError::NotRunning)?;
        self.inner
            .core
            .log(process, LogLevel::Info, "Submit to Execution Queue.");
        pool.submit(ProcessTask::new(process.clone(), process.delay()))
    }
}

impl ProcessScheduler for SyncScheduler {
    fn start(&self) -> SchedulerResult<()> {
        let mut pool = self.inner.pool.lock();
        if self.inner.running.load(Ordering::SeqCst) && pool.is_some() {
            return Ok(());
        }
        let hooks: Arc<dyn TaskHooks> = self.inner.clone();
        *pool = Some(WorkerPool::new(
            SYNC_WORKER_PREFIX,
            SINGLE_WORKER,
            make_queue(self.inner.queue),
            Arc::downgrade(&hooks),
        )?);
        self.inner.running.store(true, Ordering::SeqCst);
        drop(pool);

        self.inner.core.start_log_flusher();
        info!(queue = ?self.inner.queue, "Sync scheduler started");
        Ok(())
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

        let post = self.inner.post.lock().process.clone();
        if let Some(process) = post {
            debug!(process = process.name(), "Running post-execute task on shutdown");
            self.inner.run_post_task(&process);
        }
        self.inner.core.stop_log_flusher();
        info!(immediate, "Sync scheduler stopped");
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
        match self.submit_task(process) {
            Ok(()) => {
                self.inner.processed.fetch_add(1, Ordering::SeqCst);
                true
            }
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
        let executing = self
            .inner
            .executing
            .lock()
            .as_ref()
            .is_some_and(|task| task.process_key() == key);
        if executing {
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
        self.inner.queued_count()
    }

    fn executing_count(&self) -> usize {
        usize::from(self.inner.executing.lock().is_some())
    }

    fn logger(&self) -> &Arc<ProcessLogger> {
        self.inner.core.logger()
    }

    fn dump_process_log(&self) {
        self.inner.core.dump_process_log();
    }
}

impl Default for SyncScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::post_execute::{MockPostExecutePolicy, OnCount, OnQueueEmpty};
    use std::sync::atomic::AtomicUsize;

    fn counter(name: &str, hits: Arc<AtomicUsize>) -> Arc<ScheduledProcess> {
        ScheduledProcess::builder(name)
            .body(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_post_task_requires_policy() {
        let scheduler = SyncScheduler::new();
        let maintenance = counter("maintenance", Arc::default());
        assert!(scheduler
            .set_post_execute_task(Some(maintenance.clone()), None)
            .is_err());
        assert!(!scheduler.has_post_execute_task());
        scheduler
            .set_post_execute_task(Some(maintenance), Some(Box::new(OnQueueEmpty)))
            .unwrap();
        assert!(scheduler.has_post_execute_task());
    }

    #[test]
    fn test_graceful_stop_runs_queue_and_post_task() {
        let scheduler = SyncScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let post_hits = Arc::new(AtomicUsize::new(0));
        scheduler
            .set_post_execute_task(
                Some(counter("maintenance", post_hits.clone())),
                Some(Box::new(OnCount::new(0))),
            )
            .unwrap();
        scheduler.start().unwrap();
        for i in 0..3 {
            assert!(scheduler.submit(&counter(&format!("job-{i}"), hits.clone())));
        }
        scheduler.stop(false);

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.processed_count(), 3);
        assert_eq!(scheduler.completed_count(), 3);
        assert_eq!(post_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_sees_completed_runs() {
        let scheduler = SyncScheduler::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let post_hits = Arc::new(AtomicUsize::new(0));

        let mut policy = MockPostExecutePolicy::new();
        // the last call may race the shutdown flag
        policy
            .expect_do_event()
            .times(2..=3)
            .returning(|ctx| ctx.completed == 2);
        policy.expect_reset().times(1).return_const(());
        scheduler
            .set_post_execute_task(
                Some(counter("maintenance", post_hits.clone())),
                Some(Box::new(policy)),
            )
            .unwrap();
        scheduler.start().unwrap();
        for i in 0..3 {
            assert!(scheduler.submit(&counter(&format!("job-{i}"), hits.clone())));
        }

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while scheduler.completed_count() < 3 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        scheduler.stop(false);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        // once by the policy, once on shutdown
        assert_eq!(post_hits.load(Ordering::SeqCst), 2);
    }
}
