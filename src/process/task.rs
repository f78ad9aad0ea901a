/*!
 * Process Task
 *
 * The record a worker pool schedules: one submission of a process, with its
 * due instant, the thread running it and the failure captured during the run.
 */

use super::context::ProcessContext;
use super::scheduled::ScheduledProcess;
use crate::core::errors::ExecutionError;
use crate::core::id::{ProcessId, ProcessIdentity};
use crate::monitoring::RunSpan;
use parking_lot::Mutex;
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

pub struct ProcessTask {
    process: Arc<ScheduledProcess>,
    due: Instant,
    seq: u64,
    thread: Mutex<Option<Thread>>,
    failure: Mutex<Option<ExecutionError>>,
    interrupted: AtomicBool,
}

impl ProcessTask {
    pub fn new(process: Arc<ScheduledProcess>, delay: Duration) -> Arc<Self> {
        let now = Instant::now();
        Arc::new(Self {
            process,
            due: now.checked_add(delay).unwrap_or(now),
            seq: NEXT_SEQUENCE.fetch_add(1, AtomicOrdering::Relaxed),
            thread: Mutex::new(None),
            failure: Mutex::new(None),
            interrupted: AtomicBool::new(false),
        })
    }

    pub fn process(&self) -> &Arc<ScheduledProcess> {
        &self.process
    }

    pub fn due(&self) -> Instant {
        self.due
    }

    /// Submission order, used to break ties between equal due instants
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn remaining(&self) -> Duration {
        self.due.saturating_duration_since(Instant::now())
    }

    /// Name of the worker thread currently running this task
    pub fn thread_name(&self) -> Option<String> {
        self.thread
            .lock()
            .as_ref()
            .map(|t| t.name().unwrap_or("unnamed").to_string())
    }

    pub fn is_running(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Whether the calling thread is the one running this task
    pub fn is_current_thread(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_some_and(|t| t.id() == thread::current().id())
    }

    pub fn set_failure(&self, error: ExecutionError) {
        *self.failure.lock() = Some(error);
    }

    pub fn failure(&self) -> Option<ExecutionError> {
        self.failure.lock().clone()
    }

    /// Flag the run as interrupted and wake a sleeping body
    pub fn interrupt(&self) {
        self.interrupted.store(true, AtomicOrdering::SeqCst);
        if let Some(thread) = self.thread.lock().as_ref() {
            thread.unpark();
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(AtomicOrdering::SeqCst)
    }

    /// Run the body on the current thread. Returns the error the body returned
    /// or the panic it raised.
    pub(crate) fn run(self: &Arc<Self>) -> Option<ExecutionError> {
        *self.thread.lock() = Some(thread::current());
        self.process.attach_task(self);

        let span = RunSpan::new(self.process.name(), self.process.id().as_str());
        let ctx = ProcessContext::new(&self.process, self);
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.process.body().run(&ctx)));

        let thrown = match result {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(ExecutionError::from(err)),
            Err(payload) => Some(ExecutionError::Panicked(panic_message(payload.as_ref()))),
        };
        match &thrown {
            Some(err) => span.record_error(&err.to_string()),
            None => span.record_result(true),
        }

        self.process.detach_task();
        *self.thread.lock() = None;
        thrown
    }

    /// Terminal cause of a finished run: a returned error or panic first, then
    /// a captured failure, then the interrupt flag.
    pub fn outcome(&self, thrown: Option<ExecutionError>) -> Option<ExecutionError> {
        thrown
            .or_else(|| self.failure())
            .or_else(|| self.is_interrupted().then_some(ExecutionError::Interrupted))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl ProcessIdentity for ProcessTask {
    fn process_id(&self) -> &ProcessId {
        self.process.id()
    }

    fn process_name(&self) -> &str {
        self.process.name()
    }
}

impl PartialEq for ProcessTask {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for ProcessTask {}

impl PartialOrd for ProcessTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProcessTask {
    /// Earlier due instant first, then submission order
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

impl fmt::Debug for ProcessTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessTask")
            .field("process", &self.process.name())
            .field("seq", &self.seq)
            .field("remaining", &self.remaining())
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn process(body: impl Fn(&ProcessContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static) -> Arc<ScheduledProcess> {
        ScheduledProcess::builder("task-test").body(body).build().unwrap()
    }

    #[test]
    fn test_ordering_by_due_then_seq() {
        let p = process(|_| Ok(()));
        let later = ProcessTask::new(p.clone(), Duration::from_secs(10));
        let first = ProcessTask::new(p.clone(), Duration::ZERO);
        let second = ProcessTask::new(p, Duration::ZERO);
        assert!(first < later);
        assert!(first < second);
    }

    #[test]
    fn test_run_captures_error_and_panic() {
        let failing = ProcessTask::new(process(|_| anyhow::bail!("nope")), Duration::ZERO);
        assert_eq!(failing.run(), Some(ExecutionError::failed("nope")));

        let panicking = ProcessTask::new(process(|_| panic!("kaboom")), Duration::ZERO);
        assert_eq!(
            panicking.run(),
            Some(ExecutionError::Panicked("kaboom".into()))
        );
    }

    #[test]
    fn test_outcome_priority() {
        let task = ProcessTask::new(
            process(|ctx| {
                ctx.fail("explicit", None);
                Ok(())
            }),
            Duration::ZERO,
        );
        let thrown = task.run();
        assert_eq!(thrown, None);
        task.interrupt();
        assert_eq!(task.outcome(None), Some(ExecutionError::failed("explicit")));
        assert_eq!(
            task.outcome(Some(ExecutionError::Interrupted)),
            Some(ExecutionError::Interrupted)
        );
        assert!(task.process().current_task().is_none());
    }

    #[test]
    fn test_interrupt_wakes_sleep() {
        let task = ProcessTask::new(
            process(|ctx| {
                ctx.sleep(Duration::from_secs(30))?;
                Ok(())
            }),
            Duration::ZERO,
        );
        let runner = task.clone();
        let handle = thread::spawn(move || runner.run());
        while !task.is_running() {
            thread::yield_now();
        }
        let started = Instant::now();
        task.interrupt();
        let thrown = handle.join().unwrap();
        assert!(thrown.is_some());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_unbounded_sleep_ends_on_interrupt() {
        let task = ProcessTask::new(
            process(|ctx| match ctx.sleep(Duration::MAX) {
                Err(ExecutionError::Interrupted) => Ok(()),
                other => anyhow::bail!("unexpected sleep result: {other:?}"),
            }),
            Duration::ZERO,
        );
        let runner = task.clone();
        let handle = thread::spawn(move || runner.run());
        while !task.is_running() {
            thread::yield_now();
        }
        task.interrupt();
        assert_eq!(handle.join().unwrap(), None);
    }
}
