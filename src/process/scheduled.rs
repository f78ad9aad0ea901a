/*!
 * Scheduled Process
 *
 * The unit of work submitted to a scheduler: an immutable id, a display
 * name, a lazily created schedule and the body that does the work.
 */

use super::builder::ProcessBuilder;
use super::context::ProcessContext;
use super::task::ProcessTask;
use crate::core::errors::{ExecutionError, ScheduleResult};
use crate::core::id::{ProcessId, ProcessIdentity};
use crate::logging::{LogLevel, ProcessLogger};
use crate::schedule::{ProcessSchedule, ScheduleListener};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use time::OffsetDateTime;

/// Work run by a process
pub trait ProcessBody: Send + Sync {
    fn run(&self, ctx: &ProcessContext<'_>) -> anyhow::Result<()>;
}

impl<F> ProcessBody for F
where
    F: Fn(&ProcessContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn run(&self, ctx: &ProcessContext<'_>) -> anyhow::Result<()> {
        self(ctx)
    }
}

pub struct ScheduledProcess {
    id: ProcessId,
    name: String,
    do_log: bool,
    schedule: Mutex<Option<ProcessSchedule>>,
    body: Box<dyn ProcessBody>,
    task: Mutex<Option<Weak<ProcessTask>>>,
    logger: Mutex<Option<Arc<ProcessLogger>>>,
}

impl ScheduledProcess {
    pub fn builder(name: impl Into<String>) -> ProcessBuilder {
        ProcessBuilder::new(name)
    }

    pub(crate) fn from_parts(
        id: ProcessId,
        name: String,
        do_log: bool,
        schedule: Option<ProcessSchedule>,
        body: Box<dyn ProcessBody>,
    ) -> Self {
        let schedule = schedule.map(|mut s| {
            s.set_owner(id.clone(), name.clone());
            s
        });
        Self {
            id,
            name,
            do_log,
            schedule: Mutex::new(schedule),
            body,
            task: Mutex::new(None),
            logger: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &ProcessId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether scheduler activity for this process is written to the process log
    pub fn do_log(&self) -> bool {
        self.do_log
    }

    /// Run `f` against the schedule, creating a one-time schedule on first use.
    /// Listeners hear about transitions once the schedule lock is released.
    pub fn with_schedule<R>(&self, f: impl FnOnce(&mut ProcessSchedule) -> R) -> R {
        let (result, deferred) = {
            let mut guard = self.schedule.lock();
            let schedule = guard.get_or_insert_with(|| {
                let mut schedule = ProcessSchedule::one_time();
                schedule.set_owner(self.id.clone(), self.name.clone());
                schedule
            });
            schedule.defer_events();
            let result = f(schedule);
            (result, schedule.take_deferred())
        };
        if let Some(events) = deferred {
            events.deliver();
        }
        result
    }

    /// Replace the schedule
    pub fn set_schedule(&self, mut schedule: ProcessSchedule) {
        schedule.set_owner(self.id.clone(), self.name.clone());
        *self.schedule.lock() = Some(schedule);
    }

    pub fn add_schedule_listener(&self, listener: Arc<dyn ScheduleListener>) {
        self.with_schedule(|s| s.add_listener(listener));
    }

    pub fn delay(&self) -> Duration {
        self.with_schedule(ProcessSchedule::delay)
    }

    pub fn is_done(&self) -> bool {
        self.with_schedule(|s| s.is_done())
    }

    pub fn is_periodic(&self) -> bool {
        self.with_schedule(|s| s.do_periodic())
    }

    pub fn scheduled_time(&self) -> Option<OffsetDateTime> {
        self.with_schedule(ProcessSchedule::scheduled_time)
    }

    /// Advance the schedule after a run; `retry` asks for a retry step
    pub fn update_schedule(&self, retry: bool) -> Option<OffsetDateTime> {
        self.with_schedule(|s| s.reschedule(retry))
    }

    pub fn stop_schedule(&self) {
        self.with_schedule(ProcessSchedule::stop);
    }

    pub fn restart_schedule(&self) -> ScheduleResult<OffsetDateTime> {
        self.with_schedule(ProcessSchedule::restart)
    }

    pub fn execute_now(&self) {
        self.with_schedule(ProcessSchedule::execute_now);
    }

    /// Order by remaining delay
    pub fn compare_delay(&self, other: &ScheduledProcess) -> Ordering {
        self.delay().cmp(&other.delay())
    }

    /// Record a failure of the current run.
    ///
    /// With a run in flight the failure is handed to its task and the schedule
    /// is stopped; otherwise it is only logged.
    pub fn on_execution_failed(&self, error: ExecutionError) {
        match self.current_task() {
            Some(task) => {
                task.set_failure(error);
                self.with_schedule(ProcessSchedule::stop_on_error);
            }
            None => self.log(LogLevel::Severe, error.describe()),
        }
    }

    /// Write to the process log of the running scheduler. Levels above INFO,
    /// and everything logged outside a run, are echoed to tracing.
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        let message = message.as_ref();
        let logger = self.logger.lock().clone();
        match logger {
            Some(logger) if self.do_log => {
                logger.log(self, level, message);
                if level > LogLevel::Info {
                    level.emit(self.id.as_str(), &self.name, message);
                }
            }
            _ => level.emit(self.id.as_str(), &self.name, message),
        }
    }

    pub fn current_task(&self) -> Option<Arc<ProcessTask>> {
        self.task.lock().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn attach_task(&self, task: &Arc<ProcessTask>) {
        *self.task.lock() = Some(Arc::downgrade(task));
    }

    pub(crate) fn detach_task(&self) {
        *self.task.lock() = None;
    }

    pub(crate) fn attach_logger(&self, logger: Arc<ProcessLogger>) {
        *self.logger.lock() = Some(logger);
    }

    pub(crate) fn detach_logger(&self) {
        *self.logger.lock() = None;
    }

    pub(crate) fn body(&self) -> &dyn ProcessBody {
        self.body.as_ref()
    }
}

impl ProcessIdentity for ScheduledProcess {
    fn process_id(&self) -> &ProcessId {
        &self.id
    }

    fn process_name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for ScheduledProcess {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ScheduledProcess {}

impl fmt::Debug for ScheduledProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledProcess")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("do_log", &self.do_log)
            .field("schedule", &*self.schedule.lock())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ScheduledProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{Interval, ScheduleEvent, ScheduleStatus, TimeInterval, TimeSchedule};

    fn noop(name: &str) -> Arc<ScheduledProcess> {
        ScheduledProcess::builder(name)
            .body(|_| Ok(()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_lazy_one_time_schedule() {
        let process = noop("one-shot");
        assert!(process.is_done());
        assert!(!process.is_periodic());
        assert_eq!(process.delay(), Duration::ZERO);
    }

    #[test]
    fn test_periodic_delegation() {
        let process = noop("hourly");
        process.set_schedule(ProcessSchedule::periodic(TimeSchedule::new(
            TimeInterval::new(Interval::Hours, 1).unwrap(),
        )));
        assert_eq!(process.delay(), Duration::ZERO);
        assert!(process.is_periodic());
        assert!(!process.is_done());

        process.update_schedule(false);
        assert!(process.delay() > Duration::ZERO);

        process.stop_schedule();
        assert!(process.is_done());
    }

    #[test]
    fn test_failure_without_task_keeps_schedule() {
        let process = noop("detached");
        process.set_schedule(ProcessSchedule::periodic(TimeSchedule::new(
            TimeInterval::new(Interval::Hours, 1).unwrap(),
        )));
        process.delay();
        process.on_execution_failed(ExecutionError::failed("no task"));
        assert!(!process.is_done());
    }

    struct Reentrant {
        process: Mutex<Weak<ScheduledProcess>>,
        seen: Mutex<Vec<(ScheduleStatus, bool)>>,
    }

    impl ScheduleListener for Reentrant {
        fn on_schedule_event(&self, event: &ScheduleEvent) {
            if let Some(process) = self.process.lock().upgrade() {
                let done = process.is_done();
                self.seen.lock().push((event.status, done));
            }
        }
    }

    #[test]
    fn test_listener_may_query_its_process() {
        let process = noop("watched");
        process.set_schedule(ProcessSchedule::periodic(
            TimeSchedule::new(TimeInterval::new(Interval::Hours, 1).unwrap()).with_max_steps(1),
        ));
        let listener = Arc::new(Reentrant {
            process: Mutex::new(Arc::downgrade(&process)),
            seen: Mutex::new(Vec::new()),
        });
        process.add_schedule_listener(listener.clone());

        process.update_schedule(false);
        process.update_schedule(false);
        process.update_schedule(false);

        assert_eq!(
            *listener.seen.lock(),
            vec![
                (ScheduleStatus::Started, false),
                (ScheduleStatus::Periodic, false),
                (ScheduleStatus::Completed, true),
            ]
        );
    }

    #[test]
    fn test_equality_by_id() {
        let a = ScheduledProcess::builder("a")
            .with_id("Shared-ID")
            .body(|_| Ok(()))
            .build()
            .unwrap();
        let b = ScheduledProcess::builder("b")
            .with_id("shared-id")
            .body(|_| Ok(()))
            .build()
            .unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, *noop("c"));
    }
}
