/*!
 * Process Context
 * What a running body can see and do
 */

use super::scheduled::ScheduledProcess;
use super::task::ProcessTask;
use crate::core::errors::ExecutionError;
use crate::core::limits::INTERRUPT_POLL;
use crate::logging::LogLevel;
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Handed to `ProcessBody::run` for the duration of one run
pub struct ProcessContext<'a> {
    process: &'a ScheduledProcess,
    task: &'a ProcessTask,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(process: &'a ScheduledProcess, task: &'a ProcessTask) -> Self {
        Self { process, task }
    }

    pub fn process(&self) -> &ScheduledProcess {
        self.process
    }

    pub fn name(&self) -> &str {
        self.process.name()
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.process.log(level, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.process.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.process.log(LogLevel::Warning, message);
    }

    /// Mark this run failed and stop the schedule. The body may keep going;
    /// the failure is reported once it returns.
    pub fn fail(&self, message: impl Into<String>, cause: Option<&dyn fmt::Display>) {
        let error = match cause {
            Some(cause) => ExecutionError::with_cause(message, cause),
            None => ExecutionError::failed(message),
        };
        self.process.on_execution_failed(error);
    }

    /// Move the scheduled time forward by one retry step
    pub fn retry(&self) -> Option<OffsetDateTime> {
        self.process.update_schedule(true)
    }

    /// Set when the scheduler is shutting down immediately
    pub fn is_interrupted(&self) -> bool {
        self.task.is_interrupted()
    }

    /// Sleep for `duration`, returning early with `Interrupted`. A duration
    /// past the clock's range sleeps until interrupted.
    pub fn sleep(&self, duration: Duration) -> Result<(), ExecutionError> {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.task.is_interrupted() {
                return Err(ExecutionError::Interrupted);
            }
            let now = Instant::now();
            let wait = match deadline {
                Some(deadline) if now >= deadline => return Ok(()),
                Some(deadline) => (deadline - now).min(INTERRUPT_POLL),
                None => INTERRUPT_POLL,
            };
            thread::park_timeout(wait);
        }
    }
}
