/*!
 * Process Builder
 * Builder pattern for ScheduledProcess construction
 */

use super::context::ProcessContext;
use super::scheduled::{ProcessBody, ScheduledProcess};
use crate::core::errors::{ProcessError, SchedulerResult};
use crate::core::id::ProcessId;
use crate::schedule::{ProcessSchedule, ScheduleListener};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Builder for ScheduledProcess
pub struct ProcessBuilder {
    name: String,
    id: Option<String>,
    do_log: bool,
    schedule: Option<ProcessSchedule>,
    start_at: Option<OffsetDateTime>,
    start_delay: Duration,
    listeners: Vec<Arc<dyn ScheduleListener>>,
    body: Option<Box<dyn ProcessBody>>,
}

impl ProcessBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            do_log: true,
            schedule: None,
            start_at: None,
            start_delay: Duration::ZERO,
            listeners: Vec::new(),
            body: None,
        }
    }

    /// Use a caller-supplied id instead of a generated one
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Enable or disable process logging (enabled by default)
    pub fn with_logging(mut self, do_log: bool) -> Self {
        self.do_log = do_log;
        self
    }

    pub fn with_schedule(mut self, schedule: ProcessSchedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Start the schedule at `at` (aligned to the periodic interval, if any)
    pub fn start_at(mut self, at: OffsetDateTime) -> Self {
        self.start_at = Some(at);
        self
    }

    /// Start the schedule `delay` after its start time
    pub fn start_after(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ScheduleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Closure body
    pub fn body<F>(mut self, body: F) -> Self
    where
        F: Fn(&ProcessContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.body = Some(Box::new(body));
        self
    }

    /// Body implemented on a type
    pub fn body_from(mut self, body: impl ProcessBody + 'static) -> Self {
        self.body = Some(Box::new(body));
        self
    }

    pub fn build(self) -> SchedulerResult<Arc<ScheduledProcess>> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ProcessError::EmptyName.into());
        }
        let id = match self.id {
            Some(raw) => ProcessId::parse(raw).ok_or(ProcessError::EmptyId)?,
            None => ProcessId::generate(),
        };
        let body = self.body.ok_or_else(|| ProcessError::MissingBody(name.clone()))?;

        let mut schedule = self.schedule.unwrap_or_default();
        for listener in self.listeners {
            schedule.add_listener(listener);
        }
        schedule.set_owner(id.clone(), name.clone());
        if self.start_at.is_some() || !self.start_delay.is_zero() {
            schedule.start(self.start_at, self.start_delay)?;
        }

        Ok(Arc::new(ScheduledProcess::from_parts(
            id,
            name,
            self.do_log,
            Some(schedule),
            body,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::SchedulerError;
    use crate::schedule::ChannelListener;
    use crate::schedule::ScheduleEventKind;

    #[test]
    fn test_empty_name_rejected() {
        let err = ProcessBuilder::new("  ").body(|_| Ok(())).build().unwrap_err();
        assert_eq!(err, SchedulerError::Process(ProcessError::EmptyName));
    }

    #[test]
    fn test_missing_body_rejected() {
        let err = ProcessBuilder::new("idle").build().unwrap_err();
        assert!(matches!(err, SchedulerError::Process(ProcessError::MissingBody(_))));
    }

    #[test]
    fn test_delayed_start() {
        let (listener, rx) = ChannelListener::unbounded();
        let process = ProcessBuilder::new("later")
            .start_after(Duration::from_secs(30))
            .with_listener(Arc::new(listener))
            .body(|_| Ok(()))
            .build()
            .unwrap();

        assert!(process.delay() > Duration::from_secs(25));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, ScheduleEventKind::Started);
        assert_eq!(event.process_name.as_deref(), Some("later"));
    }

    #[test]
    fn test_logging_default_on() {
        let process = ProcessBuilder::new("p").body(|_| Ok(())).build().unwrap();
        assert!(process.do_log());
        let quiet = ProcessBuilder::new("q").with_logging(false).body(|_| Ok(())).build().unwrap();
        assert!(!quiet.do_log());
    }
}
