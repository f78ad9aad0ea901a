/*!
 * Process Schedule
 *
 * Computes when a process runs next. A schedule is one-time (no interval),
 * periodic, retry-only, or periodic with a shorter retry interval used to
 * re-attempt a failed run before the regular cadence resumes.
 */

use super::events::{ScheduleEvent, ScheduleEventKind, ScheduleListener};
use super::status::ScheduleStatus;
use super::time_schedule::TimeSchedule;
use crate::core::clock;
use crate::core::errors::{ScheduleError, ScheduleResult};
use crate::core::id::ProcessId;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};
use tracing::warn;

pub struct ProcessSchedule {
    scheduled_time: Option<OffsetDateTime>,
    periodic: Option<TimeSchedule>,
    retry: Option<TimeSchedule>,
    offset: UtcOffset,
    started: bool,
    owner: Option<(ProcessId, String)>,
    listeners: Vec<Arc<dyn ScheduleListener>>,
    deferred: Option<Vec<ScheduleEvent>>,
}

/// Events held back while the owner's lock was taken
pub(crate) struct DeferredEvents {
    listeners: Vec<Arc<dyn ScheduleListener>>,
    events: Vec<ScheduleEvent>,
}

impl DeferredEvents {
    pub(crate) fn deliver(self) {
        for event in &self.events {
            for listener in &self.listeners {
                listener.on_schedule_event(event);
            }
        }
    }
}

impl ProcessSchedule {
    /// No interval: runs once
    pub fn one_time() -> Self {
        Self {
            scheduled_time: None,
            periodic: None,
            retry: None,
            offset: UtcOffset::UTC,
            started: false,
            owner: None,
            listeners: Vec::new(),
            deferred: None,
        }
    }

    pub fn periodic(periodic: TimeSchedule) -> Self {
        let offset = periodic.offset();
        Self {
            periodic: Some(periodic),
            offset,
            ..Self::one_time()
        }
    }

    pub fn retry_only(retry: TimeSchedule) -> Self {
        let offset = retry.offset();
        Self {
            retry: Some(retry),
            offset,
            ..Self::one_time()
        }
    }

    /// Validated combination; the retry interval must be strictly shorter
    /// than the periodic one and both must share an offset.
    pub fn new(periodic: Option<TimeSchedule>, retry: Option<TimeSchedule>) -> ScheduleResult<Self> {
        match (periodic, retry) {
            (None, None) => Err(ScheduleError::MissingInterval),
            (Some(periodic), None) => Ok(Self::periodic(periodic)),
            (None, Some(retry)) => Ok(Self::retry_only(retry)),
            (Some(periodic), Some(retry)) => {
                if retry.compare_interval(&periodic) != Ordering::Less {
                    return Err(ScheduleError::RetryNotShorter {
                        retry: retry.interval().to_string(),
                        periodic: periodic.interval().to_string(),
                    });
                }
                if retry.offset() != periodic.offset() {
                    return Err(ScheduleError::OffsetMismatch);
                }
                let mut schedule = Self::periodic(periodic);
                schedule.retry = Some(retry);
                Ok(schedule)
            }
        }
    }

    /// Offset used for "now" on a one-time schedule
    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        if self.periodic.is_none() && self.retry.is_none() {
            self.offset = offset;
        }
        self
    }

    /// Identify the owning process in emitted events
    pub fn set_owner(&mut self, id: ProcessId, name: impl Into<String>) {
        self.owner = Some((id, name.into()));
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ScheduleListener>) {
        self.listeners.push(listener);
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn periodic_spec(&self) -> Option<&TimeSchedule> {
        self.periodic.as_ref()
    }

    pub fn retry_spec(&self) -> Option<&TimeSchedule> {
        self.retry.as_ref()
    }

    pub fn has_periodic(&self) -> bool {
        self.periodic.is_some()
    }

    pub fn has_retry(&self) -> bool {
        self.retry.is_some()
    }

    /// Periodic interval configured and active
    pub fn do_periodic(&self) -> bool {
        self.periodic.as_ref().is_some_and(TimeSchedule::is_active)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// True when no interval is configured, or one is and nothing is scheduled
    pub fn is_done(&self) -> bool {
        if self.periodic.is_none() && self.retry.is_none() {
            return true;
        }
        self.scheduled_time.is_none()
    }

    /// Scheduled time without starting a pending periodic schedule
    pub fn peek_scheduled_time(&self) -> Option<OffsetDateTime> {
        self.scheduled_time
    }

    /// Scheduled time; starts a periodic schedule that was never started
    pub fn scheduled_time(&mut self) -> Option<OffsetDateTime> {
        self.ensure_started();
        self.scheduled_time
    }

    /// Time left until the scheduled time, never negative
    pub fn delay(&mut self) -> Duration {
        self.ensure_started();
        self.scheduled_time.map(clock::until).unwrap_or(Duration::ZERO)
    }

    fn ensure_started(&mut self) {
        if self.periodic.is_some() && !self.started {
            if let Err(e) = self.start(None, Duration::ZERO) {
                warn!(process = self.owner_name(), error = %e, "Failed to start schedule");
            }
        }
    }

    /// Start at `start` (default now), aligned to the periodic interval when
    /// one is configured, plus `delay`. No-op once started.
    pub fn start(&mut self, start: Option<OffsetDateTime>, delay: Duration) -> ScheduleResult<()> {
        if self.scheduled_time.is_some() || self.do_periodic() {
            return Ok(());
        }

        let start = start.unwrap_or_else(|| clock::now_in(self.offset));
        let mut scheduled = match self.periodic.as_mut() {
            Some(periodic) => periodic.time_step(start)?,
            None => start,
        };
        if !delay.is_zero() {
            scheduled = scheduled
                .checked_add(clock::to_time_duration(delay))
                .ok_or_else(|| ScheduleError::Computation(format!("{scheduled} + {delay:?} overflows")))?;
        }

        self.scheduled_time = Some(scheduled);
        self.started = true;
        self.reset_counters();
        self.emit(ScheduleStatus::Started);
        Ok(())
    }

    /// Compute the next run time after a run.
    ///
    /// A retry step takes precedence over the periodic step when `retry` is
    /// requested and the retry budget allows it.
    pub fn reschedule(&mut self, retry: bool) -> Option<OffsetDateTime> {
        if let Err(e) = self.try_reschedule(retry) {
            warn!(process = self.owner_name(), error = %e, "Reschedule failed");
            self.finish(ScheduleStatus::Error);
        }
        self.scheduled_time
    }

    fn try_reschedule(&mut self, retry: bool) -> ScheduleResult<()> {
        let retry = retry && self.retry.is_some();

        if !self.started && (self.periodic.is_some() || self.retry.is_some()) {
            return self.start(None, Duration::ZERO);
        }
        if self.is_done() {
            return Ok(());
        }

        if retry && self.retry.as_mut().is_some_and(TimeSchedule::inc_steps) {
            if let Some(spec) = self.retry.as_mut() {
                self.scheduled_time = Some(spec.next_step()?);
            }
            self.emit(ScheduleStatus::Retried);
            return Ok(());
        }

        let mut next = None;
        if let Some(periodic) = self.periodic.as_mut() {
            if periodic.inc_steps() {
                next = Some(periodic.next_step()?);
            }
        }
        match next {
            Some(next) => {
                self.scheduled_time = Some(next);
                if let Some(spec) = self.retry.as_mut() {
                    spec.restart();
                }
                self.emit(ScheduleStatus::Periodic);
            }
            None => self.finish(ScheduleStatus::Completed),
        }
        Ok(())
    }

    /// Run as soon as possible without touching the step counters
    pub fn execute_now(&mut self) {
        if self.periodic.is_some() && !self.do_periodic() {
            if let Err(e) = self.start(None, Duration::ZERO) {
                warn!(process = self.owner_name(), error = %e, "Failed to start schedule");
            }
            return;
        }
        self.scheduled_time = Some(clock::now_in(self.offset));
        self.started = true;
        self.emit(ScheduleStatus::RunNow);
    }

    /// Resume at the current periodic-aligned time (or now) with fresh counters
    pub fn restart(&mut self) -> ScheduleResult<OffsetDateTime> {
        let now = clock::now_in(self.offset);
        let scheduled = match self.periodic.as_mut() {
            Some(periodic) => periodic.time_step(now)?,
            None => now,
        };
        self.scheduled_time = Some(scheduled);
        self.started = true;
        self.reset_counters();
        self.emit(ScheduleStatus::Started);
        Ok(scheduled)
    }

    pub fn stop(&mut self) {
        self.finish(ScheduleStatus::Stopped);
    }

    pub fn stop_on_error(&mut self) {
        self.finish(ScheduleStatus::Error);
    }

    fn finish(&mut self, status: ScheduleStatus) {
        if self.scheduled_time.take().is_some() {
            self.emit(status);
        }
    }

    fn reset_counters(&mut self) {
        if let Some(periodic) = self.periodic.as_mut() {
            periodic.reset_steps();
        }
        if let Some(retry) = self.retry.as_mut() {
            retry.restart();
        }
    }

    fn owner_name(&self) -> &str {
        self.owner.as_ref().map(|(_, name)| name.as_str()).unwrap_or("")
    }

    fn emit(&mut self, status: ScheduleStatus) {
        if self.listeners.is_empty() {
            return;
        }
        let Some(kind) = ScheduleEventKind::for_status(status) else {
            return;
        };
        let event = ScheduleEvent {
            kind,
            status,
            process_id: self.owner.as_ref().map(|(id, _)| id.clone()),
            process_name: self.owner.as_ref().map(|(_, name)| name.clone()),
            scheduled_time: self.scheduled_time,
        };
        match self.deferred.as_mut() {
            Some(queued) => queued.push(event),
            None => {
                for listener in &self.listeners {
                    listener.on_schedule_event(&event);
                }
            }
        }
    }

    /// Queue events instead of notifying until `take_deferred`
    pub(crate) fn defer_events(&mut self) {
        self.deferred.get_or_insert_with(Vec::new);
    }

    /// Resume direct notification, handing back what was queued meanwhile
    pub(crate) fn take_deferred(&mut self) -> Option<DeferredEvents> {
        let events = self.deferred.take()?;
        if events.is_empty() {
            return None;
        }
        Some(DeferredEvents {
            listeners: self.listeners.clone(),
            events,
        })
    }
}

impl Default for ProcessSchedule {
    fn default() -> Self {
        Self::one_time()
    }
}

impl Clone for ProcessSchedule {
    /// Copies the configuration; the clone is not started and has no listeners
    fn clone(&self) -> Self {
        let mut periodic = self.periodic.clone();
        let mut retry = self.retry.clone();
        periodic.iter_mut().chain(retry.iter_mut()).for_each(TimeSchedule::restart);
        Self {
            scheduled_time: None,
            periodic,
            retry,
            offset: self.offset,
            started: false,
            owner: self.owner.clone(),
            listeners: Vec::new(),
            deferred: None,
        }
    }
}

impl fmt::Debug for ProcessSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSchedule")
            .field("scheduled_time", &self.scheduled_time)
            .field("periodic", &self.periodic)
            .field("retry", &self.retry)
            .field("offset", &self.offset)
            .field("started", &self.started)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
