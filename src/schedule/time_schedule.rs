/*!
 * Time Schedule
 * Step generator with an optional step budget
 */

use super::interval::TimeInterval;
use crate::core::clock;
use crate::core::errors::{ScheduleError, ScheduleResult};
use std::cmp::Ordering;
use time::{OffsetDateTime, UtcOffset};

/// Generates aligned, evenly spaced time steps.
///
/// Active once the first step has been computed; `restart` deactivates it and
/// resets the step counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSchedule {
    interval: TimeInterval,
    max_steps: Option<u32>,
    steps_taken: u32,
    current: Option<OffsetDateTime>,
    offset: UtcOffset,
}

impl TimeSchedule {
    pub fn new(interval: TimeInterval) -> Self {
        Self {
            interval,
            max_steps: None,
            steps_taken: 0,
            current: None,
            offset: UtcOffset::UTC,
        }
    }

    /// Limit the number of steps `inc_steps` grants
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn set_max_steps(&mut self, max_steps: Option<u32>) -> ScheduleResult<()> {
        if self.is_active() {
            return Err(ScheduleError::Active("max steps".into()));
        }
        self.max_steps = max_steps;
        Ok(())
    }

    pub fn set_offset(&mut self, offset: UtcOffset) -> ScheduleResult<()> {
        if self.is_active() {
            return Err(ScheduleError::Active("offset".into()));
        }
        self.offset = offset;
        Ok(())
    }

    pub fn interval(&self) -> &TimeInterval {
        &self.interval
    }

    pub fn max_steps(&self) -> Option<u32> {
        self.max_steps
    }

    pub fn steps_taken(&self) -> u32 {
        self.steps_taken
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    pub fn current(&self) -> Option<OffsetDateTime> {
        self.current
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Consume one step of the budget. Always true without a budget.
    pub fn inc_steps(&mut self) -> bool {
        match self.max_steps {
            Some(max) if self.steps_taken >= max => false,
            _ => {
                self.steps_taken = self.steps_taken.saturating_add(1);
                true
            }
        }
    }

    pub fn reset_steps(&mut self) {
        self.steps_taken = 0;
    }

    /// Restart at `start` aligned down to the interval boundary
    pub fn time_step(&mut self, start: OffsetDateTime) -> ScheduleResult<OffsetDateTime> {
        self.restart();
        let aligned = self.interval.align(start.to_offset(self.offset))?;
        self.current = Some(aligned);
        Ok(aligned)
    }

    /// Advance the current step; an inactive schedule first aligns to now
    pub fn next_step(&mut self) -> ScheduleResult<OffsetDateTime> {
        let current = match self.current {
            Some(current) => current,
            None => self.interval.align(clock::now_in(self.offset))?,
        };
        let next = self.interval.advance(current)?;
        self.current = Some(next);
        Ok(next)
    }

    pub fn restart(&mut self) {
        self.current = None;
        self.steps_taken = 0;
    }

    pub fn compare_interval(&self, other: &TimeSchedule) -> Ordering {
        self.interval.compare(&other.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::interval::Interval;
    use pretty_assertions::assert_eq;
    use time::macros::{datetime, offset};

    fn hourly() -> TimeSchedule {
        TimeSchedule::new(TimeInterval::new(Interval::Hours, 1).unwrap())
    }

    #[test]
    fn test_budget() {
        let mut schedule = hourly().with_max_steps(2);
        assert!(schedule.inc_steps());
        assert!(schedule.inc_steps());
        assert!(!schedule.inc_steps());
        assert_eq!(schedule.steps_taken(), 2);

        schedule.reset_steps();
        assert!(schedule.inc_steps());
    }

    #[test]
    fn test_unbounded_budget() {
        let mut schedule = hourly();
        for _ in 0..100 {
            assert!(schedule.inc_steps());
        }
    }

    #[test]
    fn test_steps_follow_alignment() {
        let mut schedule = hourly();
        let first = schedule.time_step(datetime!(2024-05-16 13:47 UTC)).unwrap();
        assert_eq!(first, datetime!(2024-05-16 13:00 UTC));
        assert_eq!(schedule.next_step().unwrap(), datetime!(2024-05-16 14:00 UTC));
        assert_eq!(schedule.next_step().unwrap(), datetime!(2024-05-16 15:00 UTC));
    }

    #[test]
    fn test_steps_use_offset() {
        let mut schedule = TimeSchedule::new(TimeInterval::new(Interval::Days, 1).unwrap())
            .with_offset(offset!(+2));
        let first = schedule.time_step(datetime!(2024-05-16 23:30 UTC)).unwrap();
        assert_eq!(first, datetime!(2024-05-17 0:00 +2));
    }

    #[test]
    fn test_config_locked_while_active() {
        let mut schedule = hourly();
        schedule.time_step(datetime!(2024-05-16 13:47 UTC)).unwrap();
        assert!(schedule.set_max_steps(Some(3)).is_err());
        assert!(schedule.set_offset(offset!(+1)).is_err());

        schedule.restart();
        assert!(!schedule.is_active());
        assert!(schedule.set_max_steps(Some(3)).is_ok());
    }
}
