/*!
 * Time Intervals
 * Calendar units, boundary alignment and calendar-aware stepping
 */

use crate::core::errors::{ScheduleError, ScheduleResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use time::{Date, Month, OffsetDateTime, Time};

/// Calendar unit of an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
}

impl Interval {
    /// Truncate `at` to the start of the enclosing unit.
    /// Weeks start on Monday, months on the 1st.
    pub fn align(self, at: OffsetDateTime) -> ScheduleResult<OffsetDateTime> {
        let aligned = match self {
            Interval::Milliseconds => at.replace_nanosecond(at.millisecond() as u32 * 1_000_000)?,
            Interval::Seconds => at.replace_nanosecond(0)?,
            Interval::Minutes => at.replace_nanosecond(0)?.replace_second(0)?,
            Interval::Hours => at.replace_nanosecond(0)?.replace_second(0)?.replace_minute(0)?,
            Interval::Days => at.replace_time(Time::MIDNIGHT),
            Interval::Weeks => {
                let midnight = at.replace_time(Time::MIDNIGHT);
                let back = midnight.weekday().number_days_from_monday() as i64;
                checked_add(midnight, time::Duration::days(-back))?
            }
            Interval::Months => at.replace_time(Time::MIDNIGHT).replace_day(1)?,
        };
        Ok(aligned)
    }

    /// Advance `at` by `ticks` units
    pub fn advance(self, at: OffsetDateTime, ticks: u32) -> ScheduleResult<OffsetDateTime> {
        let ticks = i64::from(ticks);
        match self {
            Interval::Milliseconds => checked_add(at, time::Duration::milliseconds(ticks)),
            Interval::Seconds => checked_add(at, time::Duration::seconds(ticks)),
            Interval::Minutes => checked_add(at, time::Duration::minutes(ticks)),
            Interval::Hours => checked_add(at, time::Duration::hours(ticks)),
            Interval::Days => checked_add(at, time::Duration::days(ticks)),
            Interval::Weeks => checked_add(at, time::Duration::weeks(ticks)),
            Interval::Months => add_months(at, ticks),
        }
    }

    /// Nominal length of one unit; months count as 30 days
    pub fn nominal(self) -> time::Duration {
        match self {
            Interval::Milliseconds => time::Duration::MILLISECOND,
            Interval::Seconds => time::Duration::SECOND,
            Interval::Minutes => time::Duration::MINUTE,
            Interval::Hours => time::Duration::HOUR,
            Interval::Days => time::Duration::DAY,
            Interval::Weeks => time::Duration::WEEK,
            Interval::Months => time::Duration::days(30),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Interval::Milliseconds => "Milliseconds",
            Interval::Seconds => "Seconds",
            Interval::Minutes => "Minutes",
            Interval::Hours => "Hours",
            Interval::Days => "Days",
            Interval::Weeks => "Weeks",
            Interval::Months => "Months",
        };
        f.write_str(name)
    }
}

fn checked_add(at: OffsetDateTime, by: time::Duration) -> ScheduleResult<OffsetDateTime> {
    at.checked_add(by)
        .ok_or_else(|| ScheduleError::Computation(format!("{at} + {by} overflows")))
}

fn add_months(at: OffsetDateTime, months: i64) -> ScheduleResult<OffsetDateTime> {
    let index = i64::from(at.year()) * 12 + i64::from(u8::from(at.month()) - 1) + months;
    let year = i32::try_from(index.div_euclid(12))
        .map_err(|_| ScheduleError::Computation(format!("{at} + {months} months overflows")))?;
    let month = Month::try_from((index.rem_euclid(12) + 1) as u8)?;
    let day = at.day().min(time::util::days_in_year_month(year, month));
    Ok(at.replace_date(Date::from_calendar_date(year, month, day)?))
}

/// A unit, a tick count and an optional shift applied after alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    interval: Interval,
    ticks: u32,
    shift: Option<time::Duration>,
}

impl TimeInterval {
    pub fn new(interval: Interval, ticks: u32) -> ScheduleResult<Self> {
        if ticks == 0 {
            return Err(ScheduleError::InvalidInterval(format!(
                "0 {interval} is not a valid step"
            )));
        }
        Ok(Self {
            interval,
            ticks,
            shift: None,
        })
    }

    /// Zero-length steps: every step is due as soon as the previous one
    pub const fn immediate() -> Self {
        Self {
            interval: Interval::Milliseconds,
            ticks: 0,
            shift: None,
        }
    }

    /// Offset applied after aligning to the unit boundary
    /// (e.g. `Days` shifted by 2 hours steps at 02:00)
    pub fn with_shift(mut self, shift: time::Duration) -> Self {
        self.shift = Some(shift);
        self
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn align(&self, at: OffsetDateTime) -> ScheduleResult<OffsetDateTime> {
        let aligned = self.interval.align(at)?;
        match self.shift {
            Some(shift) => checked_add(aligned, shift),
            None => Ok(aligned),
        }
    }

    pub fn advance(&self, at: OffsetDateTime) -> ScheduleResult<OffsetDateTime> {
        self.interval.advance(at, self.ticks)
    }

    pub fn nominal(&self) -> time::Duration {
        self.interval.nominal() * self.ticks
    }

    /// Compare by nominal step length
    pub fn compare(&self, other: &TimeInterval) -> Ordering {
        self.nominal()
            .cmp(&other.nominal())
            .then(self.interval.cmp(&other.interval))
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ticks, self.interval)
    }
}
