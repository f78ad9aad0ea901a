/*!
 * Wall Clock Helpers
 * Offset-aware "now", non-negative delays and the timestamp formats used in logs
 */

use std::time::Duration;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Current wall-clock time in `offset`
pub fn now_in(offset: UtcOffset) -> OffsetDateTime {
    OffsetDateTime::now_utc().to_offset(offset)
}

/// Current wall-clock time in UTC
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Time left until `when`, clamped at zero
pub fn until(when: OffsetDateTime) -> Duration {
    Duration::try_from(when - now()).unwrap_or(Duration::ZERO)
}

/// Convert a std duration into a `time` duration, saturating on overflow
pub fn to_time_duration(delay: Duration) -> time::Duration {
    time::Duration::try_from(delay).unwrap_or(time::Duration::MAX)
}

/// `MM/DD/YYYY hh:mm:ss`
pub fn format_log_timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[month]/[day]/[year] [hour]:[minute]:[second]"
    ))
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// `YYYY_MM_DD_HHMMSS`, used in output file names
pub fn format_file_stamp(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[year]_[month]_[day]_[hour][minute][second]"
    ))
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    #[test]
    fn test_until_never_negative() {
        let past = now() - time::Duration::hours(1);
        assert_eq!(until(past), Duration::ZERO);

        let future = now() + time::Duration::hours(1);
        assert!(until(future) > Duration::from_secs(3500));
    }

    #[test]
    fn test_formats() {
        let at = datetime!(2024-03-07 14:05:09 UTC);
        assert_eq!(format_log_timestamp(at), "03/07/2024 14:05:09");
        assert_eq!(format_file_stamp(at), "2024_03_07_140509");
    }
}
