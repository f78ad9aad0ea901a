/*!
 * Schedule Status
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status carried by schedule events.
///
/// Bit 0x1 marks an update of a running schedule, bit 0x4 a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum ScheduleStatus {
    None = 0x0,
    Started = 0x1,
    Periodic = 0x11,
    Retried = 0x21,
    RunNow = 0x41,
    Completed = 0x104,
    Stopped = 0x204,
    Error = 0x804,
}

impl ScheduleStatus {
    pub const fn bits(self) -> u16 {
        self as u16
    }

    pub const fn is_updated(self) -> bool {
        self.bits() & 0x1 != 0
    }

    pub const fn is_done(self) -> bool {
        self.bits() & 0x4 != 0
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScheduleStatus::None => "NONE",
            ScheduleStatus::Started => "STARTED",
            ScheduleStatus::Periodic => "PERIODIC",
            ScheduleStatus::Retried => "RETRIED",
            ScheduleStatus::RunNow => "RUNNOW",
            ScheduleStatus::Completed => "COMPLETED",
            ScheduleStatus::Stopped => "STOPPED",
            ScheduleStatus::Error => "ERROR",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_bits() {
        for status in [
            ScheduleStatus::Started,
            ScheduleStatus::Periodic,
            ScheduleStatus::Retried,
            ScheduleStatus::RunNow,
        ] {
            assert!(status.is_updated());
            assert!(!status.is_done());
        }
        for status in [
            ScheduleStatus::Completed,
            ScheduleStatus::Stopped,
            ScheduleStatus::Error,
        ] {
            assert!(status.is_done());
            assert!(!status.is_updated());
        }
        assert!(!ScheduleStatus::None.is_done());
    }
}
