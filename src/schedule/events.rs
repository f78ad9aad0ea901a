/*!
 * Schedule Events
 * Listener seam for STARTED / UPDATED / COMPLETED notifications
 */

use super::status::ScheduleStatus;
use crate::core::id::ProcessId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleEventKind {
    Started,
    Updated,
    Completed,
}

impl ScheduleEventKind {
    /// Event kind a status is delivered as
    pub fn for_status(status: ScheduleStatus) -> Option<Self> {
        match status {
            ScheduleStatus::Started => Some(Self::Started),
            s if s.is_updated() => Some(Self::Updated),
            s if s.is_done() => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub kind: ScheduleEventKind,
    pub status: ScheduleStatus,
    pub process_id: Option<ProcessId>,
    pub process_name: Option<String>,
    /// Scheduled time after the transition; `None` once stopped
    pub scheduled_time: Option<OffsetDateTime>,
}

/// Receives schedule transitions.
///
/// For a schedule owned by a process, events arrive after the process has
/// released its schedule lock, so a listener may query or drive that process.
#[cfg_attr(test, mockall::automock)]
pub trait ScheduleListener: Send + Sync {
    fn on_schedule_event(&self, event: &ScheduleEvent);
}

/// Forwards events into a flume channel
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: flume::Sender<ScheduleEvent>,
}

impl ChannelListener {
    pub fn new(tx: flume::Sender<ScheduleEvent>) -> Self {
        Self { tx }
    }

    /// Unbounded listener plus the receiving end
    pub fn unbounded() -> (Self, flume::Receiver<ScheduleEvent>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }
}

impl ScheduleListener for ChannelListener {
    fn on_schedule_event(&self, event: &ScheduleEvent) {
        // Receiver gone: nobody is listening any more
        let _ = self.tx.send(event.clone());
    }
}
