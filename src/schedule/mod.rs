/*!
 * Scheduling
 * Interval arithmetic, step budgets and the per-process schedule state machine
 */

pub mod events;
pub mod interval;
pub mod process_schedule;
pub mod status;
pub mod time_schedule;

pub use events::{ChannelListener, ScheduleEvent, ScheduleEventKind, ScheduleListener};
pub use interval::{Interval, TimeInterval};
pub use process_schedule::ProcessSchedule;
pub use status::ScheduleStatus;
pub use time_schedule::TimeSchedule;
