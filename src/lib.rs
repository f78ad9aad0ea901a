/*!
 * Exec Scheduler Library
 *
 * Schedules named processes for one-time, periodic and retried execution on
 * worker threads, with per-process run logs that can be flushed to the
 * tracing log or to files.
 */

pub mod core;
pub mod executor;
pub mod logging;
pub mod monitoring;
pub mod process;
pub mod schedule;
pub mod scheduler;

// Re-exports
pub use crate::core::config::{LogOutputConfig, LoggerConfig, QueueKind, SchedulerConfig};
pub use crate::core::errors::*;
pub use crate::core::id::{ProcessId, ProcessIdentity, ProcessKey};
pub use logging::{FileLogOutput, LogLevel, LogOutputHandler, ProcessLogger, ServerLogOutput};
pub use monitoring::init_tracing;
pub use process::{ExecStatus, ProcessBuilder, ProcessContext, ProcessTask, ScheduledProcess};
pub use schedule::{Interval, ProcessSchedule, ScheduleStatus, TimeInterval, TimeSchedule};
pub use scheduler::{
    AsyncScheduler, OnCount, OnQueueEmpty, PostExecutePolicy, ProcessScheduler, SyncScheduler,
};
