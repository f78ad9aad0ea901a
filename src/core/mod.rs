/*!
 * Core Module
 * Identity, errors, configuration, clock helpers and constants
 */

pub mod clock;
pub mod config;
pub mod errors;
pub mod id;
pub mod limits;

// Re-export for convenience
pub use config::{LogOutputConfig, LoggerConfig, QueueKind, SchedulerConfig};
pub use errors::*;
pub use id::{ProcessId, ProcessIdentity, ProcessKey};
