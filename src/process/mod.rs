/*!
 * Process Module
 * Schedulable processes, their run context and the task record pools execute
 */

pub mod builder;
pub mod context;
pub mod scheduled;
pub mod task;
pub mod types;

pub use builder::ProcessBuilder;
pub use context::ProcessContext;
pub use scheduled::{ProcessBody, ScheduledProcess};
pub use task::ProcessTask;
pub use types::ExecStatus;
