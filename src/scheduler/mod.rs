/*!
 * Scheduler Module
 * Asynchronous and synchronous process schedulers
 */

pub mod async_scheduler;
mod core;
pub mod post_execute;
mod registry;
pub mod sync_scheduler;
pub mod traits;

pub use async_scheduler::AsyncScheduler;
pub use post_execute::{OnCount, OnQueueEmpty, PostExecuteContext, PostExecutePolicy};
pub use sync_scheduler::SyncScheduler;
pub use traits::ProcessScheduler;
