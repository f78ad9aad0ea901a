/*!
 * Scheduler Traits
 * Operations shared by the asynchronous and synchronous schedulers
 */

use crate::core::errors::SchedulerResult;
use crate::logging::ProcessLogger;
use crate::process::{ExecStatus, ScheduledProcess};
use std::sync::Arc;

pub trait ProcessScheduler: Send + Sync {
    /// Start the workers and the log flusher. Idempotent.
    fn start(&self) -> SchedulerResult<()>;

    /// Stop the workers. `immediate` cancels queued work and interrupts runs
    /// in flight; otherwise due work still runs. Blocks until the workers exit.
    fn stop(&self, immediate: bool);

    /// Queue a process. Returns false when the scheduler does not accept it.
    fn submit(&self, process: &Arc<ScheduledProcess>) -> bool;

    fn status(&self, process: &ScheduledProcess) -> ExecStatus;

    fn is_running(&self) -> bool;

    fn queued_count(&self) -> usize;

    fn executing_count(&self) -> usize;

    fn logger(&self) -> &Arc<ProcessLogger>;

    /// Flush the process log through the output handler, or dump it to tracing
    fn dump_process_log(&self);
}
