/*!
 * Scheduler Limits and Constants
 *
 * Centralized location for pool sizes, wait bounds and the fixed text the
 * schedulers write into process logs.
 */

use std::time::Duration;

// =============================================================================
// POOL SIZING
// =============================================================================

/// Default worker count for the asynchronous scheduler
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Worker count of the synchronous scheduler and the log flusher
pub const SINGLE_WORKER: usize = 1;

// =============================================================================
// WAIT BOUNDS
// =============================================================================

/// Upper bound `stop_process` waits for an in-flight run of the same id
pub const STOP_PROCESS_WAIT: Duration = Duration::from_secs(6);

/// Slice used by `ProcessContext::sleep` between interrupt checks
pub const INTERRUPT_POLL: Duration = Duration::from_millis(50);

// =============================================================================
// PROCESS LOG MARKERS
// =============================================================================

pub const LOG_STARTED_MARKER: &str = "--- Process Logging Started ---";
pub const LOG_CLOSED_MARKER: &str = "--- Process Logging Closed ---";
pub const LOG_END_MARKER: &str = "---- End Log -----";

// =============================================================================
// FILE OUTPUT
// =============================================================================

/// Subdirectory of the system temp dir used when no log directory is set
pub const DEFAULT_LOG_SUBDIR: &str = "exec-scheduler/logs";

/// Highest `_n` collision suffix tried before giving up
pub const MAX_FILE_SUFFIX: u32 = 10_000;

// =============================================================================
// THREAD NAMES
// =============================================================================

pub const ASYNC_WORKER_PREFIX: &str = "exec-async";
pub const SYNC_WORKER_PREFIX: &str = "exec-sync";
pub const FLUSH_WORKER_PREFIX: &str = "exec-log-flush";
pub const POST_EXEC_THREAD: &str = "exec-post-execute";
