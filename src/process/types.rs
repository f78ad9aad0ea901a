/*!
 * Process Types
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution status of a process as seen by a scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    /// Queued, not yet picked up by a worker
    NotStarted,
    /// Registered as running
    Executing,
    /// Neither queued nor running
    Completed,
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecStatus::NotStarted => "NOTSTARTED",
            ExecStatus::Executing => "EXECUTING",
            ExecStatus::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}
