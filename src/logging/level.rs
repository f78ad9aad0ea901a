/*!
 * Log Levels
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Severity of a process log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Fine,
    Config,
    Info,
    Warning,
    Severe,
}

impl LogLevel {
    /// Echo a process message to tracing at the matching level
    pub fn emit(self, process_id: &str, process: &str, message: &str) {
        match self {
            LogLevel::Severe => error!(process_id, process, "{}", message),
            LogLevel::Warning => warn!(process_id, process, "{}", message),
            LogLevel::Info => info!(process_id, process, "{}", message),
            LogLevel::Config | LogLevel::Fine => debug!(process_id, process, "{}", message),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Fine => "FINE",
            LogLevel::Config => "CONFIG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Severe => "SEVERE",
        };
        f.write_str(name)
    }
}
