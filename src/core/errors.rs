/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schedule construction and computation errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ScheduleError {
    #[error("Invalid interval: {0}")]
    #[diagnostic(
        code(schedule::invalid_interval),
        help("Tick counts must be positive; use TimeInterval::immediate() for back-to-back steps.")
    )]
    InvalidInterval(String),

    #[error("Retry interval {retry} must be shorter than periodic interval {periodic}")]
    #[diagnostic(
        code(schedule::retry_not_shorter),
        help("Use a smaller unit or fewer ticks for the retry interval.")
    )]
    RetryNotShorter { retry: String, periodic: String },

    #[error("Retry and periodic schedules use different UTC offsets")]
    #[diagnostic(
        code(schedule::offset_mismatch),
        help("Build both time schedules with the same offset.")
    )]
    OffsetMismatch,

    #[error("A schedule needs a periodic or a retry interval")]
    #[diagnostic(code(schedule::missing_interval))]
    MissingInterval,

    #[error("Cannot modify {0} while the schedule is active")]
    #[diagnostic(
        code(schedule::active),
        help("Restart or stop the schedule before changing its configuration.")
    )]
    Active(String),

    #[error("Failed to compute next run time: {0}")]
    #[diagnostic(code(schedule::computation_failed))]
    Computation(String),
}

impl From<time::error::ComponentRange> for ScheduleError {
    fn from(err: time::error::ComponentRange) -> Self {
        ScheduleError::Computation(err.to_string())
    }
}

/// Process definition errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("Process name must not be empty")]
    #[diagnostic(code(process::empty_name), help("Every process needs a display name."))]
    EmptyName,

    #[error("Process {0} has no body")]
    #[diagnostic(
        code(process::missing_body),
        help("Call ProcessBuilder::body with the work to run.")
    )]
    MissingBody(String),

    #[error("Process id must not be empty")]
    #[diagnostic(code(process::empty_id))]
    EmptyId,
}

/// Submission errors. `submit` reports these as `false` plus a log entry.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SubmitError {
    #[error("Scheduler is not running")]
    #[diagnostic(code(submit::not_running), help("Call start() before submitting."))]
    NotRunning,

    #[error("Task rejected: {0}")]
    #[diagnostic(code(submit::rejected))]
    Rejected(String),
}

/// Failure of a single process run
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("{message}")]
    #[diagnostic(code(execution::failed))]
    Failed {
        message: String,
        cause: Option<String>,
    },

    #[error("Process panicked: {0}")]
    #[diagnostic(code(execution::panicked))]
    Panicked(String),

    #[error("Process was interrupted")]
    #[diagnostic(code(execution::interrupted))]
    Interrupted,
}

impl ExecutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        ExecutionError::Failed {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        ExecutionError::Failed {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    /// Message with the cause appended, as written to the process log
    pub fn describe(&self) -> String {
        match self {
            ExecutionError::Failed {
                message,
                cause: Some(cause),
            } if !message.is_empty() => format!("{message}\n\tCaused by: {cause}"),
            ExecutionError::Failed {
                cause: Some(cause), ..
            } => cause.clone(),
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for ExecutionError {
    fn from(err: anyhow::Error) -> Self {
        let message = err.to_string();
        let cause = err.chain().nth(1).map(|c| c.to_string());
        ExecutionError::Failed { message, cause }
    }
}

/// Process log and output-handler errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum LoggerError {
    #[error("I/O error: {0}")]
    #[diagnostic(
        code(logger::io),
        help("Check that the log directory exists and is writable.")
    )]
    Io(String),

    #[error("Output handler is not bound to a logger")]
    #[diagnostic(code(logger::unbound))]
    Unbound,

    #[error("Failed to render log: {0}")]
    #[diagnostic(code(logger::render))]
    Render(String),
}

impl From<std::io::Error> for LoggerError {
    fn from(err: std::io::Error) -> Self {
        LoggerError::Io(err.to_string())
    }
}

impl From<std::fmt::Error> for LoggerError {
    fn from(err: std::fmt::Error) -> Self {
        LoggerError::Render(err.to_string())
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    #[diagnostic(code(config::parse))]
    Parse(String),

    #[error("Invalid value for {key}: {value}")]
    #[diagnostic(code(config::invalid_value), help("See SchedulerConfig docs for accepted values."))]
    InvalidValue { key: String, value: String },
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Unified error type
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SchedulerError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Logger(#[from] LoggerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
pub type ProcessResult<T> = Result<T, ProcessError>;
pub type LoggerResult<T> = Result<T, LoggerError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SchedulerResult<T> = Result<T, SchedulerError>;
