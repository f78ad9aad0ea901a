/*!
 * Scheduler Configuration
 *
 * Serde-backed configuration for pool sizing, queue discipline and the
 * process logger, loadable from JSON or environment variables.
 */

use super::errors::{ConfigError, ConfigResult};
use super::limits::DEFAULT_POOL_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Queue discipline of the synchronous scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Submission order
    #[default]
    Fifo,
    /// Most recent submission first
    Lifo,
    /// Earliest due time first
    Delay,
}

impl FromStr for QueueKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fifo" => Ok(QueueKind::Fifo),
            "lifo" => Ok(QueueKind::Lifo),
            "delay" => Ok(QueueKind::Delay),
            other => Err(ConfigError::InvalidValue {
                key: "queue".into(),
                value: other.into(),
            }),
        }
    }
}

/// Where the periodic log flush writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogOutputConfig {
    /// Dump into the tracing log
    Server {
        #[serde(default = "default_clear")]
        clear_log: bool,
    },
    /// Write one file per flush
    File {
        #[serde(default)]
        directory: Option<PathBuf>,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        html: bool,
        #[serde(default = "default_clear")]
        clear_log: bool,
    },
}

fn default_clear() -> bool {
    true
}

/// Process logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Maximum number of active process logs kept
    pub max_processes: Option<usize>,
    /// Maximum age in whole days of an active process log
    pub max_age_days: Option<u32>,
    /// Cadence of the periodic flush; no flushing when unset
    pub flush_interval_secs: Option<u64>,
    /// Sink of the periodic flush
    pub output: Option<LogOutputConfig>,
}

impl LoggerConfig {
    pub fn flush_interval(&self) -> Option<Duration> {
        self.flush_interval_secs.map(Duration::from_secs)
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker count of the asynchronous scheduler
    pub core_pool_size: usize,
    /// Upper bound reported by the asynchronous scheduler; clamped to >= core
    pub max_pool_size: usize,
    /// Queue discipline of the synchronous scheduler
    pub queue: QueueKind,
    pub logger: LoggerConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            core_pool_size: DEFAULT_POOL_SIZE,
            max_pool_size: DEFAULT_POOL_SIZE,
            queue: QueueKind::Fifo,
            logger: LoggerConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// Single worker, FIFO queue
    pub const fn sequential() -> Self {
        Self {
            core_pool_size: 1,
            max_pool_size: 1,
            queue: QueueKind::Fifo,
            logger: LoggerConfig {
                max_processes: None,
                max_age_days: None,
                flush_interval_secs: None,
                output: None,
            },
        }
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(raw: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()
    }

    /// Defaults overridden by `EXEC_SCHEDULER_*` environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(v) = lookup("EXEC_SCHEDULER_CORE_POOL_SIZE") {
            config.core_pool_size = parse_value("EXEC_SCHEDULER_CORE_POOL_SIZE", &v)?;
            config.max_pool_size = config.max_pool_size.max(config.core_pool_size);
        }
        if let Some(v) = lookup("EXEC_SCHEDULER_MAX_POOL_SIZE") {
            config.max_pool_size = parse_value("EXEC_SCHEDULER_MAX_POOL_SIZE", &v)?;
        }
        if let Some(v) = lookup("EXEC_SCHEDULER_QUEUE") {
            config.queue = v.parse()?;
        }
        if let Some(v) = lookup("EXEC_SCHEDULER_LOG_MAX_PROCESSES") {
            config.logger.max_processes = Some(parse_value("EXEC_SCHEDULER_LOG_MAX_PROCESSES", &v)?);
        }
        if let Some(v) = lookup("EXEC_SCHEDULER_LOG_MAX_AGE_DAYS") {
            config.logger.max_age_days = Some(parse_value("EXEC_SCHEDULER_LOG_MAX_AGE_DAYS", &v)?);
        }
        if let Some(v) = lookup("EXEC_SCHEDULER_LOG_FLUSH_SECS") {
            config.logger.flush_interval_secs = Some(parse_value("EXEC_SCHEDULER_LOG_FLUSH_SECS", &v)?);
        }
        if let Some(dir) = lookup("EXEC_SCHEDULER_LOG_DIR") {
            config.logger.output = Some(LogOutputConfig::File {
                directory: Some(PathBuf::from(dir)),
                prefix: None,
                html: false,
                clear_log: true,
            });
        }

        config.validate()
    }

    /// Reject zero-sized pools and clamp max to >= core
    pub fn validate(mut self) -> ConfigResult<Self> {
        if self.core_pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "core_pool_size".into(),
                value: "0".into(),
            });
        }
        if self.logger.flush_interval_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "logger.flush_interval_secs".into(),
                value: "0".into(),
            });
        }
        self.max_pool_size = self.max_pool_size.max(self.core_pool_size);
        Ok(self)
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> ConfigResult<T> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.into(),
        value: raw.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.core_pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.queue, QueueKind::Fifo);
        assert_eq!(config.logger.flush_interval(), None);
    }

    #[test]
    fn test_json_partial_and_clamp() {
        let config = SchedulerConfig::from_json(
            r#"{"core_pool_size": 8, "max_pool_size": 2, "logger": {"max_processes": 50}}"#,
        )
        .unwrap();
        assert_eq!(config.core_pool_size, 8);
        assert_eq!(config.max_pool_size, 8);
        assert_eq!(config.logger.max_processes, Some(50));
    }

    #[test]
    fn test_json_file_output() {
        let config = SchedulerConfig::from_json(
            r#"{"logger": {"flush_interval_secs": 60, "output": {"kind": "file", "html": true}}}"#,
        )
        .unwrap();
        assert_eq!(
            config.logger.output,
            Some(LogOutputConfig::File {
                directory: None,
                prefix: None,
                html: true,
                clear_log: true
            })
        );
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            ("EXEC_SCHEDULER_CORE_POOL_SIZE", "6"),
            ("EXEC_SCHEDULER_QUEUE", "LIFO"),
            ("EXEC_SCHEDULER_LOG_MAX_AGE_DAYS", "3"),
        ]
        .into_iter()
        .collect();
        let config = SchedulerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.core_pool_size, 6);
        assert_eq!(config.max_pool_size, 6);
        assert_eq!(config.queue, QueueKind::Lifo);
        assert_eq!(config.logger.max_age_days, Some(3));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SchedulerConfig::from_lookup(|k| {
            (k == "EXEC_SCHEDULER_CORE_POOL_SIZE").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        assert!(SchedulerConfig::from_json(r#"{"core_pool_size": 0}"#).is_err());
    }
}
