/*!
 * Log Output Handlers
 *
 * A handler is a process (logging disabled) whose body renders the logger's
 * content to a sink. When given a periodic schedule it is run by the log
 * flusher at that cadence.
 */

use super::logger::ProcessLogger;
use super::render::{self, LogSource};
use crate::core::clock;
use crate::core::config::LogOutputConfig;
use crate::core::errors::{LoggerError, LoggerResult};
use crate::core::limits::{DEFAULT_LOG_SUBDIR, MAX_FILE_SUFFIX};
use crate::process::{ProcessContext, ProcessTask, ScheduledProcess};
use crate::schedule::{Interval, ProcessSchedule, TimeInterval, TimeSchedule};
use parking_lot::RwLock;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{info, warn};

/// Sink for rendered process logs
pub trait LogOutput: Send + Sync {
    fn write(&self, logger: &ProcessLogger, handler_name: &str) -> LoggerResult<()>;
}

/// Writes the text dump into the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerLogOutput;

impl LogOutput for ServerLogOutput {
    fn write(&self, logger: &ProcessLogger, handler_name: &str) -> LoggerResult<()> {
        info!(handler = handler_name, "Process log flush:\n{}", logger.render_text());
        Ok(())
    }
}

/// Writes one file per flush: `<prefix>_<YYYY_MM_DD_HHMMSS>[_n].log|.html`
#[derive(Debug, Clone, Default)]
pub struct FileLogOutput {
    directory: Option<PathBuf>,
    prefix: Option<String>,
    html: bool,
}

impl FileLogOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_html(mut self, html: bool) -> Self {
        self.html = html;
        self
    }

    fn prefix(&self, handler_name: &str) -> String {
        let raw = self.prefix.as_deref().unwrap_or(handler_name);
        let safe = file_safe(raw);
        if safe.is_empty() {
            "process_log".to_string()
        } else {
            safe
        }
    }

    fn directory(&self, prefix: &str) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOG_SUBDIR).join(prefix))
    }

    /// First free file name for a flush at the current time
    pub fn resolve_path(&self, handler_name: &str) -> LoggerResult<PathBuf> {
        let prefix = self.prefix(handler_name);
        let directory = self.directory(&prefix);
        fs::create_dir_all(&directory)?;

        let stem = format!("{prefix}_{}", clock::format_file_stamp(clock::now()));
        let extension = if self.html { "html" } else { "log" };
        let candidate = directory.join(format!("{stem}.{extension}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
        (1..=MAX_FILE_SUFFIX)
            .map(|n| directory.join(format!("{stem}_{n}.{extension}")))
            .find(|path| !path.exists())
            .ok_or_else(|| LoggerError::Io(format!("no free file name for {stem} in {}", directory.display())))
    }
}

impl LogOutput for FileLogOutput {
    fn write(&self, logger: &ProcessLogger, handler_name: &str) -> LoggerResult<()> {
        let path = self.resolve_path(handler_name)?;
        let content = if self.html {
            render::html_document(
                handler_name,
                &logger.render_html(true, &[LogSource::Active, LogSource::Archived]),
            )
        } else {
            logger.render_text()
        };
        write_new(&path, &content)?;
        info!(handler = handler_name, path = %path.display(), "Process log written");
        Ok(())
    }
}

fn write_new(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(content.as_bytes())?;
    file.flush()
}

/// Lowercase alphanumerics; everything else collapses to single underscores
fn file_safe(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

struct HandlerBinding {
    name: String,
    output: Box<dyn LogOutput>,
    clear_log: bool,
    logger: RwLock<Weak<ProcessLogger>>,
}

impl HandlerBinding {
    fn flush(&self) -> LoggerResult<()> {
        let logger = self.logger.read().upgrade().ok_or(LoggerError::Unbound)?;
        if logger.is_empty() {
            return Ok(());
        }
        self.output.write(&logger, &self.name)?;
        if self.clear_log {
            logger.clear_flushed();
        }
        Ok(())
    }
}

/// Output handler process plus its sink
#[derive(Clone)]
pub struct LogOutputHandler {
    process: Arc<ScheduledProcess>,
    binding: Arc<HandlerBinding>,
}

impl LogOutputHandler {
    /// `interval` makes the handler periodic; `clear_log` drops flushed logs
    pub fn new(
        name: impl Into<String>,
        output: impl LogOutput + 'static,
        interval: Option<TimeInterval>,
        clear_log: bool,
    ) -> Self {
        let name = name.into();
        let binding = Arc::new(HandlerBinding {
            name: name.clone(),
            output: Box::new(output),
            clear_log,
            logger: RwLock::new(Weak::new()),
        });

        let body_binding = binding.clone();
        let schedule = interval
            .map(|interval| ProcessSchedule::periodic(TimeSchedule::new(interval)))
            .unwrap_or_default();
        let process = ScheduledProcess::builder(name.clone())
            .with_logging(false)
            .with_schedule(schedule)
            .body(move |ctx: &ProcessContext<'_>| {
                body_binding.flush().map_err(|e| {
                    ctx.process().stop_schedule();
                    anyhow::Error::new(e)
                })
            })
            .build();

        let process = match process {
            Ok(process) => process,
            Err(e) => {
                // Only reachable with a blank name
                warn!(error = %e, "Invalid log handler name, using default");
                return Self::new("Process Log Output", ServerLogOutput, None, clear_log);
            }
        };
        Self { process, binding }
    }

    pub fn server(interval: Option<TimeInterval>) -> Self {
        Self::new("Process Log Server Output", ServerLogOutput, interval, true)
    }

    pub fn file(output: FileLogOutput, interval: Option<TimeInterval>) -> Self {
        Self::new("Process Log File Output", output, interval, true)
    }

    pub fn from_config(config: &LogOutputConfig, flush_interval: Option<Duration>) -> Self {
        let interval = flush_interval.and_then(|every| {
            let secs = u32::try_from(every.as_secs()).unwrap_or(u32::MAX);
            TimeInterval::new(Interval::Seconds, secs).ok()
        });
        match config {
            LogOutputConfig::Server { clear_log } => {
                Self::new("Process Log Server Output", ServerLogOutput, interval, *clear_log)
            }
            LogOutputConfig::File {
                directory,
                prefix,
                html,
                clear_log,
            } => {
                let output = FileLogOutput {
                    directory: directory.clone(),
                    prefix: prefix.clone(),
                    html: *html,
                };
                Self::new("Process Log File Output", output, interval, *clear_log)
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.binding.name
    }

    pub fn process(&self) -> &Arc<ScheduledProcess> {
        &self.process
    }

    pub fn is_periodic(&self) -> bool {
        self.process.with_schedule(|s| s.has_periodic())
    }

    pub(crate) fn bind(&self, logger: &Arc<ProcessLogger>) {
        *self.binding.logger.write() = Arc::downgrade(logger);
    }

    /// Run one flush on the calling thread
    pub fn flush_now(&self) -> LoggerResult<()> {
        let task = ProcessTask::new(self.process.clone(), Duration::ZERO);
        match task.run() {
            None => Ok(()),
            Some(e) => Err(LoggerError::Render(e.describe())),
        }
    }
}

impl fmt::Debug for LogOutputHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogOutputHandler")
            .field("name", &self.binding.name)
            .field("clear_log", &self.binding.clear_log)
            .field("periodic", &self.is_periodic())
            .finish()
    }
}
