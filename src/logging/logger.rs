/*!
 * Process Logger
 *
 * Two-tier per-process log store. Each run writes to an active log that is
 * closed when the run completes; closing copies the entries into the
 * process's archived log. Active logs are evicted by age and by count.
 */

use super::entry::{ActiveProcessLog, LogEntry, ProcessLog};
use super::level::LogLevel;
use super::output::LogOutputHandler;
use super::render::{self, LogSource};
use crate::core::clock;
use crate::core::config::LoggerConfig;
use crate::core::id::{ProcessIdentity, ProcessKey};
use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, info};

#[derive(Default)]
struct LoggerState {
    active: AHashMap<ProcessKey, ActiveProcessLog>,
    archived: AHashMap<ProcessKey, ProcessLog>,
    max_processes: Option<usize>,
    max_age_days: Option<u32>,
}

impl LoggerState {
    /// Close an active log and append its entries to the archive
    fn close(&mut self, key: &ProcessKey) {
        let Some(active) = self.active.get_mut(key) else {
            return;
        };
        let Some(entries) = active.close() else {
            return;
        };
        let entries = entries.to_vec();
        let log = active.log();
        self.archived
            .entry(key.clone())
            .or_insert_with(|| ProcessLog::new(log.process_id().clone(), log.process_name()))
            .extend(entries);
    }

    fn clear(&mut self, key: &ProcessKey) {
        self.close(key);
        self.active.remove(key);
    }

    fn evict(&mut self, now: OffsetDateTime) {
        if let Some(max_age) = self.max_age_days {
            let stale: Vec<ProcessKey> = self
                .active
                .iter()
                .filter(|(_, log)| log.log().age_days(now) > i64::from(max_age))
                .map(|(key, _)| key.clone())
                .collect();
            for key in stale {
                debug!(process = %key, "Evicting stale process log");
                self.clear(&key);
            }
        }

        if let Some(max) = self.max_processes {
            if self.active.len() > max {
                let mut by_age: Vec<(Option<OffsetDateTime>, ProcessKey)> = self
                    .active
                    .iter()
                    .map(|(key, log)| (log.log().last_entry(), key.clone()))
                    .collect();
                by_age.sort();
                let excess = self.active.len() - max;
                for (_, key) in by_age.into_iter().take(excess) {
                    debug!(process = %key, "Evicting process log over budget");
                    self.clear(&key);
                }
            }
        }
    }
}

/// Per-process log store shared by a scheduler and its processes
pub struct ProcessLogger {
    state: Mutex<LoggerState>,
    output: RwLock<Option<LogOutputHandler>>,
}

impl ProcessLogger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LoggerState::default()),
            output: RwLock::new(None),
        }
    }

    /// Logger with limits and output handler taken from `config`
    pub fn from_config(config: &LoggerConfig) -> Arc<Self> {
        let logger = Arc::new(Self::new());
        logger.set_limits(config.max_processes, config.max_age_days);
        if let Some(output) = &config.output {
            logger.set_output_handler(Some(LogOutputHandler::from_config(
                output,
                config.flush_interval(),
            )));
        }
        logger
    }

    /// `None` disables the respective limit
    pub fn set_limits(&self, max_processes: Option<usize>, max_age_days: Option<u32>) {
        let mut state = self.state.lock();
        state.max_processes = max_processes;
        state.max_age_days = max_age_days;
        state.evict(clock::now());
    }

    pub fn max_processes(&self) -> Option<usize> {
        self.state.lock().max_processes
    }

    pub fn max_age_days(&self) -> Option<u32> {
        self.state.lock().max_age_days
    }

    /// Attach (or detach) the handler run by the periodic flush
    pub fn set_output_handler(self: &Arc<Self>, handler: Option<LogOutputHandler>) {
        if let Some(handler) = &handler {
            handler.bind(self);
        }
        *self.output.write() = handler;
    }

    pub fn output_handler(&self) -> Option<LogOutputHandler> {
        self.output.read().clone()
    }

    /// Append to the process's active log, opening it on first write.
    /// Blank messages and writes to a closed log are dropped.
    pub fn log<P>(&self, process: &P, level: LogLevel, message: &str)
    where
        P: ProcessIdentity + ?Sized,
    {
        let message = message.trim_end();
        if message.trim().is_empty() {
            return;
        }
        let mut state = self.state.lock();
        state
            .active
            .entry(process.process_key())
            .or_insert_with(|| {
                ActiveProcessLog::open(process.process_id().clone(), process.process_name())
            })
            .append(LogEntry::new(level, message));
    }

    pub fn log_fmt<P>(&self, process: &P, level: LogLevel, args: fmt::Arguments<'_>)
    where
        P: ProcessIdentity + ?Sized,
    {
        self.log(process, level, &args.to_string());
    }

    /// Freeze the process's active log and archive its entries
    pub fn close_log<P: ProcessIdentity + ?Sized>(&self, process: &P) {
        let mut state = self.state.lock();
        state.close(&process.process_key());
        state.evict(clock::now());
    }

    /// Close (if open) and drop the process's active log
    pub fn clear_log<P: ProcessIdentity + ?Sized>(&self, process: &P) {
        let mut state = self.state.lock();
        state.clear(&process.process_key());
        state.evict(clock::now());
    }

    /// Drop everything
    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        state.active.clear();
        state.archived.clear();
    }

    /// Drop archived logs and closed active logs, keeping logs of runs in flight
    pub fn clear_flushed(&self) {
        let mut state = self.state.lock();
        state.archived.clear();
        state.active.retain(|_, log| !log.is_closed());
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.active.is_empty() && state.archived.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn archived_count(&self) -> usize {
        self.state.lock().archived.len()
    }

    pub fn active_entries<P: ProcessIdentity + ?Sized>(&self, process: &P) -> Vec<LogEntry> {
        self.state
            .lock()
            .active
            .get(&process.process_key())
            .map(|log| log.log().entries().to_vec())
            .unwrap_or_default()
    }

    pub fn archived_entries<P: ProcessIdentity + ?Sized>(&self, process: &P) -> Vec<LogEntry> {
        self.state
            .lock()
            .archived
            .get(&process.process_key())
            .map(|log| log.entries().to_vec())
            .unwrap_or_default()
    }

    /// Copies of the logs from `source`, sorted by process name
    pub fn snapshot(&self, source: LogSource) -> Vec<ProcessLog> {
        let state = self.state.lock();
        let mut logs: Vec<ProcessLog> = match source {
            LogSource::Active => state.active.values().map(|l| l.log().clone()).collect(),
            LogSource::Archived => state.archived.values().cloned().collect(),
        };
        logs.sort_by(|a, b| {
            a.process_name()
                .to_lowercase()
                .cmp(&b.process_name().to_lowercase())
        });
        logs
    }

    /// Plain-text dump of active then archived logs
    pub fn render_text(&self) -> String {
        render::text(
            &self.snapshot(LogSource::Active),
            &self.snapshot(LogSource::Archived),
        )
    }

    /// HTML panel of the selected sources
    pub fn render_html(&self, for_print: bool, sources: &[LogSource]) -> String {
        let sections: Vec<(LogSource, Vec<ProcessLog>)> = sources
            .iter()
            .map(|source| (*source, self.snapshot(*source)))
            .collect();
        render::html(&sections, for_print)
    }

    /// Write the text dump to the tracing log
    pub fn dump(&self) {
        if self.is_empty() {
            return;
        }
        info!("Process log dump:\n{}", self.render_text());
    }
}

impl Default for ProcessLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ProcessLogger")
            .field("active", &state.active.len())
            .field("archived", &state.archived.len())
            .field("max_processes", &state.max_processes)
            .field("max_age_days", &state.max_age_days)
            .finish()
    }
}
