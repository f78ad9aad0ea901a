/*!
 * Scheduler Core
 * Logger ownership and run-outcome logging shared by both schedulers
 */

use crate::core::config::LoggerConfig;
use crate::core::errors::ExecutionError;
use crate::logging::{LogFlusher, LogLevel, LogOutputHandler, ProcessLogger};
use crate::process::ScheduledProcess;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

pub(crate) struct SchedulerCore {
    logger: Arc<ProcessLogger>,
    flusher: Mutex<Option<LogFlusher>>,
}

impl SchedulerCore {
    pub fn new(config: &LoggerConfig) -> Self {
        Self {
            logger: ProcessLogger::from_config(config),
            flusher: Mutex::new(None),
        }
    }

    pub fn logger(&self) -> &Arc<ProcessLogger> {
        &self.logger
    }

    /// Swap the output handler. A running flusher is stopped (flushing once
    /// through the old handler) and restarted when `running`.
    pub fn set_output_handler(&self, handler: Option<LogOutputHandler>, running: bool) {
        let previous = self.flusher.lock().take();
        if let Some(previous) = previous {
            previous.stop();
        }
        self.logger.set_output_handler(handler);
        if running {
            self.start_log_flusher();
        }
    }

    /// Start the periodic flush if the handler is periodic and none is running
    pub fn start_log_flusher(&self) {
        let mut flusher = self.flusher.lock();
        if flusher.as_ref().is_some_and(LogFlusher::is_running) {
            return;
        }
        *flusher = self.logger.output_handler().and_then(LogFlusher::start);
    }

    /// Final flush, then drop every log
    pub fn stop_log_flusher(&self) {
        let flusher = self.flusher.lock().take();
        match flusher {
            Some(flusher) => flusher.stop(),
            None => self.flush_or_dump(),
        }
        self.logger.clear_all();
    }

    /// Run the output handler unless a flush is in progress; without a
    /// handler, dump to tracing
    pub fn dump_process_log(&self) {
        let busy = self
            .flusher
            .lock()
            .as_ref()
            .is_some_and(LogFlusher::is_executing);
        if busy {
            debug!("Log flush in progress, skipping dump");
            return;
        }
        self.flush_or_dump();
    }

    fn flush_or_dump(&self) {
        match self.logger.output_handler() {
            Some(handler) => {
                if let Err(e) = handler.flush_now() {
                    warn!(handler = handler.name(), error = %e, "Log flush failed");
                    self.logger.dump();
                }
            }
            None => self.logger.dump(),
        }
    }

    /// Write a scheduler message to the process's log when it logs
    pub fn log(&self, process: &ScheduledProcess, level: LogLevel, message: &str) {
        if process.do_log() {
            self.logger.log(process, level, message);
        }
        if level > LogLevel::Info || !process.do_log() {
            level.emit(process.id().as_str(), process.name(), message);
        }
    }

    pub fn log_outcome(&self, process: &ScheduledProcess, outcome: Option<&ExecutionError>) {
        match outcome {
            Some(err) => self.log(
                process,
                LogLevel::Warning,
                &format!("Execution Stopped because: {}", err.describe()),
            ),
            None => self.log(process, LogLevel::Info, "Execution Successfully Completed."),
        }
    }

    pub fn log_not_executed(&self, process: &ScheduledProcess) {
        warn!(
            process_id = process.id().as_str(),
            process = process.name(),
            "{} was not executed",
            process.name()
        );
    }
}
