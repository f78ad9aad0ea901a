/*!
 * Logging Module
 * Per-process log store, its renderers and output handlers
 */

pub mod entry;
pub mod flusher;
pub mod level;
pub mod logger;
pub mod output;
pub mod render;

pub use entry::{ActiveProcessLog, LogEntry, ProcessLog};
pub use flusher::LogFlusher;
pub use level::LogLevel;
pub use logger::ProcessLogger;
pub use output::{FileLogOutput, LogOutput, LogOutputHandler, ServerLogOutput};
pub use render::LogSource;
