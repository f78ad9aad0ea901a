/*!
 * Log Rendering
 * Plain-text and HTML dumps of process logs
 */

use super::entry::ProcessLog;
use crate::core::id::ProcessIdentity;
use crate::core::limits::LOG_END_MARKER;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Which tier of the logger to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    Active,
    Archived,
}

impl LogSource {
    pub fn title(self) -> &'static str {
        match self {
            LogSource::Active => "Active",
            LogSource::Archived => "Archived",
        }
    }
}

pub fn text(active: &[ProcessLog], archived: &[ProcessLog]) -> String {
    let mut out = String::new();
    text_section(&mut out, LogSource::Active, active);
    out.push('\n');
    text_section(&mut out, LogSource::Archived, archived);
    out
}

fn text_section(out: &mut String, source: LogSource, logs: &[ProcessLog]) {
    let title = source.title();
    let _ = writeln!(out, "Start {title} Process Log");
    if logs.is_empty() {
        let _ = writeln!(out, "-- The {title} Process Log is Empty.");
        return;
    }
    for log in logs {
        let _ = writeln!(
            out,
            "ProcessLog[id={}; process={}]:",
            log.process_id(),
            log.process_name()
        );
        for entry in log.entries() {
            let _ = writeln!(out, "\t{entry}");
        }
        let _ = writeln!(out, "{LOG_END_MARKER}");
    }
}

/// One `<div>` per process inside a panel. Logs start collapsed unless
/// rendered for print.
pub fn html(sections: &[(LogSource, Vec<ProcessLog>)], for_print: bool) -> String {
    let log_class = if for_print {
        "process-log"
    } else {
        "process-log collapsed"
    };
    let mut out = String::from("<div class='process-panel'>");
    for (source, logs) in sections {
        let _ = write!(out, "<h3>The {} Process Log</h3>", source.title());
        if logs.is_empty() {
            let _ = write!(out, "<p class='empty'>The {} Process Log is Empty.</p>", source.title());
            continue;
        }
        for log in logs {
            let _ = write!(
                out,
                "<div class='{log_class}'><span class='caption'>{}:</span><ul>",
                escape(log.process_name())
            );
            for entry in log.entries() {
                let _ = write!(out, "<li>{}</li>", escape(&entry.to_string()));
            }
            out.push_str("</ul></div>");
        }
    }
    out.push_str("</div>");
    out
}

/// Standalone HTML document around `body`
pub fn html_document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset='utf-8'>\n<title>{} Log</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        escape(title),
        body
    )
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
