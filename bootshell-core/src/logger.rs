//! Human-facing narration of what the shell is doing.
//!
//! The shell never makes control-flow decisions based on the logger; it only
//! reports directory changes, echoes commands and surfaces errors.

use chrono::Utc;
use std::io::Write;
use std::sync::{Arc, Mutex};

pub trait Logger: Send + Sync {
    /// Informational notice, e.g. a directory change.
    fn comment(&self, message: &str);

    /// Echo of a command about to run.
    fn prompt(&self, message: &str);

    fn error(&self, message: &str);

    /// Raw output line, e.g. a line of a command's output in debug mode.
    fn printf(&self, message: &str);
}

impl<L: Logger + ?Sized> Logger for Arc<L> {
    fn comment(&self, message: &str) {
        (**self).comment(message)
    }

    fn prompt(&self, message: &str) {
        (**self).prompt(message)
    }

    fn error(&self, message: &str) {
        (**self).error(message)
    }

    fn printf(&self, message: &str) {
        (**self).printf(message)
    }
}

/// Routes narration into `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn comment(&self, message: &str) {
        tracing::info!(target: "bootshell::comment", "{}", message);
    }

    fn prompt(&self, message: &str) {
        tracing::info!(target: "bootshell::prompt", "$ {}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "bootshell::error", "{}", message);
    }

    fn printf(&self, message: &str) {
        tracing::info!(target: "bootshell::output", "{}", message);
    }
}

/// Writes timestamped lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLogger;

impl StderrLogger {
    fn write_line(&self, prefix: &str, message: &str) {
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S %Z");
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{} {}{}", now, prefix, message);
    }
}

impl Logger for StderrLogger {
    fn comment(&self, message: &str) {
        self.write_line("# ", message);
    }

    fn prompt(&self, message: &str) {
        self.write_line("$ ", message);
    }

    fn error(&self, message: &str) {
        self.write_line("🚨 Error: ", message);
    }

    fn printf(&self, message: &str) {
        self.write_line("", message);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Comment,
    Prompt,
    Error,
    Printf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub kind: LogKind,
    pub message: String,
}

/// Keeps every line in memory. Useful for embedding the shell and in tests.
#[derive(Debug, Default)]
pub struct BufferLogger {
    lines: Mutex<Vec<LogLine>>,
}

impl BufferLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Messages of a single kind, in order.
    pub fn messages(&self, kind: LogKind) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.kind == kind)
            .map(|line| line.message)
            .collect()
    }

    fn push(&self, kind: LogKind, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(LogLine {
                kind,
                message: message.to_string(),
            });
        }
    }
}

impl Logger for BufferLogger {
    fn comment(&self, message: &str) {
        self.push(LogKind::Comment, message);
    }

    fn prompt(&self, message: &str) {
        self.push(LogKind::Prompt, message);
    }

    fn error(&self, message: &str) {
        self.push(LogKind::Error, message);
    }

    fn printf(&self, message: &str) {
        self.push(LogKind::Printf, message);
    }
}
