//! Line-oriented run logging.
//!
//! The engine reports through a `RunLogger` so the CLI, tests, or any other
//! host can decide how log lines are rendered.

use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

pub trait RunLogger {
    fn log(&self, level: LogLevel, message: &str);

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Timestamped stderr logger used by the CLI.
#[derive(Default)]
pub struct ConsoleLogger;

impl RunLogger for ConsoleLogger {
    fn log(&self, level: LogLevel, message: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        eprintln!("[{timestamp}] [{level}] {message}");
    }
}

/// Discards everything.
#[derive(Default)]
pub struct NullLogger;

impl RunLogger for NullLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Captures log lines for assertions in tests.
#[derive(Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().expect("logger poisoned").clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(level, _)| *level == LogLevel::Warn)
            .map(|(_, msg)| msg)
            .collect()
    }
}

impl RunLogger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        self.lines
            .lock()
            .expect("logger poisoned")
            .push((level, message.to_string()));
    }
}
