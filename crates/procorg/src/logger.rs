//! Warning and error sink used by the registry.
//!
//! The registry never panics or returns errors from its operations; it reports
//! through a [`RegistryLogger`] handed to it at construction. The default
//! [`TracingLogger`] forwards to `tracing`, so installing any subscriber is
//! enough to see the messages.

use std::sync::{Arc, Mutex};

/// Collaborator receiving the registry's warnings and errors.
pub trait RegistryLogger: Send + Sync {
    /// Report a recoverable condition, e.g. an unknown process name.
    fn warn(&self, message: &str);

    /// Report a failure, e.g. an executable that could not be launched.
    fn error(&self, message: &str);
}

/// Forwards registry messages to `tracing` under the `procorg` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl RegistryLogger for TracingLogger {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "procorg", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "procorg", "{}", message);
    }
}

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Emitted through [`RegistryLogger::warn`]
    Warn,
    /// Emitted through [`RegistryLogger::error`]
    Error,
}

/// A single message captured by [`MemoryLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity the message was reported at
    pub level: LogLevel,
    /// Message text
    pub message: String,
}

/// Keeps every message in memory.
///
/// Cloning shares the underlying buffer, so a clone can be handed to the
/// registry while the original is kept for inspection.
///
/// ```rust
/// use procorg::{MemoryLogger, RegistryLogger};
///
/// let logger = MemoryLogger::new();
/// logger.warn("process named x does not exist");
/// assert_eq!(logger.warnings().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryLogger {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemoryLogger {
    /// Create an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in the order they were reported.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Messages reported at warning severity.
    pub fn warnings(&self) -> Vec<String> {
        self.messages_at(LogLevel::Warn)
    }

    /// Messages reported at error severity.
    pub fn errors(&self) -> Vec<String> {
        self.messages_at(LogLevel::Error)
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.lock() {
            records.clear();
        }
    }

    fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|record| record.level == level)
            .map(|record| record.message)
            .collect()
    }

    fn push(&self, level: LogLevel, message: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                message: message.to_string(),
            });
        }
    }
}

impl RegistryLogger for MemoryLogger {
    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}
