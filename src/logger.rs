use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Default number of entries kept in memory by a [`Logger`]
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Log level enum for type-safe logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Warn,
            3 => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// Log entry with optional structured context
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Component that emitted the entry, e.g. `pipeline::stage`
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, serde_json::Value>>,
}

/// Simple circular buffer for fixed-size log storage
struct CircularBuffer {
    buffer: Vec<LogEntry>,
    head: usize,
    capacity: usize,
}

impl CircularBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY)),
            head: 0,
            capacity,
        }
    }

    fn push(&mut self, item: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() < self.capacity {
            self.buffer.push(item);
        } else {
            self.buffer[self.head] = item;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    fn to_vec(&self) -> Vec<LogEntry> {
        // Return items in chronological order
        let mut result = Vec::with_capacity(self.buffer.len());
        result.extend_from_slice(&self.buffer[self.head..]);
        result.extend_from_slice(&self.buffer[..self.head]);
        result
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.head = 0;
    }
}

/// Observability handle passed explicitly to stages, steps and hooks
///
/// Every entry is forwarded to `tracing` and also kept in a bounded in-memory
/// buffer, so a run can be inspected afterwards without a global subscriber.
/// Clones share the same buffer.
#[derive(Clone)]
pub struct Logger {
    buffer: Arc<Mutex<CircularBuffer>>,
    min_level: Arc<AtomicU8>,
}

impl Logger {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(CircularBuffer::new(capacity))),
            min_level: Arc::new(AtomicU8::new(LogLevel::Debug as u8)),
        }
    }

    /// Log with enum level
    pub fn log(&self, level: LogLevel, message: &str, source: &str) {
        self.push(level, message, source, None);
    }

    /// Log with context (structured logging)
    pub fn log_with_context(
        &self,
        level: LogLevel,
        message: &str,
        source: &str,
        context: HashMap<String, serde_json::Value>,
    ) {
        self.push(level, message, source, Some(context));
    }

    pub fn debug(&self, source: &str, message: &str) {
        self.log(LogLevel::Debug, message, source);
    }

    pub fn info(&self, source: &str, message: &str) {
        self.log(LogLevel::Info, message, source);
    }

    pub fn warn(&self, source: &str, message: &str) {
        self.log(LogLevel::Warn, message, source);
    }

    pub fn error(&self, source: &str, message: &str) {
        self.log(LogLevel::Error, message, source);
    }

    fn push(
        &self,
        level: LogLevel,
        message: &str,
        source: &str,
        context: Option<HashMap<String, serde_json::Value>>,
    ) {
        if (level as u8) < self.min_level.load(Ordering::Relaxed) {
            return;
        }

        match level {
            LogLevel::Debug => tracing::debug!(source, "{}", message),
            LogLevel::Info => tracing::info!(source, "{}", message),
            LogLevel::Warn => tracing::warn!(source, "{}", message),
            LogLevel::Error => tracing::error!(source, "{}", message),
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.to_string(),
            source: source.to_string(),
            context,
        };

        // A poisoned buffer only loses diagnostics, never the run
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.push(entry);
        }
    }

    /// Set minimum log level (runtime filtering)
    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level as u8, Ordering::Relaxed);
    }

    /// Get current minimum log level
    pub fn min_level(&self) -> LogLevel {
        LogLevel::from_u8(self.min_level.load(Ordering::Relaxed))
    }

    /// Buffered entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer
            .lock()
            .map(|buffer| buffer.to_vec())
            .unwrap_or_default()
    }

    /// Buffered entries at exactly `level`
    pub fn entries_at(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.level == level)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut buffer) = self.buffer.lock() {
            buffer.clear();
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.min_level())
            .finish()
    }
}

/// Install a `tracing` subscriber honouring `RUST_LOG`, falling back to `default_level`
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(default_level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_chronological() {
        let logger = Logger::new();
        logger.info("test", "first");
        logger.warn("test", "second");

        let entries = logger.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].level, LogLevel::Warn);
    }

    #[test]
    fn test_buffer_wraps_at_capacity() {
        let logger = Logger::with_capacity(3);
        for i in 0..5 {
            logger.info("test", &format!("message {}", i));
        }

        let messages: Vec<String> = logger.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["message 2", "message 3", "message 4"]);
    }

    #[test]
    fn test_min_level_filters() {
        let logger = Logger::new();
        logger.set_min_level(LogLevel::Warn);
        logger.info("test", "dropped");
        logger.error("test", "kept");

        assert_eq!(logger.min_level(), LogLevel::Warn);
        assert_eq!(logger.entries().len(), 1);
        assert_eq!(logger.entries_at(LogLevel::Error).len(), 1);
    }

    #[test]
    fn test_clones_share_buffer() {
        let logger = Logger::new();
        let handle = logger.clone();
        handle.debug("test", "from clone");

        assert_eq!(logger.entries().len(), 1);
        logger.clear();
        assert!(handle.entries().is_empty());
    }

    #[test]
    fn test_log_with_context() {
        let logger = Logger::new();
        let mut context = HashMap::new();
        context.insert("stage".to_string(), serde_json::json!("loading"));
        logger.log_with_context(LogLevel::Info, "stage done", "pipeline", context);

        let entry = &logger.entries()[0];
        assert_eq!(entry.context.as_ref().unwrap()["stage"], "loading");
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("verbose"), None);
    }
}
