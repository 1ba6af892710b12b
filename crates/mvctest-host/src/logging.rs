//! Structured logging for the host and the test harness.
//!
//! Every component logs through a [`Logger`] obtained from the
//! [`LoggerFactory`] registered in the service registry. Entries carry a
//! target (the component name) and up to 16 structured fields.
//!
//! # Usage
//!
//! ```
//! use mvctest_host::logging::{LogConfig, LogLevel, LoggerFactory};
//!
//! let factory = LoggerFactory::new(LogConfig::development());
//! let logger = factory.logger("mvctest::application");
//!
//! logger.info("snapshot published");
//! logger.debug_with_fields("route resolved", |e| {
//!     e.field("controller", "Home").field("action", "Index")
//! });
//! ```
//!
//! # JSON Output Schema
//!
//! ```json
//! {
//!     "timestamp_ns": 1700000000000000000,
//!     "level": "info",
//!     "message": "snapshot published",
//!     "target": "mvctest::application",
//!     "fields": {
//!         "generation": "1",
//!         "routes": "2"
//!     }
//! }
//! ```
//!
//! # Test capture
//!
//! [`LogCapture`] collects entries in memory instead of writing them to
//! stderr, which lets tests assert on what a component logged.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Log levels, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Most verbose, for detailed debugging.
    Trace = 0,
    /// Debug information, not shown by default.
    Debug = 1,
    /// General information about normal operation.
    Info = 2,
    /// Something unexpected but recoverable.
    Warn = 3,
    /// An error that affected the operation being logged.
    Error = 4,
}

impl LogLevel {
    /// Returns the level as a lowercase string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Returns a single character representation.
    #[must_use]
    pub const fn as_char(&self) -> char {
        match self {
            Self::Trace => 'T',
            Self::Debug => 'D',
            Self::Info => 'I',
            Self::Warn => 'W',
            Self::Error => 'E',
        }
    }

    const fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Trace,
            1 => Self::Debug,
            2 => Self::Info,
            3 => Self::Warn,
            _ => Self::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maximum structured fields carried by a single entry.
pub const MAX_FIELDS: usize = 16;

/// A structured log entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// The log level.
    pub level: LogLevel,
    /// The log message.
    pub message: String,
    /// Component that produced the entry.
    pub target: Option<String>,
    /// Structured key-value fields (max 16).
    pub fields: Vec<(String, String)>,
    /// Wall-clock timestamp in nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
}

impl LogEntry {
    /// Creates a new log entry stamped with the current time.
    #[must_use]
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        let timestamp_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64);
        Self {
            level,
            message: message.into(),
            target: None,
            fields: Vec::new(),
            timestamp_ns,
        }
    }

    /// Sets the target component.
    #[must_use]
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Adds a structured field.
    ///
    /// Fields beyond [`MAX_FIELDS`] are silently dropped.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        if self.fields.len() < MAX_FIELDS {
            self.fields.push((key.into(), value.to_string()));
        }
        self
    }

    /// Returns the value of a structured field, if present.
    #[must_use]
    pub fn field_value(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Formats the log entry as a single JSON line.
    #[must_use]
    pub fn to_json(&self) -> String {
        let mut json = format!(
            r#"{{"timestamp_ns":{},"level":"{}","message":"{}""#,
            self.timestamp_ns,
            self.level,
            escape_json(&self.message),
        );

        if let Some(ref target) = self.target {
            json.push_str(&format!(r#","target":"{}""#, escape_json(target)));
        }

        if !self.fields.is_empty() {
            json.push_str(r#","fields":{"#);
            for (i, (k, v)) in self.fields.iter().enumerate() {
                if i > 0 {
                    json.push(',');
                }
                json.push_str(&format!(r#""{}":"{}""#, escape_json(k), escape_json(v)));
            }
            json.push('}');
        }

        json.push('}');
        json
    }

    /// Formats the log entry in compact format.
    #[must_use]
    pub fn to_compact(&self) -> String {
        let mut output = format!("[{}]", self.level.as_char());
        if let Some(ref target) = self.target {
            output.push(' ');
            output.push_str(target);
            output.push(':');
        }
        output.push(' ');
        output.push_str(&self.message);

        if !self.fields.is_empty() {
            output.push_str(" {");
            for (i, (k, v)) in self.fields.iter().enumerate() {
                if i > 0 {
                    output.push_str(", ");
                }
                output.push_str(&format!("{k}={v}"));
            }
            output.push('}');
        }

        output
    }
}

/// Escapes a string for JSON output.
fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to emit.
    pub min_level: LogLevel,
    /// Whether to output JSON (true) or compact format (false).
    pub json_output: bool,
    /// Whether to include the target component.
    pub include_target: bool,
    /// Maximum number of structured fields per log entry.
    pub max_fields: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            json_output: true,
            include_target: true,
            max_fields: MAX_FIELDS,
        }
    }
}

impl LogConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum log level.
    #[must_use]
    pub fn level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets JSON or compact output.
    #[must_use]
    pub fn json_output(mut self, json: bool) -> Self {
        self.json_output = json;
        self
    }

    /// Sets whether to include the target component.
    #[must_use]
    pub fn include_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Sets the maximum number of structured fields.
    #[must_use]
    pub fn max_fields(mut self, max: usize) -> Self {
        self.max_fields = max.min(MAX_FIELDS);
        self
    }

    /// Verbose, human-readable output.
    #[must_use]
    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            json_output: false,
            include_target: true,
            max_fields: MAX_FIELDS,
        }
    }

    /// JSON output at info level.
    #[must_use]
    pub fn production() -> Self {
        Self {
            min_level: LogLevel::Info,
            json_output: true,
            include_target: true,
            max_fields: MAX_FIELDS,
        }
    }

    /// Everything, as JSON. Meant to be combined with [`LogCapture`].
    #[must_use]
    pub fn testing() -> Self {
        Self {
            min_level: LogLevel::Trace,
            json_output: true,
            include_target: true,
            max_fields: MAX_FIELDS,
        }
    }
}

// ============================================================================
// Global level gate
// ============================================================================

static GLOBAL_LOG_LEVEL: AtomicUsize = AtomicUsize::new(LogLevel::Info as usize);

/// Returns the process-wide minimum level.
#[inline]
#[must_use]
pub fn global_log_level() -> LogLevel {
    LogLevel::from_index(GLOBAL_LOG_LEVEL.load(Ordering::Relaxed))
}

/// Sets the process-wide minimum level.
pub fn set_global_log_level(level: LogLevel) {
    GLOBAL_LOG_LEVEL.store(level as usize, Ordering::Relaxed);
}

/// Returns true if `level` passes the process-wide gate.
#[inline]
#[must_use]
pub fn level_enabled(level: LogLevel) -> bool {
    level >= global_log_level()
}

// ============================================================================
// Sinks
// ============================================================================

/// In-memory log collector.
#[derive(Debug, Clone, Default)]
pub struct LogCapture {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogCapture {
    /// Creates an empty capture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the captured entries.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Returns true if any captured entry has the given message.
    #[must_use]
    pub fn contains_message(&self, message: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message == message)
    }

    /// Number of captured entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops all captured entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn push(&self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}

#[derive(Debug, Clone)]
enum LogSink {
    Stderr,
    Null,
    Capture(LogCapture),
}

// ============================================================================
// Loggers
// ============================================================================

/// Logger bound to a target component.
#[derive(Debug, Clone)]
pub struct Logger {
    target: String,
    config: LogConfig,
    sink: LogSink,
}

impl Logger {
    /// Creates a stderr logger for `target`.
    #[must_use]
    pub fn new(target: impl Into<String>, config: LogConfig) -> Self {
        Self {
            target: target.into(),
            config,
            sink: LogSink::Stderr,
        }
    }

    /// Returns the target component.
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target
    }

    /// Checks if a level would be emitted.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        match self.sink {
            LogSink::Null => false,
            // Captures ignore the global gate so tests see everything they asked for.
            LogSink::Capture(_) => level >= self.config.min_level,
            LogSink::Stderr => level >= self.config.min_level && level_enabled(level),
        }
    }

    /// Emits an entry if its level is enabled.
    pub fn emit(&self, mut entry: LogEntry) {
        if !self.is_enabled(entry.level) {
            return;
        }
        if entry.target.is_none() && self.config.include_target {
            entry.target = Some(self.target.clone());
        }
        entry.fields.truncate(self.config.max_fields);

        match &self.sink {
            LogSink::Null => {}
            LogSink::Capture(capture) => capture.push(entry),
            LogSink::Stderr => {
                let output = if self.config.json_output {
                    entry.to_json()
                } else {
                    entry.to_compact()
                };
                eprintln!("{output}");
            }
        }
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        if self.is_enabled(level) {
            self.emit(LogEntry::new(level, message));
        }
    }

    fn log_with_fields<F>(&self, level: LogLevel, message: impl Into<String>, f: F)
    where
        F: FnOnce(LogEntry) -> LogEntry,
    {
        if self.is_enabled(level) {
            self.emit(f(LogEntry::new(level, message)));
        }
    }

    /// Logs at trace level.
    pub fn trace(&self, message: impl Into<String>) {
        self.log(LogLevel::Trace, message);
    }

    /// Logs at debug level.
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    /// Logs at info level.
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    /// Logs at warn level.
    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    /// Logs at error level.
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Logs at trace level with structured fields.
    pub fn trace_with_fields<F>(&self, message: impl Into<String>, f: F)
    where
        F: FnOnce(LogEntry) -> LogEntry,
    {
        self.log_with_fields(LogLevel::Trace, message, f);
    }

    /// Logs at debug level with structured fields.
    pub fn debug_with_fields<F>(&self, message: impl Into<String>, f: F)
    where
        F: FnOnce(LogEntry) -> LogEntry,
    {
        self.log_with_fields(LogLevel::Debug, message, f);
    }

    /// Logs at info level with structured fields.
    pub fn info_with_fields<F>(&self, message: impl Into<String>, f: F)
    where
        F: FnOnce(LogEntry) -> LogEntry,
    {
        self.log_with_fields(LogLevel::Info, message, f);
    }

    /// Logs at warn level with structured fields.
    pub fn warn_with_fields<F>(&self, message: impl Into<String>, f: F)
    where
        F: FnOnce(LogEntry) -> LogEntry,
    {
        self.log_with_fields(LogLevel::Warn, message, f);
    }

    /// Logs at error level with structured fields.
    pub fn error_with_fields<F>(&self, message: impl Into<String>, f: F)
    where
        F: FnOnce(LogEntry) -> LogEntry,
    {
        self.log_with_fields(LogLevel::Error, message, f);
    }
}

/// Hands out [`Logger`]s sharing one configuration and sink.
///
/// Registered in every service registry as the baseline logging service.
#[derive(Debug, Clone)]
pub struct LoggerFactory {
    config: LogConfig,
    sink: LogSink,
}

impl Default for LoggerFactory {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl LoggerFactory {
    /// Factory whose loggers write to stderr.
    #[must_use]
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            sink: LogSink::Stderr,
        }
    }

    /// Factory whose loggers discard everything.
    #[must_use]
    pub fn null() -> Self {
        Self {
            config: LogConfig::default(),
            sink: LogSink::Null,
        }
    }

    /// Factory whose loggers append to `capture`.
    #[must_use]
    pub fn capturing(config: LogConfig, capture: LogCapture) -> Self {
        Self {
            config,
            sink: LogSink::Capture(capture),
        }
    }

    /// Returns the shared configuration.
    #[must_use]
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Creates a logger for `target`.
    #[must_use]
    pub fn logger(&self, target: impl Into<String>) -> Logger {
        Logger {
            target: target.into(),
            config: self.config.clone(),
            sink: self.sink.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn log_entry_json_escapes_and_includes_fields() {
        let entry = LogEntry::new(LogLevel::Info, "say \"hi\"\n")
            .target("mvctest::resolver")
            .field("route", "default");
        let json = entry.to_json();
        assert!(json.contains(r#""level":"info""#));
        assert!(json.contains(r#""message":"say \"hi\"\n""#));
        assert!(json.contains(r#""target":"mvctest::resolver""#));
        assert!(json.contains(r#""fields":{"route":"default"}"#));
    }

    #[test]
    fn log_entry_compact_format() {
        let entry = LogEntry::new(LogLevel::Warn, "frozen")
            .target("validity")
            .field("type", "Home")
            .field("count", 2);
        assert_eq!(entry.to_compact(), "[W] validity: frozen {type=Home, count=2}");
    }

    #[test]
    fn fields_are_capped() {
        let mut entry = LogEntry::new(LogLevel::Debug, "many");
        for i in 0..40 {
            entry = entry.field(format!("k{i}"), i);
        }
        assert_eq!(entry.fields.len(), MAX_FIELDS);
        assert_eq!(entry.field_value("k3"), Some("3"));
        assert_eq!(entry.field_value("k30"), None);
    }

    #[test]
    fn capture_respects_min_level_and_fills_target() {
        let capture = LogCapture::new();
        let factory =
            LoggerFactory::capturing(LogConfig::testing().level(LogLevel::Info), capture.clone());
        let logger = factory.logger("mvctest::application");

        logger.debug("hidden");
        logger.info_with_fields("published", |e| e.field("generation", 1));

        let entries = capture.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "published");
        assert_eq!(entries[0].target.as_deref(), Some("mvctest::application"));
        assert_eq!(entries[0].field_value("generation"), Some("1"));
    }

    #[test]
    fn null_factory_discards() {
        let logger = LoggerFactory::null().logger("x");
        assert!(!logger.is_enabled(LogLevel::Error));
        logger.error("nothing happens");
    }
}
