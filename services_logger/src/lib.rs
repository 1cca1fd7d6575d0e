//! # Logger Service
//!
//! This crate implements the event stream of the simulator.
//!
//! ## Philosophy
//!
//! The core never prints. Every observable step is turned into a structured
//! [`LogEntry`] and handed to a caller-supplied [`LogSink`]; rendering is the
//! sink's business.

use core_types::TaskId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Task the entry is about (if any)
    pub source: Option<TaskId>,
    /// Tick the entry was produced in (if any)
    pub tick: Option<u64>,
    /// Human-readable line
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            source: None,
            tick: None,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Creates an info-level entry
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    /// Sets the source task
    pub fn with_source(mut self, source: TaskId) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the tick
    pub fn with_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Looks up a field by key
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Destination for log entries
pub trait LogSink {
    fn log(&mut self, entry: LogEntry);
}

impl LogSink for Vec<LogEntry> {
    fn log(&mut self, entry: LogEntry) {
        self.push(entry);
    }
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn log(&mut self, entry: LogEntry) {
        (**self).log(entry);
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn log(&mut self, _entry: LogEntry) {}
}

/// Sink that keeps every entry in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    entries: Vec<LogEntry>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Rendered lines in emission order
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.message.clone()).collect()
    }

    /// Entries at or above `level`
    pub fn at_level(&self, level: LogLevel) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.level >= level)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LogSink for MemoryLogSink {
    fn log(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }
}

/// Sink backed by a caller closure
pub struct FnLogSink<F>(F);

impl<F: FnMut(&LogEntry)> FnLogSink<F> {
    pub fn new(callback: F) -> Self {
        Self(callback)
    }
}

impl<F: FnMut(&LogEntry)> LogSink for FnLogSink<F> {
    fn log(&mut self, entry: LogEntry) {
        (self.0)(&entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
    }

    #[test]
    fn test_log_entry_creation() {
        let entry = LogEntry::new(LogLevel::Info, "test message");
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "test message");
        assert!(entry.source.is_none());
        assert!(entry.tick.is_none());
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn test_log_entry_with_source_and_tick() {
        let entry = LogEntry::info("test").with_source(TaskId::new(3)).with_tick(7);
        assert_eq!(entry.source, Some(TaskId::new(3)));
        assert_eq!(entry.tick, Some(7));
    }

    #[test]
    fn test_log_entry_with_fields() {
        let entry = LogEntry::info("test")
            .with_field("slot", 2)
            .with_field("kind", "MATH");

        assert_eq!(entry.fields.len(), 2);
        assert_eq!(entry.field("slot"), Some("2"));
        assert_eq!(entry.field("kind"), Some("MATH"));
        assert_eq!(entry.field("missing"), None);
    }

    #[test]
    fn test_memory_sink_collects_lines() {
        let mut sink = MemoryLogSink::new();
        sink.log(LogEntry::info("one"));
        sink.log(LogEntry::new(LogLevel::Warn, "two"));
        sink.log(LogEntry::new(LogLevel::Debug, "three"));

        assert_eq!(sink.lines(), vec!["one", "two", "three"]);
        assert_eq!(sink.at_level(LogLevel::Warn).count(), 1);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_fn_sink_invokes_callback() {
        let mut seen = Vec::new();
        {
            let mut sink = FnLogSink::new(|entry: &LogEntry| seen.push(entry.message.clone()));
            sink.log(LogEntry::info("hello"));
        }
        assert_eq!(seen, vec!["hello".to_string()]);
    }

    #[test]
    fn test_boxed_sink() {
        let mut sink: Box<dyn LogSink> = Box::new(NullLogSink);
        sink.log(LogEntry::info("dropped"));

        let mut entries: Vec<LogEntry> = Vec::new();
        entries.log(LogEntry::info("kept"));
        assert_eq!(entries.len(), 1);
    }
}
