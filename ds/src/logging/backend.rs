//! Logging backend - the central sink for structured log entries
//!
//! The backend filters by level, keeps a bounded ring buffer of finalized
//! entries and fans every entry out to the registered sinks. It never
//! returns errors to its callers: sink failures (including panics) are
//! swallowed so logging can never take the application down.

use std::collections::{HashSet, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::sanitize::{redact_set, sanitize_map, sanitize_value};
use super::sinks::{BridgeSink, ConsoleSink, LogSink};
use super::types::{LogEntry, LogLevel, LogRecord, LoggingOptions, LoggingUpdate};
use crate::bridge::HostBridge;

/// Identifier returned by [`LoggingBackend::add_sink`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

struct BackendState {
    options: LoggingOptions,
    redact: HashSet<String>,
    sequence: u64,
    entries: VecDeque<LogEntry>,
}

/// Filtered, redacting, multi-sink log backend with bounded history
pub struct LoggingBackend {
    state: Mutex<BackendState>,
    sinks: Mutex<Vec<(SinkId, Arc<dyn LogSink>)>>,
    next_sink: AtomicU64,
}

impl LoggingBackend {
    /// Create a backend with the given options and no sinks
    pub fn new(options: LoggingOptions) -> Self {
        debug!(?options, "LoggingBackend::new: creating backend");
        let redact = redact_set(&options.redact_keys);
        Self {
            state: Mutex::new(BackendState {
                options: LoggingOptions {
                    max_entries: options.max_entries.max(1),
                    ..options
                },
                redact,
                sequence: 0,
                entries: VecDeque::new(),
            }),
            sinks: Mutex::new(Vec::new()),
            next_sink: AtomicU64::new(1),
        }
    }

    /// Merge a partial update over the current options
    ///
    /// `redact_keys` is replaced wholesale only when provided. Shrinking
    /// `max_entries` evicts the oldest retained entries immediately.
    pub fn configure(&self, update: LoggingUpdate) {
        debug!(?update, "LoggingBackend::configure: called");
        let mut state = self.state();
        if let Some(enabled) = update.enabled {
            state.options.enabled = enabled;
        }
        if let Some(level) = update.min_level {
            state.options.min_level = level;
        }
        if let Some(max) = update.max_entries {
            state.options.max_entries = max.max(1);
        }
        if let Some(keys) = update.redact_keys {
            state.redact = redact_set(&keys);
            state.options.redact_keys = keys;
        }
        let max = state.options.max_entries;
        while state.entries.len() > max {
            state.entries.pop_front();
        }
    }

    /// Current effective options
    pub fn options(&self) -> LoggingOptions {
        self.state().options.clone()
    }

    /// True when logging is enabled and `level` ranks at or above `min_level`
    ///
    /// `Silent` is a threshold, never a message level, so it is always false.
    pub fn should_log(&self, level: LogLevel) -> bool {
        if level == LogLevel::Silent {
            return false;
        }
        let state = self.state();
        state.options.enabled && level.rank() >= state.options.min_level.rank()
    }

    /// Finalize a record, retain it and hand it to every sink in registration order
    pub fn emit(&self, record: LogRecord) -> LogEntry {
        let entry = {
            let mut state = self.state();
            state.sequence += 1;
            let entry = LogEntry {
                id: state.sequence,
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                level: record.level,
                namespace: record.namespace,
                message: record.message,
                context: record.context,
                error: record.error,
            };
            state.entries.push_back(entry.clone());
            let max = state.options.max_entries;
            while state.entries.len() > max {
                state.entries.pop_front();
            }
            entry
        };

        let sinks: Vec<Arc<dyn LogSink>> = self.sinks().iter().map(|(_, s)| Arc::clone(s)).collect();
        for sink in sinks {
            match catch_unwind(AssertUnwindSafe(|| sink.write(&entry))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(entry_id = entry.id, error = %e, "LoggingBackend::emit: sink failed"),
                Err(_) => warn!(entry_id = entry.id, "LoggingBackend::emit: sink panicked"),
            }
        }
        entry
    }

    /// Redact, truncate and depth-limit an arbitrary value
    pub fn sanitize(&self, value: &Value) -> Value {
        let state = self.state();
        sanitize_value(value, &state.redact)
    }

    /// Sanitize a context map
    pub fn sanitize_context(&self, context: &Map<String, Value>) -> Map<String, Value> {
        let state = self.state();
        sanitize_map(context, &state.redact)
    }

    /// Copy of the retained history, oldest first
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.state().entries.iter().cloned().collect()
    }

    /// Drop all retained entries (the sequence keeps counting)
    pub fn clear(&self) {
        debug!("LoggingBackend::clear: called");
        self.state().entries.clear();
    }

    /// Register a sink; it receives every entry emitted from now on
    pub fn add_sink(&self, sink: Arc<dyn LogSink>) -> SinkId {
        let id = SinkId(self.next_sink.fetch_add(1, Ordering::Relaxed));
        debug!(sink_id = id.0, "LoggingBackend::add_sink: registering sink");
        self.sinks().push((id, sink));
        id
    }

    /// Unregister a sink; returns false when it was not registered
    pub fn remove_sink(&self, id: SinkId) -> bool {
        let mut sinks = self.sinks();
        let before = sinks.len();
        sinks.retain(|(sid, _)| *sid != id);
        before != sinks.len()
    }

    pub fn sink_count(&self) -> usize {
        self.sinks().len()
    }

    /// Register the built-in console sink
    pub fn enable_console_sink(&self) -> SinkId {
        self.add_sink(Arc::new(ConsoleSink))
    }

    /// Register the built-in sink forwarding entries to the host `log_message` function
    pub fn enable_bridge_sink(&self, bridge: Arc<dyn HostBridge>) -> SinkId {
        self.add_sink(Arc::new(BridgeSink::new(bridge)))
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sinks(&self) -> MutexGuard<'_, Vec<(SinkId, Arc<dyn LogSink>)>> {
        self.sinks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for LoggingBackend {
    fn default() -> Self {
        Self::new(LoggingOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::sinks::MemorySink;
    use serde_json::json;

    fn record(message: &str) -> LogRecord {
        LogRecord::new(LogLevel::Info, "test", message)
    }

    #[test]
    fn test_ring_buffer_keeps_last_entries() {
        let backend = LoggingBackend::default();
        backend.configure(LoggingUpdate::default().max_entries(5));

        for i in 0..10 {
            backend.emit(record(&format!("Message {}", i)));
        }

        let snapshot = backend.snapshot();
        assert_eq!(snapshot.len(), 5);
        assert_eq!(snapshot[0].message, "Message 5");
        assert_eq!(snapshot[4].message, "Message 9");
    }

    #[test]
    fn test_emit_assigns_monotonic_ids() {
        let backend = LoggingBackend::default();
        let a = backend.emit(record("a"));
        let b = backend.emit(record("b"));
        assert!(b.id > a.id);
        assert!(!a.timestamp.is_empty());
    }

    #[test]
    fn test_should_log_disabled() {
        let backend = LoggingBackend::default();
        backend.configure(LoggingUpdate::default().enabled(false));
        for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
            assert!(!backend.should_log(level));
        }
    }

    #[test]
    fn test_should_log_min_level_warn() {
        let backend = LoggingBackend::default();
        backend.configure(LoggingUpdate::default().min_level(LogLevel::Warn));
        assert!(!backend.should_log(LogLevel::Debug));
        assert!(!backend.should_log(LogLevel::Info));
        assert!(backend.should_log(LogLevel::Warn));
        assert!(backend.should_log(LogLevel::Error));
    }

    #[test]
    fn test_silent_suppresses_everything() {
        let backend = LoggingBackend::default();
        backend.configure(LoggingUpdate::default().min_level(LogLevel::Silent));
        assert!(!backend.should_log(LogLevel::Error));
        assert!(!backend.should_log(LogLevel::Silent));
    }

    #[test]
    fn test_silent_is_not_a_message_level() {
        let backend = LoggingBackend::default();
        assert!(backend.should_log(LogLevel::Debug));
        assert!(!backend.should_log(LogLevel::Silent));
    }

    #[test]
    fn test_configure_preserves_redact_keys_when_absent() {
        let backend = LoggingBackend::default();
        backend.configure(LoggingUpdate::default().redact_keys(["apiKey"]));
        backend.configure(LoggingUpdate::default().min_level(LogLevel::Info));

        let options = backend.options();
        assert_eq!(options.redact_keys, vec!["apiKey".to_string()]);
        assert_eq!(options.min_level, LogLevel::Info);
        assert_eq!(backend.sanitize(&json!({"APIKEY": 1})), json!({"APIKEY": "[REDACTED]"}));
    }

    #[test]
    fn test_shrinking_max_entries_evicts() {
        let backend = LoggingBackend::default();
        for i in 0..4 {
            backend.emit(record(&i.to_string()));
        }
        backend.configure(LoggingUpdate::default().max_entries(2));
        let messages: Vec<_> = backend.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["2", "3"]);
    }

    #[test]
    fn test_sinks_receive_entries_in_order() {
        let backend = LoggingBackend::default();
        let first = Arc::new(MemorySink::new());
        let second = Arc::new(MemorySink::new());
        backend.add_sink(first.clone());
        backend.add_sink(second.clone());

        backend.emit(record("hello"));

        assert_eq!(first.entries().len(), 1);
        assert_eq!(second.entries()[0].message, "hello");
    }

    #[test]
    fn test_failing_sink_does_not_block_others() {
        let backend = LoggingBackend::default();
        backend.add_sink(Arc::new(|_: &LogEntry| -> eyre::Result<()> { Err(eyre::eyre!("boom")) }));
        backend.add_sink(Arc::new(|_: &LogEntry| -> eyre::Result<()> { panic!("sink panic") }));
        let memory = Arc::new(MemorySink::new());
        backend.add_sink(memory.clone());

        backend.emit(record("still delivered"));

        assert_eq!(memory.entries().len(), 1);
    }

    #[test]
    fn test_remove_sink() {
        let backend = LoggingBackend::default();
        let memory = Arc::new(MemorySink::new());
        let id = backend.add_sink(memory.clone());
        assert!(backend.remove_sink(id));
        assert!(!backend.remove_sink(id));

        backend.emit(record("unseen"));
        assert!(memory.entries().is_empty());
    }

    #[test]
    fn test_builtin_sinks() {
        let backend = LoggingBackend::default();
        let bridge = Arc::new(crate::bridge::RecordingBridge::new());
        backend.enable_console_sink();
        backend.enable_bridge_sink(bridge.clone());
        assert_eq!(backend.sink_count(), 2);

        backend.emit(record("forwarded"));

        assert_eq!(bridge.calls_to(crate::bridge::LOG_MESSAGE).len(), 1);
    }

    #[test]
    fn test_clear_keeps_sequence() {
        let backend = LoggingBackend::default();
        backend.emit(record("a"));
        backend.clear();
        assert!(backend.snapshot().is_empty());
        let next = backend.emit(record("b"));
        assert_eq!(next.id, 2);
    }
}
