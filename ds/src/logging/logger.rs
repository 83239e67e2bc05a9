//! Namespaced logger facade bound to a [`LoggingBackend`]

use std::sync::Arc;

use serde_json::{Map, Value};

use super::backend::LoggingBackend;
use super::types::{ErrorInfo, LogLevel, LogRecord};

/// Namespace of the application root logger
pub const ROOT_NAMESPACE: &str = "frontend";

/// Thin, cheap-to-clone logger carrying a namespace and base context
///
/// Context arguments are JSON values: objects are merged over the base
/// context, `null` means "no extra context" and any other value is stored
/// under the `value` key.
#[derive(Clone)]
pub struct Logger {
    backend: Arc<LoggingBackend>,
    namespace: String,
    base_context: Map<String, Value>,
}

impl Logger {
    pub fn new(backend: Arc<LoggingBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            base_context: Map::new(),
        }
    }

    /// The application root logger (`frontend`)
    pub fn root(backend: Arc<LoggingBackend>) -> Self {
        Self::new(backend, ROOT_NAMESPACE)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn base_context(&self) -> &Map<String, Value> {
        &self.base_context
    }

    pub fn backend(&self) -> &Arc<LoggingBackend> {
        &self.backend
    }

    /// Logger for `parent.suffix` with the extra context merged in
    pub fn child(&self, suffix: &str, extra: Value) -> Logger {
        Logger {
            backend: Arc::clone(&self.backend),
            namespace: format!("{}.{}", self.namespace, suffix),
            base_context: merge(&self.base_context, extra),
        }
    }

    /// Sibling logger with the same namespace and merged context
    pub fn with_context(&self, extra: Value) -> Logger {
        Logger {
            backend: Arc::clone(&self.backend),
            namespace: self.namespace.clone(),
            base_context: merge(&self.base_context, extra),
        }
    }

    /// `child(name)` for a non-empty name, otherwise `with_context`
    pub fn scoped(&self, name: &str, context: Value) -> Logger {
        if name.is_empty() {
            self.with_context(context)
        } else {
            self.child(name, context)
        }
    }

    pub fn debug(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Debug, message, context, None);
    }

    pub fn info(&self, message: impl Into<String>, context: Value) {
        self.log(LogLevel::Info, message, context, None);
    }

    pub fn warn(&self, message: impl Into<String>, context: Value, error: Option<ErrorInfo>) {
        self.log(LogLevel::Warn, message, context, error);
    }

    pub fn error(&self, message: impl Into<String>, context: Value, error: Option<ErrorInfo>) {
        self.log(LogLevel::Error, message, context, error);
    }

    /// Filter, merge, sanitize and emit
    ///
    /// Suppressed levels return before any merging or sink work happens.
    /// `Silent` is always suppressed.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, context: Value, error: Option<ErrorInfo>) {
        if !self.backend.should_log(level) {
            return;
        }
        let merged = merge(&self.base_context, context);
        let sanitized = self.backend.sanitize_context(&merged);
        let mut record = LogRecord::new(level, self.namespace.clone(), message).with_context(sanitized);
        record.error = error;
        self.backend.emit(record);
    }
}

fn merge(base: &Map<String, Value>, extra: Value) -> Map<String, Value> {
    let mut merged = base.clone();
    match extra {
        Value::Null => {}
        Value::Object(map) => merged.extend(map),
        other => {
            merged.insert("value".to_string(), other);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::sinks::MemorySink;
    use crate::logging::types::LoggingUpdate;
    use serde_json::json;

    fn setup() -> (Arc<LoggingBackend>, Arc<MemorySink>) {
        let backend = Arc::new(LoggingBackend::default());
        let memory = Arc::new(MemorySink::new());
        backend.add_sink(memory.clone());
        (backend, memory)
    }

    #[test]
    fn test_info_emits_with_namespace() {
        let (backend, memory) = setup();
        let logger = Logger::root(backend);

        logger.info("started", json!({"port": 8080}));

        let entries = memory.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].namespace, "frontend");
        assert_eq!(entries[0].level, LogLevel::Info);
        assert_eq!(entries[0].context["port"], 8080);
        assert!(entries[0].error.is_none());
    }

    #[test]
    fn test_suppressed_level_does_no_sink_work() {
        let (backend, memory) = setup();
        backend.configure(LoggingUpdate::default().min_level(LogLevel::Warn));
        let logger = Logger::root(backend.clone());

        logger.debug("quiet", Value::Null);
        logger.info("quiet", Value::Null);
        logger.warn("loud", Value::Null, None);

        assert_eq!(memory.entries().len(), 1);
        assert_eq!(backend.snapshot().len(), 1);
    }

    #[test]
    fn test_child_namespaces_and_context() {
        let (backend, memory) = setup();
        let root = Logger::root(backend).with_context(json!({"session": "abc"}));
        let child = root.child("windows", json!({"component": "coordinator"}));

        child.info("opened", json!({"id": "card-1"}));

        let entry = &memory.entries()[0];
        assert_eq!(entry.namespace, "frontend.windows");
        assert_eq!(entry.context["session"], "abc");
        assert_eq!(entry.context["component"], "coordinator");
        assert_eq!(entry.context["id"], "card-1");
    }

    #[test]
    fn test_call_context_overrides_base() {
        let (backend, memory) = setup();
        let logger = Logger::new(backend, "app").with_context(json!({"attempt": 1}));

        logger.info("retry", json!({"attempt": 2}));

        assert_eq!(memory.entries()[0].context["attempt"], 2);
    }

    #[test]
    fn test_context_is_sanitized() {
        let (backend, memory) = setup();
        let logger = Logger::root(backend);

        logger.info("login", json!({"user": "john", "password": "hunter2"}));

        let entry = &memory.entries()[0];
        assert_eq!(entry.context["password"], "[REDACTED]");
        assert_eq!(entry.context["user"], "john");
    }

    #[test]
    fn test_error_argument_attached() {
        let (backend, memory) = setup();
        let logger = Logger::root(backend);
        let io = std::io::Error::other("disk full");

        logger.error("write failed", Value::Null, Some(ErrorInfo::from_error(&io)));
        logger.error("odd failure", Value::Null, Some(ErrorInfo::unknown("plain string")));

        let entries = memory.entries();
        assert_eq!(entries[0].error.as_ref().unwrap().message, "disk full");
        assert_eq!(entries[1].error.as_ref().unwrap().name, "UnknownError");
    }

    #[test]
    fn test_silent_level_never_emits() {
        let (backend, memory) = setup();
        let logger = Logger::root(backend.clone());

        logger.log(LogLevel::Silent, "x", Value::Null, None);
        logger.info("kept", Value::Null);

        let entries = memory.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Info);
        assert!(backend.snapshot().iter().all(|e| e.level != LogLevel::Silent));
    }

    #[test]
    fn test_scalar_context_stored_under_value() {
        let (backend, memory) = setup();
        Logger::root(backend).info("count", json!(3));
        assert_eq!(memory.entries()[0].context["value"], 3);
    }

    #[test]
    fn test_scoped_empty_name_keeps_namespace() {
        let (backend, _) = setup();
        let root = Logger::root(backend);
        assert_eq!(root.scoped("", json!({"a": 1})).namespace(), "frontend");
        assert_eq!(root.scoped("api-client", Value::Null).namespace(), "frontend.api-client");
    }
}
