//! Log entry and configuration types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity of a log entry
///
/// `Silent` is only meaningful as a minimum level: it ranks above `Error`
/// so configuring it suppresses everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    /// Numeric rank used for filtering
    pub fn rank(self) -> u8 {
        match self {
            LogLevel::Debug => 10,
            LogLevel::Info => 20,
            LogLevel::Warn => 30,
            LogLevel::Error => 40,
            LogLevel::Silent => 99,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Silent => "silent",
        }
    }

    /// Upper-case label used in console prefixes and host payloads
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Silent => "SILENT",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "silent" | "off" => Ok(LogLevel::Silent),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Normalized error attached to a log entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorInfo {
    /// Build from any `std::error::Error`
    ///
    /// The name is the short type name; the source chain becomes the stack.
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        Self {
            name: short_type_name::<E>().to_string(),
            message: error.to_string(),
            stack: if chain.is_empty() { None } else { Some(chain.join("\n")) },
        }
    }

    /// Build from an `eyre::Report`, keeping its context chain as the stack
    pub fn from_report(report: &eyre::Report) -> Self {
        let chain: Vec<String> = report.chain().skip(1).map(|c| format!("caused by: {}", c)).collect();
        Self {
            name: "Report".to_string(),
            message: report.to_string(),
            stack: if chain.is_empty() { None } else { Some(chain.join("\n")) },
        }
    }

    /// Build from something that is not an error type
    pub fn unknown(message: impl fmt::Display) -> Self {
        Self {
            name: "UnknownError".to_string(),
            message: message.to_string(),
            stack: None,
        }
    }

    /// Sanitizable JSON shape `{name, message, stack}`
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A finalized, immutable log entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    /// ISO-8601 timestamp
    pub timestamp: String,
    pub level: LogLevel,
    pub namespace: String,
    pub message: String,
    pub context: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

/// A log entry before the backend assigns its id and timestamp
#[derive(Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub namespace: String,
    pub message: String,
    pub context: Map<String, Value>,
    pub error: Option<ErrorInfo>,
}

impl LogRecord {
    pub fn new(level: LogLevel, namespace: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            namespace: namespace.into(),
            message: message.into(),
            context: Map::new(),
            error: None,
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }
}

/// Default keys whose values are replaced with `[REDACTED]`
pub const DEFAULT_REDACT_KEYS: &[&str] = &["password", "token", "secret", "authorization", "cookie"];

/// Default ring-buffer capacity
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Effective logging backend configuration
#[derive(Clone, Debug, PartialEq)]
pub struct LoggingOptions {
    pub enabled: bool,
    pub min_level: LogLevel,
    pub max_entries: usize,
    pub redact_keys: Vec<String>,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            min_level: LogLevel::Debug,
            max_entries: DEFAULT_MAX_ENTRIES,
            redact_keys: DEFAULT_REDACT_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Partial configuration update
///
/// Fields left as `None` keep their current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoggingUpdate {
    pub enabled: Option<bool>,
    pub min_level: Option<LogLevel>,
    pub max_entries: Option<usize>,
    pub redact_keys: Option<Vec<String>>,
}

impl LoggingUpdate {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    pub fn redact_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redact_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }
}

impl From<LoggingOptions> for LoggingUpdate {
    fn from(options: LoggingOptions) -> Self {
        Self {
            enabled: Some(options.enabled),
            min_level: Some(options.min_level),
            max_entries: Some(options.max_entries),
            redact_keys: Some(options.redact_keys),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer {
        #[source]
        inner: std::io::Error,
    }

    #[test]
    fn test_level_ranks_are_ordered() {
        assert!(LogLevel::Debug.rank() < LogLevel::Info.rank());
        assert!(LogLevel::Info.rank() < LogLevel::Warn.rank());
        assert!(LogLevel::Warn.rank() < LogLevel::Error.rank());
        assert_eq!(LogLevel::Silent.rank(), 99);
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_error_info_from_error_keeps_chain() {
        let err = Outer {
            inner: std::io::Error::other("disk gone"),
        };
        let info = ErrorInfo::from_error(&err);
        assert_eq!(info.name, "Outer");
        assert_eq!(info.message, "outer failure");
        assert!(info.stack.unwrap().contains("disk gone"));
    }

    #[test]
    fn test_error_info_unknown() {
        let info = ErrorInfo::unknown(42);
        assert_eq!(info.name, "UnknownError");
        assert_eq!(info.message, "42");
        assert!(info.stack.is_none());
    }

    #[test]
    fn test_default_options() {
        let options = LoggingOptions::default();
        assert!(options.enabled);
        assert_eq!(options.min_level, LogLevel::Debug);
        assert_eq!(options.max_entries, 500);
        assert!(options.redact_keys.contains(&"password".to_string()));
    }
}
