//! Structured application logging
//!
//! Every component logs through a namespaced [`Logger`] bound to one shared
//! [`LoggingBackend`]. The backend is the only owner of [`LogEntry`] values.
//!
//! ```text
//!  Logger("frontend.windows") ─┐
//!  Logger("frontend.errors")  ─┼─► LoggingBackend ─► ring buffer (max-entries)
//!  Logger("frontend")         ─┘        │
//!                                       ├─► ConsoleSink  (tracing)
//!                                       └─► BridgeSink   (host `log_message`)
//! ```
//!
//! Logging never fails from the caller's point of view: filtered levels cost
//! nothing, context is redacted and size-bounded, and sink failures are
//! swallowed.

mod backend;
mod logger;
mod sanitize;
mod sinks;
mod types;

pub use backend::{LoggingBackend, SinkId};
pub use logger::{Logger, ROOT_NAMESPACE};
pub use sanitize::{MAX_DEPTH, MAX_STRING_LEN, REDACTED, TRUNCATED, redact_set, sanitize_map, sanitize_value};
pub use sinks::{BridgeSink, ConsoleSink, LogSink, MemorySink, console_prefix};
pub use types::{
    DEFAULT_MAX_ENTRIES, DEFAULT_REDACT_KEYS, ErrorInfo, LogEntry, LogLevel, LogRecord, LoggingOptions, LoggingUpdate,
};
