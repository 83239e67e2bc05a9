//! Output sinks for finalized log entries

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use super::types::{LogEntry, LogLevel};
use crate::bridge::{HostBridge, LOG_MESSAGE, LogMessage};

/// Destination for finalized log entries
///
/// Errors returned here are swallowed by the backend; they never reach the
/// code that produced the entry.
pub trait LogSink: Send + Sync {
    fn write(&self, entry: &LogEntry) -> eyre::Result<()>;
}

impl<F> LogSink for F
where
    F: Fn(&LogEntry) -> eyre::Result<()> + Send + Sync,
{
    fn write(&self, entry: &LogEntry) -> eyre::Result<()> {
        self(entry)
    }
}

/// Human-readable prefix: `[timestamp] [LEVEL] [namespace]`
pub fn console_prefix(entry: &LogEntry) -> String {
    format!("[{}] [{}] [{}]", entry.timestamp, entry.level.label(), entry.namespace)
}

/// Writes entries to the process diagnostics stream through `tracing`
///
/// Each entry is emitted at the matching `tracing` level under the
/// `deskshell::console` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn write(&self, entry: &LogEntry) -> eyre::Result<()> {
        let line = format!("{} {}", console_prefix(entry), entry.message);
        let context = Value::Object(entry.context.clone());
        match (&entry.error, entry.level) {
            (Some(err), LogLevel::Error) => {
                error!(target: "deskshell::console", %context, error.name = %err.name, error.message = %err.message, "{}", line)
            }
            (Some(err), LogLevel::Warn) => {
                warn!(target: "deskshell::console", %context, error.name = %err.name, error.message = %err.message, "{}", line)
            }
            (_, LogLevel::Debug) => debug!(target: "deskshell::console", %context, "{}", line),
            (_, LogLevel::Info) => info!(target: "deskshell::console", %context, "{}", line),
            (_, LogLevel::Warn) => warn!(target: "deskshell::console", %context, "{}", line),
            (_, LogLevel::Error) => error!(target: "deskshell::console", %context, "{}", line),
            (_, LogLevel::Silent) => {}
        }
        Ok(())
    }
}

/// Forwards entries to the host process through the `log_message` function
///
/// Silently does nothing when the host does not expose the function or the
/// call fails.
pub struct BridgeSink {
    bridge: Arc<dyn HostBridge>,
}

impl BridgeSink {
    pub fn new(bridge: Arc<dyn HostBridge>) -> Self {
        Self { bridge }
    }
}

impl LogSink for BridgeSink {
    fn write(&self, entry: &LogEntry) -> eyre::Result<()> {
        if !self.bridge.has_function(LOG_MESSAGE) {
            return Ok(());
        }
        let payload = serde_json::to_string(&LogMessage::from_entry(entry))?;
        if let Err(e) = self.bridge.invoke(LOG_MESSAGE, &[payload]) {
            trace!(error = %e, "BridgeSink::write: host rejected log entry");
        }
        Ok(())
    }
}

/// Keeps every entry in memory; handy for tests and diagnostics dumps
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl LogSink for MemorySink {
    fn write(&self, entry: &LogEntry) -> eyre::Result<()> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).push(entry.clone());
        Ok(())
    }
}
