//! Request/response calls to the host with a timeout race

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::debug;

use super::host::HostBridge;
use super::messages::response_event_name;
use super::router::ResponseRouter;
use crate::connection::ConnectionMonitor;
use crate::errors::ErrorValue;
use crate::logging::Logger;

/// Budget for user-facing calls
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Budget for diagnostics polling
pub const DIAGNOSTICS_TIMEOUT: Duration = Duration::from_secs(5);

/// Calls host functions and waits for their named response event
///
/// Every failure comes back as an `INTERNAL_ERROR` [`ErrorValue`] rather
/// than a panic or a hung future: missing function, host rejection, and
/// timeout. The response listener is always deregistered before a call
/// returns, so a late response is ignored.
#[derive(Clone)]
pub struct BackendClient {
    bridge: Arc<dyn HostBridge>,
    router: ResponseRouter,
    logger: Logger,
    monitor: Option<Arc<ConnectionMonitor>>,
    call_timeout: Duration,
    diagnostics_timeout: Duration,
}

impl BackendClient {
    pub fn new(bridge: Arc<dyn HostBridge>, router: ResponseRouter, logger: Logger) -> Self {
        Self {
            bridge,
            router,
            logger,
            monitor: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            diagnostics_timeout: DIAGNOSTICS_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, call: Duration, diagnostics: Duration) -> Self {
        self.call_timeout = call;
        self.diagnostics_timeout = diagnostics;
        self
    }

    /// Record every call outcome into `monitor`
    pub fn with_monitor(mut self, monitor: Arc<ConnectionMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn router(&self) -> &ResponseRouter {
        &self.router
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// User-facing call with the standard budget
    pub async fn call(&self, function: &str, args: &[String]) -> Result<Value, ErrorValue> {
        self.call_with_timeout(function, args, self.call_timeout).await
    }

    /// Diagnostics poll with the short budget
    pub async fn call_diagnostics(&self, function: &str, args: &[String]) -> Result<Value, ErrorValue> {
        self.call_with_timeout(function, args, self.diagnostics_timeout).await
    }

    pub async fn call_with_timeout(&self, function: &str, args: &[String], timeout: Duration) -> Result<Value, ErrorValue> {
        debug!(%function, ?timeout, "BackendClient::call_with_timeout: called");
        let started = Instant::now();
        let result = self.race(function, args, timeout).await;
        self.record(function, &result, started.elapsed());
        result
    }

    async fn race(&self, function: &str, args: &[String], timeout: Duration) -> Result<Value, ErrorValue> {
        if !self.bridge.has_function(function) {
            return Err(ErrorValue::internal(format!("Backend function not found: {}", function))
                .with_details("The function is not bound or available"));
        }

        let event = response_event_name(function);
        // Listen before invoking: the host may answer synchronously
        let mut pending = self.router.listen(&event);

        if let Err(e) = self.bridge.invoke(function, args) {
            return Err(ErrorValue::internal(format!("Failed to call backend: {}", function)).with_cause(e.to_string()));
        }

        match tokio::time::timeout(timeout, pending.recv()).await {
            Ok(Some(response)) => response.into_result(),
            Ok(None) => Err(ErrorValue::internal(format!("Failed to call backend: {}", function))
                .with_cause("response channel closed")),
            Err(_) => {
                debug!(%function, %event, "BackendClient::race: timed out");
                Err(ErrorValue::internal(format!("Backend call timeout: {}", function))
                    .with_details("No response received within timeout period"))
            }
        }
    }

    fn record(&self, function: &str, result: &Result<Value, ErrorValue>, elapsed: Duration) {
        let millis = elapsed.as_millis() as u64;
        match result {
            Ok(_) => {
                self.logger
                    .debug("Backend call succeeded", json!({"function": function, "ms": millis}));
                if let Some(monitor) = &self.monitor {
                    monitor.record_call(true);
                    monitor.record_latency(millis);
                }
            }
            Err(error) => {
                self.logger.warn(
                    "Backend call failed",
                    json!({"function": function, "code": error.code, "message": error.message}),
                    None,
                );
                if let Some(monitor) = &self.monitor {
                    monitor.record_call(false);
                    monitor.record_error(&error.message);
                }
            }
        }
    }
}
