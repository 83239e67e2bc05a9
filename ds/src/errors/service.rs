//! Global error service - the single convergence point for surfaced errors
//!
//! Holds at most one active [`ErrorState`]. Every `report` overwrites the
//! slot (last write wins), publishes `error:captured` and logs at error
//! level; `dismiss` clears it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::messages::{default_title, user_message};
use super::types::{ErrorCode, ErrorValue, Thrown};
use crate::events::{ERROR_CAPTURED, EventBus};
use crate::logging::{ErrorInfo, Logger};
use crate::state::{Observable, Subscription};

/// Source recorded when the reporter does not name one
pub const DEFAULT_SOURCE: &str = "unknown";

/// The surfaced error as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorState {
    pub id: u64,
    pub error: ErrorValue,
    pub title: String,
    pub user_message: String,
    pub source: String,
    pub timestamp: String,
}

/// Optional overrides for [`GlobalErrorService::report`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub source: Option<String>,
    pub title: Option<String>,
}

impl ReportOptions {
    pub fn source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Canonicalises errors and holds the single active one
pub struct GlobalErrorService {
    bus: Arc<EventBus>,
    logger: Logger,
    sequence: AtomicU64,
    active: Observable<Option<ErrorState>>,
}

impl GlobalErrorService {
    pub fn new(bus: Arc<EventBus>, logger: Logger) -> Self {
        debug!(namespace = logger.namespace(), "GlobalErrorService::new: called");
        Self {
            bus,
            logger,
            sequence: AtomicU64::new(0),
            active: Observable::new(None),
        }
    }

    /// Make `error` the active error
    pub fn report(&self, error: ErrorValue, options: ReportOptions) -> ErrorState {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let title = options.title.unwrap_or_else(|| default_title(error.code).to_string());
        let state = ErrorState {
            id,
            title,
            user_message: user_message(&error),
            source: options.source.unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            error,
        };
        debug!(id, code = %state.error.code, source = %state.source, "GlobalErrorService::report: called");

        self.active.set(Some(state.clone()));

        let mut summary = json!({
            "id": state.id,
            "source": state.source,
            "title": state.title,
            "code": state.error.code,
            "message": state.error.message,
        });
        if let Some(field) = &state.error.field {
            summary["field"] = json!(field);
        }
        let summary = self.logger.backend().sanitize(&summary);
        self.bus.publish(ERROR_CAPTURED, summary);

        self.logger.error(
            "Root error captured",
            json!({
                "id": state.id,
                "source": state.source,
                "title": state.title,
                "timestamp": state.timestamp,
                "code": state.error.code,
            }),
            Some(ErrorInfo::from_error(&state.error)),
        );
        state
    }

    /// Success payload, or report the failure and return `None`
    pub fn handle_result<T>(&self, result: Result<T, ErrorValue>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.report(error, ReportOptions::default());
                None
            }
        }
    }

    /// Like [`handle_result`](Self::handle_result), transforming the error first
    ///
    /// The transformed error is reported and handed back in the result.
    pub fn handle_result_with<T, F>(&self, result: Result<T, ErrorValue>, map_error: F) -> Result<T, ErrorValue>
    where
        F: FnOnce(ErrorValue) -> ErrorValue,
    {
        result.map_err(|error| {
            let mapped = map_error(error);
            self.report(mapped.clone(), ReportOptions::default());
            mapped
        })
    }

    /// Normalise a raw thrown value; the code defaults to `UNKNOWN`
    pub fn from_exception(&self, thrown: impl Into<Thrown>, default_code: Option<ErrorCode>) -> ErrorValue {
        ErrorValue::from_thrown(thrown.into(), default_code)
    }

    pub fn validation_error(&self, field: &str, message: &str, options: ReportOptions) -> ErrorState {
        self.report(ErrorValue::validation(field, message), options)
    }

    /// Report `RESOURCE_NOT_FOUND`; context always carries `{resource, id}`
    pub fn not_found_error(&self, resource: &str, id: impl std::fmt::Display, options: ReportOptions) -> ErrorState {
        self.report(ErrorValue::not_found(resource, id), options)
    }

    /// Clear the active error; safe to call when nothing is active
    pub fn dismiss(&self) {
        let mut previous = None;
        self.active.update_if(|slot| {
            previous = slot.take();
            previous.is_some()
        });
        if let Some(state) = previous {
            debug!(id = state.id, "GlobalErrorService::dismiss: cleared");
            self.logger
                .info("Root error dismissed", json!({"id": state.id, "source": state.source}));
        }
    }

    pub fn has_error(&self) -> bool {
        self.active.with(Option::is_some)
    }

    pub fn active_error(&self) -> Option<ErrorState> {
        self.active.get()
    }

    pub fn current_error_code(&self) -> Option<ErrorCode> {
        self.active.with(|slot| slot.as_ref().map(|s| s.error.code))
    }

    pub fn is_error_code(&self, code: ErrorCode) -> bool {
        self.current_error_code() == Some(code)
    }

    /// Watch the active-error slot
    pub fn watch<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&Option<ErrorState>) + Send + Sync + 'static,
    {
        self.active.subscribe(watcher)
    }
}
