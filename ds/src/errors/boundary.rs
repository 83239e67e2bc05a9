//! Top-level error boundary
//!
//! Catches failures nothing else handled (framework errors, uncaught window
//! errors, unhandled rejections, panicked or cancelled tasks), logs the raw
//! failure to the diagnostics stream first, then funnels a normalised
//! [`ErrorValue`] into [`GlobalErrorService::report`].

use std::sync::Arc;

use serde_json::Value;
use tracing::error;

use super::service::{ErrorState, GlobalErrorService, ReportOptions};
use super::types::{ErrorCode, ErrorValue, Thrown};

pub const SOURCE_FRAMEWORK: &str = "framework";
pub const SOURCE_WINDOW: &str = "window";
pub const SOURCE_PROMISE: &str = "promise";

pub const REJECTION_TITLE: &str = "Unhandled Promise Rejection";

/// Forwards uncaught failures into the error service
#[derive(Clone)]
pub struct ErrorBoundary {
    service: Arc<GlobalErrorService>,
}

impl ErrorBoundary {
    pub fn new(service: Arc<GlobalErrorService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<GlobalErrorService> {
        &self.service
    }

    /// Error raised inside the UI framework's own error handler
    pub fn capture_framework(&self, thrown: impl Into<Thrown>) -> ErrorState {
        self.capture(thrown.into(), SOURCE_FRAMEWORK, None)
    }

    /// Uncaught error event
    pub fn capture_window(&self, thrown: impl Into<Thrown>) -> ErrorState {
        self.capture(thrown.into(), SOURCE_WINDOW, None)
    }

    /// Unhandled rejection of an async operation
    pub fn capture_rejection(&self, thrown: impl Into<Thrown>) -> ErrorState {
        self.capture(thrown.into(), SOURCE_PROMISE, Some(REJECTION_TITLE))
    }

    /// A spawned task that panicked or was cancelled, treated as a rejection
    pub fn capture_join_error(&self, join_error: &tokio::task::JoinError) -> ErrorState {
        let thrown = if join_error.is_panic() {
            Thrown::Error {
                name: "Panic".to_string(),
                message: join_error.to_string(),
                stack: None,
            }
        } else {
            Thrown::Message(format!("Task cancelled: {}", join_error))
        };
        self.capture_rejection(thrown)
    }

    fn capture(&self, thrown: Thrown, source: &str, title: Option<&str>) -> ErrorState {
        // Raw failure goes to diagnostics before anything else can fail
        error!(%source, error = %thrown.describe(), "ErrorBoundary: uncaught error");
        let value = extract_error_value(&thrown);
        let title = title.map(str::to_string).or_else(|| extract_title(&thrown).map(str::to_string));
        self.service.report(
            value,
            ReportOptions {
                source: Some(source.to_string()),
                title,
            },
        )
    }
}

/// Normalise any thrown shape into an [`ErrorValue`]
pub fn extract_error_value(thrown: &Thrown) -> ErrorValue {
    match thrown {
        Thrown::Http {
            status, message, body, ..
        } => {
            if let Some(inner) = body.as_ref().and_then(embedded_error) {
                return inner;
            }
            let mut value = ErrorValue::new(map_http_status(*status), message.clone());
            value.details = body.as_ref().map(Value::to_string);
            value
        }
        Thrown::Error { message, stack, .. } => {
            let mut value = ErrorValue::internal(message.clone());
            value.details = stack.clone();
            value
        }
        Thrown::Message(message) => ErrorValue::new(infer_error_code(message), message.clone()),
        Thrown::Value(Value::String(message)) => ErrorValue::new(infer_error_code(message), message.clone()),
        Thrown::Value(value) => embedded_error(value).unwrap_or_else(|| {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            ErrorValue::new(infer_error_code(&message), message)
        }),
    }
}

/// `{code, message, ...}` objects, possibly nested under `error`
fn embedded_error(value: &Value) -> Option<ErrorValue> {
    if let Some(inner) = value.get("error").filter(|v| v.is_object()) {
        return embedded_error(inner);
    }
    if value.get("code").is_some() && value.get("message").is_some() {
        return serde_json::from_value(value.clone()).ok();
    }
    None
}

/// HTTP status to error code
pub fn map_http_status(status: u16) -> ErrorCode {
    match status {
        400 => ErrorCode::ValidationFailed,
        401 | 403 | 500 | 502 | 503 => ErrorCode::InternalError,
        404 => ErrorCode::ResourceNotFound,
        409 => ErrorCode::DbAlreadyExists,
        _ => ErrorCode::Unknown,
    }
}

/// Guess a code from free-form message text
pub fn infer_error_code(message: &str) -> ErrorCode {
    let lower = message.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if has(&["network", "fetch", "http"]) {
        ErrorCode::DbConnectionFailed
    } else if has(&["not found", "404"]) {
        ErrorCode::ResourceNotFound
    } else if has(&["validation", "invalid"]) {
        ErrorCode::ValidationFailed
    } else if has(&["duplicate", "already exists"]) {
        ErrorCode::DbAlreadyExists
    } else if has(&["permission", "unauthorized", "forbidden", "timeout"]) {
        ErrorCode::InternalError
    } else {
        ErrorCode::Unknown
    }
}

/// Title override for HTTP failures; `None` defers to the code table
pub fn extract_title(thrown: &Thrown) -> Option<&'static str> {
    match thrown {
        Thrown::Http { status, .. } if *status >= 500 => Some("Server Error"),
        Thrown::Http { status, .. } if *status >= 400 => Some("Request Failed"),
        Thrown::Http { .. } => Some("Error"),
        _ => None,
    }
}
