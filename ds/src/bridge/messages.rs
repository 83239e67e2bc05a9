//! Payloads exchanged with the host process
//!
//! Everything crossing the bridge is a JSON string; these types fix the
//! field names the host expects.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{ErrorCode, ErrorValue};
use crate::logging::LogEntry;
use crate::windows::WindowState;

/// Host function receiving forwarded log entries
pub const LOG_MESSAGE: &str = "log_message";

/// Host function receiving window lifecycle notifications
pub const WINDOW_STATE_CHANGE: &str = "window_state_change";

/// Session tag attached to forwarded log entries
pub const SESSION_ID: &str = "frontend";

/// Log entry as forwarded through `log_message`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub message: String,
    /// Upper-case level label (`INFO`, `WARN`, ...)
    pub level: String,
    pub meta: Map<String, Value>,
    /// Logger namespace
    pub category: String,
    pub session_id: String,
    pub frontend_timestamp: String,
}

impl LogMessage {
    pub fn from_entry(entry: &LogEntry) -> Self {
        Self {
            message: entry.message.clone(),
            level: entry.level.label().to_string(),
            meta: entry.context.clone(),
            category: entry.namespace.clone(),
            session_id: SESSION_ID.to_string(),
            frontend_timestamp: entry.timestamp.clone(),
        }
    }
}

/// Window lifecycle notification sent through `window_state_change`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub window_id: String,
    pub state: WindowState,
    pub title: String,
    pub timestamp: String,
}

impl StateChange {
    pub fn now(window_id: &str, state: WindowState, title: &str) -> Self {
        Self {
            window_id: window_id.to_string(),
            state,
            title: title.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Error body of a failed [`ApiResponse`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Response event detail: `{success, data?, error?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: &ErrorValue) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiErrorBody {
                code: error.code,
                message: error.message.clone(),
                details: error.details.clone(),
            }),
        }
    }

    /// Tagged response into a Rust result
    ///
    /// A success without data yields `null`; a failure without an error body
    /// yields an `UNKNOWN` error.
    pub fn into_result(self) -> Result<Value, ErrorValue> {
        if self.success {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        match self.error {
            Some(body) => {
                let mut error = ErrorValue::new(body.code, body.message);
                error.details = body.details;
                Err(error)
            }
            None => Err(ErrorValue::new(ErrorCode::Unknown, "Unknown error")),
        }
    }
}

/// Name of the event carrying the response to `function`
pub fn response_event_name(function: &str) -> String {
    match function {
        "get_users" => "db_response".to_string(),
        "create_user" => "user_create_response".to_string(),
        "update_user" => "user_update_response".to_string(),
        "delete_user" => "user_delete_response".to_string(),
        "get_system_info" => "sysinfo_response".to_string(),
        other => format!("{}_response", other),
    }
}
