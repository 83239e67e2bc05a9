//! Error codes, the canonical error value and raw thrown values

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Enumerated error kinds shared with the host process
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DbConnectionFailed,
    DbQueryFailed,
    DbNotFound,
    DbAlreadyExists,
    DbConstraintViolation,
    ConfigNotFound,
    ConfigInvalid,
    ConfigMissingField,
    SerializationFailed,
    DeserializationFailed,
    InvalidFormat,
    ValidationFailed,
    MissingRequiredField,
    InvalidFieldValue,
    ResourceNotFound,
    UserNotFound,
    EntityNotFound,
    InternalError,
    LockPoisoned,
    #[serde(other)]
    Unknown,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DbConnectionFailed => "DB_CONNECTION_FAILED",
            Self::DbQueryFailed => "DB_QUERY_FAILED",
            Self::DbNotFound => "DB_NOT_FOUND",
            Self::DbAlreadyExists => "DB_ALREADY_EXISTS",
            Self::DbConstraintViolation => "DB_CONSTRAINT_VIOLATION",
            Self::ConfigNotFound => "CONFIG_NOT_FOUND",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::ConfigMissingField => "CONFIG_MISSING_FIELD",
            Self::SerializationFailed => "SERIALIZATION_FAILED",
            Self::DeserializationFailed => "DESERIALIZATION_FAILED",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::InvalidFieldValue => "INVALID_FIELD_VALUE",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::EntityNotFound => "ENTITY_NOT_FOUND",
            Self::InternalError => "INTERNAL_ERROR",
            Self::LockPoisoned => "LOCK_POISONED",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Resource, user and entity not-found codes
    pub fn is_not_found(self) -> bool {
        matches!(self, Self::ResourceNotFound | Self::UserNotFound | Self::EntityNotFound)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical error value
///
/// `Result<T, ErrorValue>` is the tagged success/failure value handled by
/// [`GlobalErrorService::handle_result`](super::GlobalErrorService::handle_result).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("[{code}] {message}")]
pub struct ErrorValue {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
}

impl ErrorValue {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
            cause: None,
            context: None,
        }
    }

    /// `VALIDATION_FAILED` for one field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message).with_field(field)
    }

    /// `RESOURCE_NOT_FOUND` with message `"<resource> not found: <id>"`
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        let id = id.to_string();
        Self::new(ErrorCode::ResourceNotFound, format!("{} not found: {}", resource, id))
            .with_context(json!({"resource": resource, "id": id}))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Merge context; a non-object value is stored under `value`
    pub fn with_context(mut self, context: Value) -> Self {
        let map = self.context.get_or_insert_with(Map::new);
        match context {
            Value::Null => {}
            Value::Object(extra) => map.extend(extra),
            other => {
                map.insert("value".to_string(), other);
            }
        }
        self
    }

    /// String-valued context entry
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context.as_ref()?.get(key)?.as_str()
    }

    /// Normalise a raw thrown value
    ///
    /// `code` applies to every shape. Without one, typed errors become
    /// `INTERNAL_ERROR` and everything else `UNKNOWN`.
    pub fn from_thrown(thrown: Thrown, code: Option<ErrorCode>) -> Self {
        let code = code.unwrap_or(match thrown {
            Thrown::Error { .. } => ErrorCode::InternalError,
            _ => ErrorCode::Unknown,
        });
        match thrown {
            Thrown::Error { message, stack, .. } => {
                let mut value = Self::new(code, message);
                value.details = stack;
                value
            }
            Thrown::Message(message) => Self::new(code, message),
            Thrown::Http { message, body, .. } => {
                let mut value = Self::new(code, message);
                value.details = body.map(|b| b.to_string());
                value
            }
            Thrown::Value(Value::String(message)) => Self::new(code, message),
            Thrown::Value(other) => {
                let message = other
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| "An unknown error occurred".to_string());
                Self::new(code, message).with_details(other.to_string())
            }
        }
    }
}

/// A raw failure as it reaches an error boundary
#[derive(Debug, Clone, PartialEq)]
pub enum Thrown {
    /// A typed error with its source chain rendered as a stack
    Error {
        name: String,
        message: String,
        stack: Option<String>,
    },
    /// A bare string
    Message(String),
    /// A failed HTTP exchange
    Http {
        status: u16,
        message: String,
        url: Option<String>,
        body: Option<Value>,
    },
    /// Any other value
    Value(Value),
}

impl Thrown {
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        let info = crate::logging::ErrorInfo::from_error(error);
        Self::Error {
            name: info.name,
            message: info.message,
            stack: info.stack,
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            url: None,
            body: None,
        }
    }

    /// Short human-readable form for diagnostics
    pub fn describe(&self) -> String {
        match self {
            Self::Error { name, message, .. } => format!("{}: {}", name, message),
            Self::Message(message) => message.clone(),
            Self::Http { status, message, .. } => format!("HTTP {}: {}", status, message),
            Self::Value(value) => value.to_string(),
        }
    }
}

impl From<&str> for Thrown {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<String> for Thrown {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<Value> for Thrown {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<eyre::Report> for Thrown {
    fn from(report: eyre::Report) -> Self {
        let info = crate::logging::ErrorInfo::from_report(&report);
        Self::Error {
            name: info.name,
            message: info.message,
            stack: info.stack,
        }
    }
}

impl From<std::io::Error> for Thrown {
    fn from(error: std::io::Error) -> Self {
        Self::from_error(&error)
    }
}
