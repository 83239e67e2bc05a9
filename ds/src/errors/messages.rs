//! Code-to-title and code-to-message tables

use super::types::{ErrorCode, ErrorValue};

/// Longest raw message shown as-is for `UNKNOWN` errors
const MAX_UNKNOWN_MESSAGE_LEN: usize = 200;

/// Dialog title for `code`
pub fn default_title(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::ValidationFailed => "Validation Error",
        ErrorCode::ResourceNotFound | ErrorCode::UserNotFound | ErrorCode::EntityNotFound => "Not Found",
        ErrorCode::DbAlreadyExists => "Already Exists",
        ErrorCode::InternalError | ErrorCode::LockPoisoned => "System Error",
        _ => "Error",
    }
}

/// User-facing message for `error`; total over every code
pub fn user_message(error: &ErrorValue) -> String {
    let message = error.message.as_str();
    let or = |fallback: &str| {
        if message.is_empty() {
            fallback.to_string()
        } else {
            message.to_string()
        }
    };

    if let (ErrorCode::ValidationFailed, Some(field)) = (error.code, &error.field) {
        return format!("{}: {}", field, message);
    }

    match error.code {
        ErrorCode::DbAlreadyExists => or("This item already exists."),
        ErrorCode::ResourceNotFound | ErrorCode::UserNotFound | ErrorCode::EntityNotFound => {
            or("The requested item was not found.")
        }
        ErrorCode::DbConnectionFailed => {
            "Unable to connect to the database. Please check your connection and try again.".to_string()
        }
        ErrorCode::DbQueryFailed => {
            if message.contains("duplicate") {
                "A record with this information already exists.".to_string()
            } else if message.contains("constraint") {
                "This operation would violate a database rule.".to_string()
            } else {
                "A database operation failed. Please try again.".to_string()
            }
        }
        ErrorCode::DbConstraintViolation => "This action would violate a data rule. Please check your input.".to_string(),
        ErrorCode::ConfigNotFound => "Configuration not found. Please check your settings.".to_string(),
        ErrorCode::ConfigInvalid => "Invalid configuration. Please review your settings.".to_string(),
        ErrorCode::ConfigMissingField => or("Required configuration is missing."),
        ErrorCode::SerializationFailed | ErrorCode::DeserializationFailed => {
            "Failed to process data. Please check your input and try again.".to_string()
        }
        ErrorCode::InvalidFormat => or("The data format is invalid."),
        ErrorCode::ValidationFailed => or("Validation failed. Please check your input."),
        ErrorCode::MissingRequiredField => or("A required field is missing."),
        ErrorCode::InvalidFieldValue => or("A field contains an invalid value."),
        ErrorCode::InternalError | ErrorCode::LockPoisoned => internal_message(error),
        ErrorCode::Unknown => {
            if !message.is_empty() && message.chars().count() < MAX_UNKNOWN_MESSAGE_LEN {
                message.to_string()
            } else {
                "An unknown error occurred. Please check the technical details for more information.".to_string()
            }
        }
        ErrorCode::DbNotFound => or("An error occurred. Please try again."),
    }
}

/// Raw messages that look like stack dumps are replaced
fn internal_message(error: &ErrorValue) -> String {
    if !error.message.is_empty() && !error.message.contains("stack") {
        return error.message.clone();
    }
    match error.context_str("operation") {
        Some(operation) => format!("Failed to {}. Please try again.", operation),
        None => "An unexpected error occurred. Please try again. If the problem persists, check the technical details below."
            .to_string(),
    }
}
