//! Context sanitization: redaction, string truncation and depth limiting

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Replacement for values stored under a redacted key
pub const REDACTED: &str = "[REDACTED]";

/// Replacement for values nested deeper than [`MAX_DEPTH`]
pub const TRUNCATED: &str = "[Truncated]";

/// Maximum nesting depth kept in log context
pub const MAX_DEPTH: usize = 4;

/// Maximum string length (in characters) kept in log context
pub const MAX_STRING_LEN: usize = 2000;

/// Lower-cased lookup set built from configured redact keys
pub fn redact_set<S: AsRef<str>>(keys: &[S]) -> HashSet<String> {
    keys.iter().map(|k| k.as_ref().to_lowercase()).collect()
}

/// Deep-walk `value`, redacting and truncating as configured
///
/// `serde_json::Value` is an owned tree, so reference cycles cannot occur;
/// the depth cap bounds cost for very deep payloads.
pub fn sanitize_value(value: &Value, redact: &HashSet<String>) -> Value {
    walk(value, redact, 0)
}

/// Sanitize a context map (the top level counts as depth 0)
pub fn sanitize_map(map: &Map<String, Value>, redact: &HashSet<String>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), redact_or_walk(k, v, redact, 1)))
        .collect()
}

fn walk(value: &Value, redact: &HashSet<String>, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String(TRUNCATED.to_string());
    }
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::String(s) => Value::String(truncate(s)),
        Value::Array(items) => Value::Array(items.iter().map(|v| walk(v, redact, depth + 1)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_or_walk(k, v, redact, depth + 1)))
                .collect(),
        ),
    }
}

fn redact_or_walk(key: &str, value: &Value, redact: &HashSet<String>, depth: usize) -> Value {
    if redact.contains(&key.to_lowercase()) {
        Value::String(REDACTED.to_string())
    } else {
        walk(value, redact, depth)
    }
}

fn truncate(s: &str) -> String {
    match s.char_indices().nth(MAX_STRING_LEN) {
        Some((byte_idx, _)) => format!("{}…", &s[..byte_idx]),
        None => s.to_string(),
    }
}
