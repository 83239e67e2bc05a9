//! Error model and error surfacing
//!
//! ```text
//!  Result<T, ErrorValue> ─┐
//!  ErrorBoundary ─────────┼─► GlobalErrorService::report ─► active slot (one)
//!  (uncaught / rejected)  │          │
//!                         │          ├─► bus: error:captured
//!                         │          └─► logger: "Root error captured"
//! ```
//!
//! [`ErrorValue`] is the canonical value every failure is normalised into;
//! titles and user messages are pure functions of its code and fields.

mod boundary;
mod messages;
mod service;
mod types;

pub use boundary::{
    ErrorBoundary, REJECTION_TITLE, SOURCE_FRAMEWORK, SOURCE_PROMISE, SOURCE_WINDOW, extract_error_value,
    extract_title, infer_error_code, map_http_status,
};
pub use messages::{default_title, user_message};
pub use service::{DEFAULT_SOURCE, ErrorState, GlobalErrorService, ReportOptions};
pub use types::{ErrorCode, ErrorValue, Thrown};
