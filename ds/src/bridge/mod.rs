//! Host-process bridge
//!
//! The shell talks to its host process through named functions that take
//! JSON string arguments. Fire-and-forget notifications (`log_message`,
//! `window_state_change`) go straight through [`HostBridge::invoke`].
//! Request/response calls additionally wait for a named response event,
//! routed by [`ResponseRouter`] and raced against a timeout by
//! [`BackendClient`].
//!
//! ```text
//!  BackendClient::call("get_users")
//!      │  1. router.listen("db_response")   (guard deregisters on drop)
//!      │  2. bridge.invoke("get_users", args)
//!      │  3. timeout(30s, pending.recv())
//!      ▼
//!  host ──► router.dispatch("db_response", ApiResponse) ──► Result<Value, ErrorValue>
//! ```

mod client;
mod host;
mod messages;
mod router;

pub use client::{BackendClient, DEFAULT_CALL_TIMEOUT, DIAGNOSTICS_TIMEOUT};
pub use host::{BridgeError, HostBridge, HostCall, NullBridge, RecordingBridge};
pub use messages::{
    ApiErrorBody, ApiResponse, LOG_MESSAGE, LogMessage, SESSION_ID, StateChange, WINDOW_STATE_CHANGE,
    response_event_name,
};
pub use router::{PendingResponse, ResponseRouter};
