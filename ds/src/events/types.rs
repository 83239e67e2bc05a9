//! Event envelope and event-name vocabulary
//!
//! Names are plain strings so independent components can publish and
//! subscribe without sharing an enum. The constants below are the catalogue
//! produced by this crate:
//! - Errors: `error:captured`
//! - Windows: `window:opened`, `window:closed`, `window:focused`, ...
//! - UI: `ui:<panel>:toggled`, `search:updated`, `search:cleared`
//! - App/connection: `app:ready`, `connection:state`, `webui:port`

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ERROR_CAPTURED: &str = "error:captured";

pub const WINDOW_OPENED: &str = "window:opened";
pub const WINDOW_CLOSED: &str = "window:closed";
pub const WINDOW_FOCUSED: &str = "window:focused";
pub const WINDOW_BLURRED: &str = "window:blurred";
pub const WINDOW_MINIMIZED: &str = "window:minimized";
pub const WINDOW_MAXIMIZED: &str = "window:maximized";
pub const WINDOW_RESTORED: &str = "window:restored";
pub const WINDOW_REFOCUSED: &str = "window:refocused";
pub const WINDOW_HOME_SELECTED: &str = "window:home-selected";

pub const SEARCH_UPDATED: &str = "search:updated";
pub const SEARCH_CLEARED: &str = "search:cleared";
pub const APP_READY: &str = "app:ready";
pub const CONNECTION_STATE: &str = "connection:state";
pub const WEBUI_PORT: &str = "webui:port";

/// `ui:<panel>:toggled`
pub fn ui_toggled(panel: &str) -> String {
    format!("ui:{}:toggled", panel)
}

/// A published event as stored in history and handed to subscribers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Bus-scoped monotonic id
    pub id: u64,
    pub name: String,
    pub payload: Value,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl BusEvent {
    pub(crate) fn new(id: u64, name: &str, payload: Value) -> Self {
        Self {
            id,
            name: name.to_string(),
            payload,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Options for [`EventBus::subscribe_with`](super::EventBus::subscribe_with)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Remove the subscription after its first invocation
    pub once: bool,
    /// Immediately replay the most recent matching event, if any
    pub replay_last: bool,
}

impl SubscribeOptions {
    pub fn once() -> Self {
        Self {
            once: true,
            replay_last: false,
        }
    }

    pub fn replay_last() -> Self {
        Self {
            once: false,
            replay_last: true,
        }
    }
}

/// Options for [`EventBus::publish_with`](super::EventBus::publish_with)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Queue delivery instead of running handlers inline
    pub deferred: bool,
}

impl PublishOptions {
    pub fn deferred() -> Self {
        Self { deferred: true }
    }
}

/// Point-in-time counters for a bus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    pub enabled: bool,
    /// Named subscriptions across all event names
    pub listeners: usize,
    pub any_listeners: usize,
    pub history_size: usize,
}
