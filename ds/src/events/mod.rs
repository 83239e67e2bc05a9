//! Event Bus - decoupled in-process messaging
//!
//! Components publish named events with JSON payloads; any number of
//! subscribers react without knowing about each other.
//!
//! # Architecture
//!
//! ```text
//!   ErrorService      WindowCoordinator      ConnectionMonitor
//!   emits:            emits:                 subscribes:
//!   - error:captured  - window:opened        - connection:state
//!                     - window:closed        - webui:port
//!                     - window:focused ...
//!          │                 │                      ▲
//!          ▼                 ▼                      │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        EVENT BUS                            │
//! │   named subscriptions │ any-subscriptions │ bounded history │
//! │                 inline or deferred (FIFO) delivery          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use deskshell::events::{EventBus, SubscribeOptions};
//! use serde_json::json;
//!
//! let bus = EventBus::new("app", 300);
//! let unsub = bus.subscribe("user:created", |payload, event| {
//!     println!("#{} {}", event.id, payload);
//! });
//! bus.publish("user:created", json!({"userId": 1}));
//! unsub.unsubscribe();
//!
//! // Late subscribers can catch up on the last event
//! bus.subscribe_with("app:ready", |_, _| {}, SubscribeOptions::replay_last());
//! ```

mod bus;
mod types;

pub use bus::{DEFAULT_MAX_HISTORY, DEFAULT_NAMESPACE, EventBus, Unsubscribe, create_event_bus, spawn_dispatcher};
pub use types::{
    APP_READY, BusEvent, BusStats, CONNECTION_STATE, ERROR_CAPTURED, PublishOptions, SEARCH_CLEARED, SEARCH_UPDATED,
    SubscribeOptions, WEBUI_PORT, WINDOW_BLURRED, WINDOW_CLOSED, WINDOW_FOCUSED, WINDOW_HOME_SELECTED, WINDOW_MAXIMIZED,
    WINDOW_MINIMIZED, WINDOW_OPENED, WINDOW_REFOCUSED, WINDOW_RESTORED, ui_toggled,
};
