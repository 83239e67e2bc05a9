//! Deskshell - core services of a desktop-style application shell
//!
//! The shell hosts card windows inside a single web view and talks to a
//! native host process. This crate is everything between the two that does
//! not draw pixels: structured logging, an in-process event bus, error
//! canonicalisation and surfacing, window-state bookkeeping and connection
//! health.
//!
//! # Modules
//!
//! - [`logging`] - Logging backend, sinks and namespaced loggers
//! - [`events`] - Named publish/subscribe bus with bounded history
//! - [`errors`] - Error codes, user messages and the global error service
//! - [`bridge`] - Host function calls and response routing
//! - [`windows`] - Window list, panel layout and launcher cards
//! - [`connection`] - Connection statistics derived from bus events
//! - [`state`] - Observable value holder
//! - [`context`] - Composition root wiring the services together
//! - [`config`] - Configuration types and loading
//! - [`simulate`] - Scripted replay used by the `ds` binary
//! - [`cli`] - Command-line interface

pub mod bridge;
pub mod cli;
pub mod config;
pub mod connection;
pub mod context;
pub mod errors;
pub mod events;
pub mod logging;
pub mod simulate;
pub mod state;
pub mod windows;

// Re-export commonly used types
pub use bridge::{ApiResponse, BackendClient, BridgeError, HostBridge, NullBridge, RecordingBridge, ResponseRouter};
pub use config::Config;
pub use connection::{ConnectionMonitor, ConnectionStats};
pub use context::AppContext;
pub use errors::{ErrorBoundary, ErrorCode, ErrorState, ErrorValue, GlobalErrorService, ReportOptions, Thrown};
pub use events::{BusEvent, EventBus, PublishOptions, SubscribeOptions, Unsubscribe, create_event_bus};
pub use logging::{LogEntry, LogLevel, Logger, LoggingBackend, LoggingOptions};
pub use state::{Observable, Subscription};
pub use windows::{Card, CardCatalog, WidgetEvent, WindowEntry, WindowStateCoordinator};
