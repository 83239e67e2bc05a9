//! Composition root
//!
//! One [`AppContext`] owns the logging backend, the event bus and the host
//! bridge, and hands the long-lived services built on them to whoever needs
//! them. Services with app-wide state (the active error slot, the window
//! list, connection statistics) are created once on first use and shared.

use std::sync::{Arc, OnceLock};

use chrono::Utc;
use eyre::Result;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bridge::{BackendClient, HostBridge, NullBridge, ResponseRouter};
use crate::config::Config;
use crate::connection::ConnectionMonitor;
use crate::errors::{ErrorBoundary, GlobalErrorService};
use crate::events::{APP_READY, EventBus, spawn_dispatcher};
use crate::logging::{Logger, LoggingBackend};
use crate::windows::{CardCatalog, PanelLayout, WindowStateCoordinator};

static SHARED: OnceLock<AppContext> = OnceLock::new();

/// Shared services for one running shell
pub struct AppContext {
    config: Config,
    logging: Arc<LoggingBackend>,
    bus: Arc<EventBus>,
    bridge: Arc<dyn HostBridge>,
    router: ResponseRouter,
    errors: OnceLock<Arc<GlobalErrorService>>,
    windows: OnceLock<Arc<WindowStateCoordinator>>,
    monitor: OnceLock<Arc<ConnectionMonitor>>,
}

impl AppContext {
    /// Validate `config` and build the backend, bus and sinks it describes
    pub fn new(config: Config, bridge: Arc<dyn HostBridge>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, bridge))
    }

    /// Process-wide context with default configuration and no host
    ///
    /// Created on first call and reused afterwards; prefer passing an
    /// explicit context where one is available.
    pub fn shared() -> &'static AppContext {
        SHARED.get_or_init(|| Self::build(Config::default(), Arc::new(NullBridge)))
    }

    fn build(config: Config, bridge: Arc<dyn HostBridge>) -> Self {
        debug!(
            namespace = %config.events.namespace,
            max_history = config.events.max_history,
            "AppContext::build: called"
        );
        let logging = Arc::new(LoggingBackend::new(config.logging.options()));
        if config.logging.console_sink {
            logging.enable_console_sink();
        }
        if config.logging.bridge_sink {
            logging.enable_bridge_sink(Arc::clone(&bridge));
        }
        let bus = Arc::new(EventBus::new(
            config.events.namespace.clone(),
            config.events.max_history,
        ));

        Self {
            config,
            logging,
            bus,
            bridge,
            router: ResponseRouter::new(),
            errors: OnceLock::new(),
            windows: OnceLock::new(),
            monitor: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn logging(&self) -> &Arc<LoggingBackend> {
        &self.logging
    }

    /// The shared bus
    ///
    /// Deferred publishes stay queued until [`start_dispatcher`](Self::start_dispatcher)
    /// is running or someone calls [`EventBus::run_deferred`].
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Deliver deferred bus events on a background tokio task
    ///
    /// Must be called inside a tokio runtime. The task ends once this
    /// context and every other owner of the bus are gone.
    pub fn start_dispatcher(&self) -> JoinHandle<()> {
        debug!(namespace = %self.config.events.namespace, "AppContext::start_dispatcher: called");
        spawn_dispatcher(&self.bus)
    }

    pub fn bridge(&self) -> &Arc<dyn HostBridge> {
        &self.bridge
    }

    /// Router that host response events are dispatched into
    pub fn router(&self) -> &ResponseRouter {
        &self.router
    }

    pub fn root_logger(&self) -> Logger {
        Logger::root(Arc::clone(&self.logging))
    }

    /// `frontend.<name>`, or the root logger with `context` bound when `name` is empty
    pub fn get_logger(&self, name: &str, context: Value) -> Logger {
        let root = self.root_logger();
        if name.is_empty() {
            root.with_context(context)
        } else {
            root.child(name, context)
        }
    }

    pub fn error_service(&self) -> Arc<GlobalErrorService> {
        Arc::clone(self.errors.get_or_init(|| {
            Arc::new(GlobalErrorService::new(
                Arc::clone(&self.bus),
                self.get_logger("errors", Value::Null),
            ))
        }))
    }

    pub fn error_boundary(&self) -> ErrorBoundary {
        ErrorBoundary::new(self.error_service())
    }

    pub fn coordinator(&self) -> Arc<WindowStateCoordinator> {
        Arc::clone(self.windows.get_or_init(|| {
            Arc::new(WindowStateCoordinator::new(
                Arc::clone(&self.bus),
                Arc::clone(&self.bridge),
                self.get_logger("windows", Value::Null),
            ))
        }))
    }

    pub fn connection_monitor(&self) -> Arc<ConnectionMonitor> {
        Arc::clone(
            self.monitor
                .get_or_init(|| Arc::new(ConnectionMonitor::new(&self.bus))),
        )
    }

    /// Client using the configured timeouts and feeding the connection monitor
    pub fn backend_client(&self) -> BackendClient {
        BackendClient::new(
            Arc::clone(&self.bridge),
            self.router.clone(),
            self.get_logger("bridge", Value::Null),
        )
        .with_timeouts(
            self.config.bridge.call_timeout(),
            self.config.bridge.diagnostics_timeout(),
        )
        .with_monitor(self.connection_monitor())
    }

    pub fn panel_layout(&self) -> PanelLayout {
        PanelLayout::new(Arc::clone(&self.bus), self.config.viewport.viewport())
    }

    pub fn card_catalog(&self) -> CardCatalog {
        CardCatalog::with_defaults(Arc::clone(&self.bus))
    }

    /// Announce that startup finished
    pub fn publish_ready(&self) -> Option<u64> {
        debug!("AppContext::publish_ready: called");
        let id = self
            .bus
            .publish(APP_READY, json!({"timestamp": Utc::now().timestamp_millis()}));
        self.root_logger().info("Application ready", json!({"namespace": self.bus.namespace()}));
        id
    }
}
