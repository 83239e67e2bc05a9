//! Scripted replay of shell interactions
//!
//! A script is a YAML list of steps. Each step drives one public operation
//! (open a card, fire a widget callback, publish an event, report an error,
//! call the host, ...) against a fresh [`AppContext`] backed by a
//! [`RecordingBridge`]. Deferred events are drained after every step, the
//! way a UI event loop would run them before the next user action.
//!
//! ```yaml
//! - step: open-card
//!   card: 1
//! - step: widget
//!   window: card-1
//!   event: minimize
//! - step: report
//!   code: VALIDATION_FAILED
//!   message: must contain @
//!   field: email
//! - step: call
//!   function: get_users
//!   response: { success: true, data: [] }
//! ```

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use colored::Colorize;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::bridge::{ApiResponse, HostCall, LOG_MESSAGE, RecordingBridge, response_event_name};
use crate::config::Config;
use crate::connection::ConnectionStats;
use crate::context::AppContext;
use crate::errors::{ErrorCode, ErrorState, ErrorValue, ReportOptions, Thrown};
use crate::events::{BusEvent, CONNECTION_STATE, PublishOptions, WEBUI_PORT};
use crate::logging::{LogEntry, LogLevel};
use crate::windows::{CardCatalog, Panel, PanelLayout, Viewport, WidgetEvent, WindowEntry};

/// Budget for `call` steps that script no response
const UNANSWERED_CALL_TIMEOUT: Duration = Duration::from_millis(50);

/// Where a `throw` step enters the error boundary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrowOrigin {
    Framework,
    #[default]
    Window,
    Promise,
}

/// One scripted interaction
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case")]
pub enum Step {
    /// Click a launcher card
    OpenCard { card: u32 },

    /// Windowing widget callback
    Widget { window: String, event: WidgetEvent },

    /// Raw bus publish
    Publish {
        event: String,
        #[serde(default)]
        payload: Value,
        #[serde(default)]
        deferred: bool,
    },

    /// Report a canonical error to the global error service
    Report {
        code: ErrorCode,
        #[serde(default)]
        message: String,
        field: Option<String>,
        source: Option<String>,
        title: Option<String>,
    },

    /// Uncaught failure reaching the error boundary
    Throw {
        #[serde(default)]
        origin: ThrowOrigin,
        message: String,
        /// Treat as an HTTP failure with this status
        status: Option<u16>,
    },

    /// Request/response call to the host
    ///
    /// `response` is delivered as soon as the host is invoked; without one
    /// the call times out. `fail` makes the host reject this function from
    /// now on.
    Call {
        function: String,
        #[serde(default)]
        args: Vec<String>,
        response: Option<ApiResponse>,
        #[serde(default)]
        fail: bool,
        #[serde(rename = "timeout-ms")]
        timeout_ms: Option<u64>,
    },

    /// Feed one call outcome straight into the connection monitor
    RecordCall {
        success: bool,
        #[serde(rename = "latency-ms")]
        latency_ms: Option<u64>,
    },

    RecordError { message: String },

    /// Host connection state change (`connection:state`)
    Connection { state: String, connected: bool },

    /// Host port announcement (`webui:port`)
    Port { port: Value },

    Dismiss,

    TogglePanel { panel: Panel },

    /// "Show main menu": minimize every window
    MinimizeAll,

    CloseAll,

    Search { query: String },

    ClearSearch,

    /// Application log line through the root logger
    Log {
        level: LogLevel,
        message: String,
        #[serde(default)]
        context: Value,
    },
}

/// Outcome of a `call` step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOutcome {
    pub function: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
}

/// Final state after a script ran
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub steps: usize,
    pub windows: Vec<WindowEntry>,
    pub focused: Option<String>,
    pub active_error: Option<ErrorState>,
    pub connection: ConnectionStats,
    pub viewport: Viewport,
    pub search_query: String,
    /// Ids of the cards matching the current search
    pub visible_cards: Vec<u32>,
    pub calls: Vec<CallOutcome>,
    /// Host invocations other than log forwarding
    pub host_calls: Vec<HostCall>,
    pub events: Vec<BusEvent>,
    pub log: Vec<LogEntry>,
}

type ScriptedResponses = Arc<Mutex<HashMap<String, VecDeque<ApiResponse>>>>;

/// Runs steps against one fresh context
pub struct Simulator {
    ctx: AppContext,
    bridge: Arc<RecordingBridge>,
    responses: ScriptedResponses,
    layout: PanelLayout,
    catalog: CardCatalog,
    calls: Vec<CallOutcome>,
    steps: usize,
}

impl Simulator {
    pub fn new(config: Config) -> Result<Self> {
        debug!("Simulator::new: called");
        let bridge = Arc::new(RecordingBridge::new());
        let ctx = AppContext::new(config, bridge.clone()).context("Invalid configuration")?;

        let responses: ScriptedResponses = Arc::new(Mutex::new(HashMap::new()));
        let hook_responses = Arc::clone(&responses);
        let router = ctx.router().clone();
        bridge.on_invoke(move |call: &HostCall| {
            let next = hook_responses
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get_mut(&call.function)
                .and_then(VecDeque::pop_front);
            if let Some(response) = next {
                router.dispatch(&response_event_name(&call.function), response);
            }
        });

        // Long-lived services subscribe before the first step runs
        ctx.connection_monitor();
        ctx.coordinator();
        ctx.error_service();
        let layout = ctx.panel_layout();
        let catalog = ctx.card_catalog();
        ctx.publish_ready();

        Ok(Self {
            ctx,
            bridge,
            responses,
            layout,
            catalog,
            calls: Vec::new(),
            steps: 0,
        })
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn bridge(&self) -> &Arc<RecordingBridge> {
        &self.bridge
    }

    pub async fn run(&mut self, steps: &[Step]) -> Result<()> {
        for (index, step) in steps.iter().enumerate() {
            self.apply(step)
                .await
                .with_context(|| format!("Step {} failed", index + 1))?;
        }
        Ok(())
    }

    /// Apply one step and drain deferred deliveries
    pub async fn apply(&mut self, step: &Step) -> Result<()> {
        debug!(?step, "Simulator::apply: called");
        let coordinator = self.ctx.coordinator();
        match step {
            Step::OpenCard { card } => {
                let card = self
                    .catalog
                    .get(*card)
                    .cloned()
                    .ok_or_else(|| eyre!("Unknown card: {}", card))?;
                let viewport = self.layout.viewport();
                coordinator.open_card(&card, &viewport);
            }
            Step::Widget { window, event } => {
                coordinator.handle_widget_event(window, *event);
            }
            Step::Publish {
                event,
                payload,
                deferred,
            } => {
                let options = PublishOptions { deferred: *deferred };
                self.ctx.bus().publish_with(event, payload.clone(), options);
            }
            Step::Report {
                code,
                message,
                field,
                source,
                title,
            } => {
                let mut error = ErrorValue::new(*code, message.clone());
                error.field = field.clone();
                let options = ReportOptions {
                    source: source.clone(),
                    title: title.clone(),
                };
                self.ctx.error_service().report(error, options);
            }
            Step::Throw {
                origin,
                message,
                status,
            } => {
                let thrown = match status {
                    Some(status) => Thrown::http(*status, message.clone()),
                    None => Thrown::from(message.as_str()),
                };
                let boundary = self.ctx.error_boundary();
                match origin {
                    ThrowOrigin::Framework => boundary.capture_framework(thrown),
                    ThrowOrigin::Window => boundary.capture_window(thrown),
                    ThrowOrigin::Promise => boundary.capture_rejection(thrown),
                };
            }
            Step::Call {
                function,
                args,
                response,
                fail,
                timeout_ms,
            } => {
                self.call(function, args, response.clone(), *fail, *timeout_ms).await;
            }
            Step::RecordCall { success, latency_ms } => {
                let monitor = self.ctx.connection_monitor();
                monitor.record_call(*success);
                if let Some(ms) = latency_ms {
                    monitor.record_latency(*ms);
                }
            }
            Step::RecordError { message } => {
                self.ctx.connection_monitor().record_error(message);
            }
            Step::Connection { state, connected } => {
                self.ctx.bus().publish(
                    CONNECTION_STATE,
                    serde_json::json!({"state": state, "connected": connected}),
                );
            }
            Step::Port { port } => {
                self.ctx.bus().publish(WEBUI_PORT, serde_json::json!({"port": port}));
            }
            Step::Dismiss => self.ctx.error_service().dismiss(),
            Step::TogglePanel { panel } => {
                self.layout.toggle(*panel);
            }
            Step::MinimizeAll => {
                coordinator.minimize_all_windows();
            }
            Step::CloseAll => {
                coordinator.clear_all_windows();
            }
            Step::Search { query } => {
                self.catalog.search(query);
            }
            Step::ClearSearch => self.catalog.clear_search(),
            Step::Log {
                level,
                message,
                context,
            } => {
                self.ctx.root_logger().log(*level, message.clone(), context.clone(), None);
            }
        }
        self.ctx.bus().run_deferred();
        self.steps += 1;
        Ok(())
    }

    async fn call(
        &mut self,
        function: &str,
        args: &[String],
        response: Option<ApiResponse>,
        fail: bool,
        timeout_ms: Option<u64>,
    ) {
        if fail {
            self.bridge.fail_function(function);
        }
        let timeout = match (timeout_ms, &response) {
            (Some(ms), _) => Duration::from_millis(ms),
            (None, Some(_)) => self.ctx.config().bridge.call_timeout(),
            (None, None) => UNANSWERED_CALL_TIMEOUT,
        };
        if let Some(response) = response {
            self.responses
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .entry(function.to_string())
                .or_default()
                .push_back(response);
        }

        let result = self
            .ctx
            .backend_client()
            .call_with_timeout(function, args, timeout)
            .await;
        let outcome = match result {
            Ok(data) => CallOutcome {
                function: function.to_string(),
                ok: true,
                data: Some(data),
                error: None,
            },
            Err(error) => CallOutcome {
                function: function.to_string(),
                ok: false,
                data: None,
                error: Some(error),
            },
        };
        self.calls.push(outcome);
    }

    /// Snapshot of everything the script changed
    pub fn report(&self) -> SimulationReport {
        let coordinator = self.ctx.coordinator();
        SimulationReport {
            steps: self.steps,
            windows: coordinator.entries(),
            focused: coordinator.focused_window(),
            active_error: self.ctx.error_service().active_error(),
            connection: self.ctx.connection_monitor().stats(),
            viewport: self.layout.viewport(),
            search_query: self.catalog.query(),
            visible_cards: self.catalog.filtered().iter().map(|c| c.id).collect(),
            calls: self.calls.clone(),
            host_calls: self
                .bridge
                .calls()
                .into_iter()
                .filter(|c| c.function != LOG_MESSAGE)
                .collect(),
            events: self.ctx.bus().get_history(None, None),
            log: self.ctx.logging().snapshot(),
        }
    }
}

/// Parse a YAML script
pub fn parse_script(content: &str) -> Result<Vec<Step>> {
    serde_yaml::from_str(content).context("Failed to parse simulation script")
}

pub fn load_script<P: AsRef<Path>>(path: P) -> Result<Vec<Step>> {
    let content = fs::read_to_string(&path).context("Failed to read simulation script")?;
    parse_script(&content)
}

/// Load `path`, run it against a fresh context built from `config` and report
pub async fn run_simulation<P: AsRef<Path>>(config: Config, path: P) -> Result<SimulationReport> {
    let steps = load_script(&path)?;
    info!(steps = steps.len(), path = %path.as_ref().display(), "Running simulation");
    let mut simulator = Simulator::new(config)?;
    simulator.run(&steps).await?;
    Ok(simulator.report())
}

/// Human-readable report
pub fn render_text(report: &SimulationReport) -> String {
    let mut out = String::new();

    out.push_str(&format!("{} ({})\n", "Windows".bold(), report.windows.len()));
    if report.windows.is_empty() {
        out.push_str(&format!("  {}\n", "none".dimmed()));
    }
    for window in &report.windows {
        let (marker, status) = if window.focused {
            ("\u{25CF}".green(), "focused".green())
        } else if window.minimized {
            ("\u{25CB}".dimmed(), "minimized".yellow())
        } else {
            ("\u{25CB}".normal(), "open".normal())
        };
        out.push_str(&format!("  {} {:<10} {:<24} {}\n", marker, window.id, window.title, status));
    }

    out.push_str(&format!("\n{}\n", "Active error".bold()));
    match &report.active_error {
        Some(state) => {
            out.push_str(&format!(
                "  {} {}: {}\n",
                format!("[{}]", state.error.code).as_str().red(),
                state.title,
                state.user_message
            ));
            out.push_str(&format!("  source: {}  id: {}\n", state.source, state.id));
        }
        None => out.push_str(&format!("  {}\n", "none".dimmed())),
    }

    let conn = &report.connection;
    out.push_str(&format!("\n{}\n", "Connection".bold()));
    let state = if conn.connected {
        conn.state.as_str().green()
    } else {
        conn.state.as_str().yellow()
    };
    out.push_str(&format!(
        "  state: {}  port: {}  calls: {}/{} ({}%)  reconnects: {}  latency: {}ms\n",
        state,
        conn.port.as_deref().unwrap_or("-"),
        conn.successful_calls,
        conn.total_calls,
        conn.ping_success,
        conn.reconnects,
        conn.latency
    ));
    if let Some(error) = &conn.last_error {
        out.push_str(&format!("  last error: {}\n", error.as_str().red()));
    }

    if !report.calls.is_empty() {
        out.push_str(&format!("\n{} ({})\n", "Calls".bold(), report.calls.len()));
        for call in &report.calls {
            match &call.error {
                None => out.push_str(&format!("  {} {}\n", "\u{2713}".green(), call.function)),
                Some(error) => out.push_str(&format!("  {} {} {}\n", "\u{2717}".red(), call.function, error)),
            }
        }
    }

    out.push_str(&format!("\n{} ({})\n", "Events".bold(), report.events.len()));
    for event in &report.events {
        out.push_str(&format!(
            "  {} {} {}\n",
            format!("#{}", event.id).as_str().dimmed(),
            event.name.as_str().cyan(),
            event.payload
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ERROR_CAPTURED, WINDOW_HOME_SELECTED, WINDOW_OPENED};

    fn config() -> Config {
        let mut config = Config::default();
        config.logging.console_sink = false;
        config
    }

    async fn simulate(script: &str) -> SimulationReport {
        let steps = parse_script(script).unwrap();
        let mut simulator = Simulator::new(config()).unwrap();
        simulator.run(&steps).await.unwrap();
        simulator.report()
    }

    #[test]
    fn test_parse_all_step_kinds() {
        let script = r#"
- step: open-card
  card: 1
- step: widget
  window: card-1
  event: minimize
- step: publish
  event: user:created
  payload: {userId: 1}
  deferred: true
- step: report
  code: VALIDATION_FAILED
  message: must contain @
  field: email
- step: throw
  origin: promise
  message: boom
- step: call
  function: get_users
  timeout-ms: 10
- step: record-call
  success: true
  latency-ms: 5
- step: record-error
  message: lost
- step: connection
  state: connected
  connected: true
- step: port
  port: 8080
- step: dismiss
- step: toggle-panel
  panel: top
- step: minimize-all
- step: close-all
- step: search
  query: settings
- step: clear-search
- step: log
  level: warn
  message: hello
"#;
        let steps = parse_script(script).unwrap();
        assert_eq!(steps.len(), 17);
        assert_eq!(steps[0], Step::OpenCard { card: 1 });
        assert_eq!(steps[10], Step::Dismiss);
        assert_eq!(steps[11], Step::TogglePanel { panel: Panel::Top });
    }

    #[test]
    fn test_parse_rejects_unknown_step() {
        assert!(parse_script("- step: teleport\n").is_err());
    }

    #[tokio::test]
    async fn test_open_minimize_and_reopen_card() {
        let report = simulate(
            r#"
- step: open-card
  card: 1
- step: open-card
  card: 2
- step: widget
  window: card-1
  event: minimize
- step: open-card
  card: 1
"#,
        )
        .await;

        assert_eq!(report.steps, 4);
        assert_eq!(report.windows.len(), 2);
        assert_eq!(report.focused.as_deref(), Some("card-1"));
        assert!(report.windows.iter().all(|w| !w.minimized));
        let opened = report.events.iter().filter(|e| e.name == WINDOW_OPENED).count();
        assert_eq!(opened, 2);
    }

    #[tokio::test]
    async fn test_unknown_card_fails_step() {
        let steps = parse_script("- step: open-card\n  card: 99\n").unwrap();
        let mut simulator = Simulator::new(config()).unwrap();
        let err = simulator.run(&steps).await.unwrap_err();
        assert!(format!("{:?}", err).contains("Unknown card: 99"));
    }

    #[tokio::test]
    async fn test_report_and_dismiss() {
        let report = simulate(
            r#"
- step: report
  code: VALIDATION_FAILED
  message: must contain @
  field: email
  source: form
"#,
        )
        .await;

        let active = report.active_error.unwrap();
        assert_eq!(active.title, "Validation Error");
        assert_eq!(active.user_message, "email: must contain @");
        assert_eq!(active.source, "form");
        assert!(report.events.iter().any(|e| e.name == ERROR_CAPTURED));

        let report = simulate("- step: report\n  code: UNKNOWN\n  message: x\n- step: dismiss\n").await;
        assert!(report.active_error.is_none());
    }

    #[tokio::test]
    async fn test_throw_uses_boundary_sources() {
        let report = simulate("- step: throw\n  origin: promise\n  message: boom\n").await;
        let active = report.active_error.unwrap();
        assert_eq!(active.source, "promise");
        assert_eq!(active.title, "Unhandled Promise Rejection");

        let report = simulate("- step: throw\n  message: missing\n  status: 404\n").await;
        let active = report.active_error.unwrap();
        assert_eq!(active.source, "window");
        assert_eq!(active.error.code, ErrorCode::ResourceNotFound);
    }

    #[tokio::test]
    async fn test_calls_feed_connection_monitor() {
        let report = simulate(
            r#"
- step: port
  port: 8080
- step: connection
  state: connected
  connected: true
- step: call
  function: get_users
  response: {success: true, data: [{id: 1}]}
- step: call
  function: get_system_info
  timeout-ms: 10
"#,
        )
        .await;

        assert_eq!(report.calls.len(), 2);
        assert!(report.calls[0].ok);
        assert_eq!(report.calls[0].data.as_ref().unwrap()[0]["id"], 1);
        assert!(!report.calls[1].ok);
        assert_eq!(
            report.calls[1].error.as_ref().unwrap().message,
            "Backend call timeout: get_system_info"
        );

        let conn = &report.connection;
        assert_eq!(conn.port.as_deref(), Some("8080"));
        assert!(conn.connected);
        assert_eq!(conn.reconnects, 1);
        assert_eq!(conn.total_calls, 2);
        assert_eq!(conn.successful_calls, 1);
        assert_eq!(conn.ping_success, 50);
        assert_eq!(report.host_calls.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_host_call() {
        let report = simulate("- step: call\n  function: delete_user\n  fail: true\n").await;
        let error = report.calls[0].error.as_ref().unwrap();
        assert_eq!(error.code, ErrorCode::InternalError);
        assert_eq!(error.message, "Failed to call backend: delete_user");
    }

    #[tokio::test]
    async fn test_deferred_publish_drained_after_step() {
        let report = simulate("- step: publish\n  event: user:created\n  payload: {userId: 1}\n  deferred: true\n").await;
        assert!(report.events.iter().any(|e| e.name == "user:created"));
    }

    #[tokio::test]
    async fn test_minimize_all_and_search() {
        let report = simulate(
            r#"
- step: open-card
  card: 1
- step: open-card
  card: 2
- step: minimize-all
- step: search
  query: "  "
"#,
        )
        .await;

        assert!(report.windows.iter().all(|w| w.minimized));
        assert!(report.focused.is_none());
        let home = report.events.iter().find(|e| e.name == WINDOW_HOME_SELECTED).unwrap();
        assert_eq!(home.payload["count"], 2);
        assert_eq!(report.visible_cards.len(), 12);
    }

    #[tokio::test]
    async fn test_log_step_reaches_backend_history() {
        let report = simulate("- step: log\n  level: warn\n  message: hello\n  context: {password: x}\n").await;
        let entry = report.log.iter().find(|e| e.message == "hello").unwrap();
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.context["password"], "[REDACTED]");
    }

    #[tokio::test]
    async fn test_render_text_sections() {
        let report = simulate("- step: open-card\n  card: 1\n").await;
        let text = render_text(&report);
        assert!(text.contains("Windows"));
        assert!(text.contains("card-1"));
        assert!(text.contains("Active error"));
        assert!(text.contains("Connection"));
        assert!(text.contains(WINDOW_OPENED));
    }
}
