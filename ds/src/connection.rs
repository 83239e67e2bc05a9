//! Connection monitor
//!
//! Pure observer of the host connection. Listens to `connection:state` and
//! `webui:port` on the bus, counts call outcomes reported by the bridge
//! layer, and exposes a computed [`ConnectionStats`] snapshot.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::events::{CONNECTION_STATE, EventBus, Unsubscribe, WEBUI_PORT};
use crate::state::{Observable, Subscription};

/// State reported before the host says anything
pub const INITIAL_STATE: &str = "connecting";

/// Read-only snapshot, recomputed on every read
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub state: String,
    pub connected: bool,
    pub last_error: Option<String>,
    pub port: Option<String>,
    /// Milliseconds taken by the last successful call
    pub latency: u64,
    pub uptime_secs: u64,
    pub reconnects: u64,
    /// Percentage of successful calls; 100 before any call
    pub ping_success: u32,
    pub total_calls: u64,
    pub successful_calls: u64,
}

#[derive(Clone, Debug)]
struct MonitorState {
    state: String,
    connected: bool,
    last_error: Option<String>,
    port: Option<String>,
    latency: u64,
    port_announced_at: Option<Instant>,
    reconnects: u64,
    total_calls: u64,
    successful_calls: u64,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            state: INITIAL_STATE.to_string(),
            connected: false,
            last_error: None,
            port: None,
            latency: 0,
            port_announced_at: None,
            reconnects: 0,
            total_calls: 0,
            successful_calls: 0,
        }
    }

    fn snapshot(&self) -> ConnectionStats {
        ConnectionStats {
            state: self.state.clone(),
            connected: self.connected,
            last_error: self.last_error.clone(),
            port: self.port.clone(),
            latency: self.latency,
            uptime_secs: self.port_announced_at.map_or(0, |t| t.elapsed().as_secs()),
            reconnects: self.reconnects,
            ping_success: ping_success(self.successful_calls, self.total_calls),
            total_calls: self.total_calls,
            successful_calls: self.successful_calls,
        }
    }
}

/// `round(successful / total * 100)`, or 100 with no calls
pub fn ping_success(successful: u64, total: u64) -> u32 {
    if total == 0 {
        return 100;
    }
    (successful as f64 / total as f64 * 100.0).round() as u32
}

pub struct ConnectionMonitor {
    state: Observable<MonitorState>,
    subscriptions: Mutex<Vec<Unsubscribe>>,
}

impl ConnectionMonitor {
    /// Start observing `bus`
    pub fn new(bus: &EventBus) -> Self {
        debug!("ConnectionMonitor::new: subscribing");
        let state = Observable::new(MonitorState::new());

        let on_state = state.clone();
        let connection = bus.subscribe(CONNECTION_STATE, move |payload, _| {
            let label = payload.get("state").and_then(Value::as_str).map(str::to_string);
            let connected = payload.get("connected").and_then(Value::as_bool).unwrap_or(false);
            on_state.update(|s| {
                if let Some(label) = label {
                    s.state = label;
                }
                s.connected = connected;
                if connected {
                    s.reconnects += 1;
                }
            });
        });

        let on_port = state.clone();
        let port = bus.subscribe(WEBUI_PORT, move |payload, _| {
            let port = match payload.get("port") {
                Some(Value::String(p)) => Some(p.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            };
            on_port.update(|s| {
                s.port = port;
                s.port_announced_at = Some(Instant::now());
            });
        });

        Self {
            state,
            subscriptions: Mutex::new(vec![connection, port]),
        }
    }

    pub fn stats(&self) -> ConnectionStats {
        self.state.with(MonitorState::snapshot)
    }

    pub fn record_call(&self, success: bool) {
        self.state.update(|s| {
            s.total_calls += 1;
            if success {
                s.successful_calls += 1;
            }
        });
    }

    pub fn record_error(&self, message: &str) {
        self.state.update(|s| s.last_error = Some(message.to_string()));
    }

    pub fn record_latency(&self, millis: u64) {
        self.state.update(|s| s.latency = millis);
    }

    /// Watch snapshots as counters change
    pub fn watch<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&ConnectionStats) + Send + Sync + 'static,
    {
        self.state.subscribe(move |s| watcher(&s.snapshot()))
    }

    /// Release the bus subscriptions; idempotent
    pub fn shutdown(&self) {
        let subscriptions: Vec<Unsubscribe> = self.subscriptions().drain(..).collect();
        if !subscriptions.is_empty() {
            debug!("ConnectionMonitor::shutdown: releasing subscriptions");
        }
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }

    pub fn is_listening(&self) -> bool {
        !self.subscriptions().is_empty()
    }

    fn subscriptions(&self) -> MutexGuard<'_, Vec<Unsubscribe>> {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_stats() {
        let bus = EventBus::default();
        let stats = ConnectionMonitor::new(&bus).stats();
        assert_eq!(stats.state, "connecting");
        assert!(!stats.connected);
        assert_eq!(stats.ping_success, 100);
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.uptime_secs, 0);
        assert!(stats.port.is_none());
    }

    #[test]
    fn test_connection_events_count_reconnects() {
        let bus = EventBus::default();
        let monitor = ConnectionMonitor::new(&bus);

        bus.publish(CONNECTION_STATE, json!({"state": "connected", "connected": true}));
        bus.publish(CONNECTION_STATE, json!({"state": "disconnected", "connected": false}));
        bus.publish(CONNECTION_STATE, json!({"state": "connected", "connected": true}));

        let stats = monitor.stats();
        assert_eq!(stats.state, "connected");
        assert!(stats.connected);
        assert_eq!(stats.reconnects, 2);
    }

    #[test]
    fn test_port_announcement() {
        let bus = EventBus::default();
        let monitor = ConnectionMonitor::new(&bus);
        bus.publish(WEBUI_PORT, json!({"port": 8080}));
        assert_eq!(monitor.stats().port.as_deref(), Some("8080"));
    }

    #[test]
    fn test_ping_success_rounding() {
        assert_eq!(ping_success(0, 0), 100);
        assert_eq!(ping_success(1, 3), 33);
        assert_eq!(ping_success(2, 3), 67);
        assert_eq!(ping_success(1, 2), 50);
        assert_eq!(ping_success(0, 4), 0);
    }

    #[test]
    fn test_record_call_and_error() {
        let bus = EventBus::default();
        let monitor = ConnectionMonitor::new(&bus);
        monitor.record_call(true);
        monitor.record_call(true);
        monitor.record_call(false);
        monitor.record_error("Backend call timeout: get_users");
        monitor.record_latency(42);

        let stats = monitor.stats();
        assert_eq!(stats.total_calls, 3);
        assert_eq!(stats.successful_calls, 2);
        assert_eq!(stats.ping_success, 67);
        assert_eq!(stats.latency, 42);
        assert_eq!(stats.last_error.as_deref(), Some("Backend call timeout: get_users"));
    }

    #[test]
    fn test_shutdown_releases_subscriptions() {
        let bus = EventBus::default();
        let monitor = ConnectionMonitor::new(&bus);
        assert_eq!(bus.stats().listeners, 2);

        monitor.shutdown();
        monitor.shutdown();

        assert_eq!(bus.stats().listeners, 0);
        assert!(!monitor.is_listening());
        bus.publish(CONNECTION_STATE, json!({"state": "connected", "connected": true}));
        assert_eq!(monitor.stats().reconnects, 0);
    }

    #[test]
    fn test_drop_releases_subscriptions() {
        let bus = EventBus::default();
        drop(ConnectionMonitor::new(&bus));
        assert_eq!(bus.stats().listeners, 0);
    }

    #[test]
    fn test_watch_receives_snapshots() {
        let bus = EventBus::default();
        let monitor = ConnectionMonitor::new(&bus);
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let seen_clone = std::sync::Arc::clone(&seen);
        let _sub = monitor.watch(move |stats| seen_clone.lock().unwrap().push(stats.total_calls));

        monitor.record_call(true);
        monitor.record_call(false);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }
}
