//! Event Bus - in-process, namespaced publish/subscribe
//!
//! Subscribers register per event name (or for every event via
//! `subscribe_any`). Publishing appends to a bounded history and then runs
//! the handlers inline, or queues them for the deferred dispatcher.
//!
//! Handlers run without any bus lock held, so they may publish, subscribe
//! or unsubscribe re-entrantly. A handler that panics is isolated: its
//! siblings still run.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::types::{BusEvent, BusStats, PublishOptions, SubscribeOptions};

/// Default history capacity (events)
pub const DEFAULT_MAX_HISTORY: usize = 300;

/// Default bus namespace
pub const DEFAULT_NAMESPACE: &str = "app";

type Handler = Arc<dyn Fn(&Value, &BusEvent) + Send + Sync>;
type AnyHandler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

struct NamedSubscription {
    id: u64,
    once: bool,
    handler: Handler,
}

struct BusState {
    namespace: String,
    max_history: usize,
    enabled: bool,
    /// Shared by event ids and subscription ids
    next_id: u64,
    subscriptions: HashMap<String, Vec<NamedSubscription>>,
    any_subscriptions: Vec<(u64, AnyHandler)>,
    history: VecDeque<BusEvent>,
}

impl BusState {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn trim_history(&mut self) {
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    fn last_matching(&self, name: &str) -> Option<BusEvent> {
        self.history.iter().rev().find(|e| e.name == name).cloned()
    }
}

/// Central publish/subscribe hub with bounded, replayable history
pub struct EventBus {
    state: Arc<Mutex<BusState>>,
    deferred: Mutex<VecDeque<BusEvent>>,
    wake: Arc<Notify>,
}

impl EventBus {
    /// Create a bus with the given namespace and history cap
    pub fn new(namespace: impl Into<String>, max_history: usize) -> Self {
        let namespace = namespace.into();
        debug!(%namespace, max_history, "EventBus::new: creating event bus");
        Self {
            state: Arc::new(Mutex::new(BusState {
                namespace,
                max_history,
                enabled: true,
                next_id: 1,
                subscriptions: HashMap::new(),
                any_subscriptions: Vec::new(),
                history: VecDeque::new(),
            })),
            deferred: Mutex::new(VecDeque::new()),
            wake: Arc::new(Notify::new()),
        }
    }

    /// Reset namespace and history cap, evicting history beyond the new cap
    pub fn init(&self, namespace: impl Into<String>, max_history: usize) {
        let namespace = namespace.into();
        debug!(%namespace, max_history, "EventBus::init: called");
        let mut state = self.state();
        state.namespace = namespace;
        state.max_history = max_history;
        state.trim_history();
    }

    pub fn namespace(&self) -> String {
        self.state().namespace.clone()
    }

    pub fn max_history(&self) -> usize {
        self.state().max_history
    }

    /// Gate all publishing; a disabled bus drops `publish` calls entirely
    pub fn set_enabled(&self, enabled: bool) {
        debug!(enabled, "EventBus::set_enabled: called");
        self.state().enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    /// Subscribe to `name` with default options
    pub fn subscribe<F>(&self, name: &str, handler: F) -> Unsubscribe
    where
        F: Fn(&Value, &BusEvent) + Send + Sync + 'static,
    {
        self.subscribe_with(name, handler, SubscribeOptions::default())
    }

    /// Subscribe to `name`, invoking the handler once and then removing it
    pub fn once<F>(&self, name: &str, handler: F) -> Unsubscribe
    where
        F: Fn(&Value, &BusEvent) + Send + Sync + 'static,
    {
        self.subscribe_with(name, handler, SubscribeOptions::once())
    }

    /// Subscribe to `name`
    ///
    /// With `replay_last`, the handler is called before this returns with the
    /// most recent `name` event in history (if any). When `once` is also set,
    /// that replay is the single permitted call: the subscription is not kept
    /// and the returned handle does nothing.
    pub fn subscribe_with<F>(&self, name: &str, handler: F, options: SubscribeOptions) -> Unsubscribe
    where
        F: Fn(&Value, &BusEvent) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let (id, replay) = {
            let mut state = self.state();
            let replay = if options.replay_last {
                state.last_matching(name)
            } else {
                None
            };
            if options.once && replay.is_some() {
                (None, replay)
            } else {
                let id = state.next_id();
                state
                    .subscriptions
                    .entry(name.to_string())
                    .or_default()
                    .push(NamedSubscription {
                        id,
                        once: options.once,
                        handler: Arc::clone(&handler),
                    });
                (Some(id), replay)
            }
        };
        debug!(%name, ?id, ?options, replaying = replay.is_some(), "EventBus::subscribe_with: registered");

        if let Some(event) = replay {
            invoke_named(&handler, &event);
        }

        match id {
            Some(id) => Unsubscribe {
                state: Arc::downgrade(&self.state),
                target: Target::Named {
                    name: name.to_string(),
                    id,
                },
            },
            None => Unsubscribe::noop(),
        }
    }

    /// Receive every published event regardless of name
    pub fn subscribe_any<F>(&self, handler: F) -> Unsubscribe
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let id = {
            let mut state = self.state();
            let id = state.next_id();
            state.any_subscriptions.push((id, Arc::new(handler)));
            id
        };
        debug!(id, "EventBus::subscribe_any: registered");
        Unsubscribe {
            state: Arc::downgrade(&self.state),
            target: Target::Any(id),
        }
    }

    /// Publish and deliver inline
    ///
    /// Returns the event id, or `None` when the bus is disabled.
    pub fn publish(&self, name: &str, payload: Value) -> Option<u64> {
        self.publish_with(name, payload, PublishOptions::default())
    }

    /// Publish with options
    ///
    /// The event is always recorded in history immediately. With `deferred`,
    /// handler delivery is queued (FIFO) and runs on the next
    /// [`run_deferred`](Self::run_deferred) call or dispatcher wake-up.
    pub fn publish_with(&self, name: &str, payload: Value, options: PublishOptions) -> Option<u64> {
        let event = {
            let mut state = self.state();
            if !state.enabled {
                debug!(%name, "EventBus::publish_with: bus disabled, dropping event");
                return None;
            }
            let id = state.next_id();
            let event = BusEvent::new(id, name, payload);
            state.history.push_back(event.clone());
            state.trim_history();
            event
        };
        debug!(%name, id = event.id, deferred = options.deferred, "EventBus::publish_with");

        let id = event.id;
        if options.deferred {
            self.deferred_queue().push_back(event);
            self.wake.notify_one();
        } else {
            self.deliver(&event);
        }
        Some(id)
    }

    /// Deliver all queued deferred events in publish order
    ///
    /// Returns how many events were delivered.
    pub fn run_deferred(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.deferred_queue().pop_front();
            match next {
                Some(event) => {
                    self.deliver(&event);
                    delivered += 1;
                }
                None => break,
            }
        }
        if delivered > 0 {
            debug!(delivered, "EventBus::run_deferred: drained queue");
        }
        delivered
    }

    /// Number of deferred events waiting for delivery
    pub fn pending_deferred(&self) -> usize {
        self.deferred_queue().len()
    }

    /// History snapshot, optionally filtered by name and trimmed to the last `limit`
    ///
    /// A `limit` of zero means no limit.
    pub fn get_history(&self, name: Option<&str>, limit: Option<usize>) -> Vec<BusEvent> {
        let state = self.state();
        let mut events: Vec<BusEvent> = state
            .history
            .iter()
            .filter(|e| name.is_none_or(|n| e.name == n))
            .cloned()
            .collect();
        match limit {
            Some(limit) if limit > 0 && events.len() > limit => events.split_off(events.len() - limit),
            _ => events,
        }
    }

    /// Most recent history entry named `name`
    pub fn get_last(&self, name: &str) -> Option<BusEvent> {
        self.state().last_matching(name)
    }

    pub fn clear_history(&self) {
        debug!("EventBus::clear_history: called");
        self.state().history.clear();
    }

    pub fn clear_all_subscriptions(&self) {
        debug!("EventBus::clear_all_subscriptions: called");
        let mut state = self.state();
        state.subscriptions.clear();
        state.any_subscriptions.clear();
    }

    pub fn stats(&self) -> BusStats {
        let state = self.state();
        BusStats {
            enabled: state.enabled,
            listeners: state.subscriptions.values().map(Vec::len).sum(),
            any_listeners: state.any_subscriptions.len(),
            history_size: state.history.len(),
        }
    }

    /// Named subscriptions currently registered for `name`
    pub fn listener_count(&self, name: &str) -> usize {
        self.state().subscriptions.get(name).map_or(0, Vec::len)
    }

    fn deliver(&self, event: &BusEvent) {
        let named: Vec<(u64, Handler)> = self
            .state()
            .subscriptions
            .get(&event.name)
            .map(|subs| subs.iter().map(|s| (s.id, Arc::clone(&s.handler))).collect())
            .unwrap_or_default();

        for (id, handler) in named {
            if self.claim_named(&event.name, id) {
                invoke_named(&handler, event);
            }
        }

        let any: Vec<(u64, AnyHandler)> = self
            .state()
            .any_subscriptions
            .iter()
            .map(|(id, h)| (*id, Arc::clone(h)))
            .collect();

        for (id, handler) in any {
            let live = self.state().any_subscriptions.iter().any(|(aid, _)| *aid == id);
            if live && catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(event = %event.name, id = event.id, "EventBus: any-handler panicked");
            }
        }
    }

    /// Check that subscription `id` is still registered, consuming it if one-shot
    ///
    /// Unsubscribing from inside an earlier handler in the same delivery
    /// makes this return false, so the handler is skipped.
    fn claim_named(&self, name: &str, id: u64) -> bool {
        let mut state = self.state();
        let Some(subs) = state.subscriptions.get_mut(name) else {
            return false;
        };
        let Some(pos) = subs.iter().position(|s| s.id == id) else {
            return false;
        };
        if subs[pos].once {
            subs.remove(pos);
            if subs.is_empty() {
                state.subscriptions.remove(name);
            }
        }
        true
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn deferred_queue(&self) -> MutexGuard<'_, VecDeque<BusEvent>> {
        self.deferred.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE, DEFAULT_MAX_HISTORY)
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        // Wake the dispatcher so it notices the bus is gone and exits
        self.wake.notify_one();
    }
}

fn invoke_named(handler: &Handler, event: &BusEvent) {
    if catch_unwind(AssertUnwindSafe(|| handler(&event.payload, event))).is_err() {
        warn!(event = %event.name, id = event.id, "EventBus: handler panicked");
    }
}

/// Spawn a tokio task that delivers deferred events as they are queued
///
/// The task holds only a weak reference and exits once the bus is dropped.
pub fn spawn_dispatcher(bus: &Arc<EventBus>) -> JoinHandle<()> {
    let weak = Arc::downgrade(bus);
    let wake = Arc::clone(&bus.wake);
    debug!("spawn_dispatcher: starting deferred dispatcher");
    tokio::spawn(async move {
        loop {
            wake.notified().await;
            let Some(bus) = weak.upgrade() else {
                debug!("spawn_dispatcher: bus dropped, shutting down");
                break;
            };
            bus.run_deferred();
        }
    })
}

/// Create an event bus wrapped in an Arc for shared ownership
pub fn create_event_bus() -> Arc<EventBus> {
    Arc::new(EventBus::default())
}

#[derive(Clone, Debug)]
enum Target {
    Named { name: String, id: u64 },
    Any(u64),
    Nothing,
}

/// Idempotent handle that removes one subscription
///
/// Dropping the handle does not unsubscribe.
#[derive(Clone, Debug)]
pub struct Unsubscribe {
    state: Weak<Mutex<BusState>>,
    target: Target,
}

impl Unsubscribe {
    /// A handle that does nothing
    pub fn noop() -> Self {
        Self {
            state: Weak::new(),
            target: Target::Nothing,
        }
    }

    /// Remove the subscription; safe to call repeatedly
    pub fn unsubscribe(&self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
        match &self.target {
            Target::Named { name, id } => {
                if let Some(subs) = state.subscriptions.get_mut(name) {
                    subs.retain(|s| s.id != *id);
                    if subs.is_empty() {
                        state.subscriptions.remove(name);
                    }
                }
            }
            Target::Any(id) => state.any_subscriptions.retain(|(aid, _)| aid != id),
            Target::Nothing => {}
        }
    }
}

impl std::fmt::Debug for BusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusState")
            .field("namespace", &self.namespace)
            .field("max_history", &self.max_history)
            .field("enabled", &self.enabled)
            .field("history", &self.history.len())
            .finish()
    }
}
