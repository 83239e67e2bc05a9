//! Window-state coordinator
//!
//! Keeps the app's view of open windows in step with the windowing widget.
//! Per window id:
//!
//! ```text
//!  absent ──add──► open(focused) ◄──restore/focus──► open(minimized) ──remove──► absent
//!                       └── maximized: orthogonal flag, cleared by restore
//! ```
//!
//! Every mutation publishes a `window:*` bus event and sends a best-effort
//! `window_state_change` notification to the host. At most one entry is
//! focused at any time.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tracing::debug;

use super::cards::Card;
use super::types::{CardWindow, WidgetEvent, WidgetOptions, WindowEntry, WindowState};
use super::viewport::{MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH, Viewport};
use crate::bridge::{HostBridge, StateChange, WINDOW_STATE_CHANGE};
use crate::events::{
    EventBus, WINDOW_BLURRED, WINDOW_CLOSED, WINDOW_FOCUSED, WINDOW_HOME_SELECTED, WINDOW_MAXIMIZED, WINDOW_MINIMIZED,
    WINDOW_OPENED, WINDOW_REFOCUSED, WINDOW_RESTORED,
};
use crate::logging::Logger;
use crate::state::{Observable, Subscription};

/// Title reported for ids the coordinator does not know
const UNKNOWN_TITLE: &str = "Unknown";

#[derive(Default)]
struct WindowIndex {
    by_card: HashMap<u32, String>,
    maximized: HashSet<String>,
}

/// Source of truth for the open-window list
pub struct WindowStateCoordinator {
    bus: Arc<EventBus>,
    bridge: Arc<dyn HostBridge>,
    logger: Logger,
    entries: Observable<Vec<WindowEntry>>,
    index: Mutex<WindowIndex>,
}

impl WindowStateCoordinator {
    pub fn new(bus: Arc<EventBus>, bridge: Arc<dyn HostBridge>, logger: Logger) -> Self {
        Self {
            bus,
            bridge,
            logger,
            entries: Observable::new(Vec::new()),
            index: Mutex::new(WindowIndex::default()),
        }
    }

    /// Register a newly opened window as the focused one
    ///
    /// An id that is already tracked is focused instead; returns false in
    /// that case.
    pub fn add_window(&self, id: &str, title: &str) -> bool {
        debug!(%id, %title, "WindowStateCoordinator::add_window: called");
        let added = self.entries.update_if(|entries| {
            if entries.iter().any(|e| e.id == id) {
                return false;
            }
            for entry in entries.iter_mut() {
                entry.focused = false;
            }
            entries.push(WindowEntry {
                id: id.to_string(),
                title: title.to_string(),
                minimized: false,
                focused: true,
            });
            true
        });
        if !added {
            self.focus_window(id);
            return false;
        }
        self.logger.info("Window opened", json!({"id": id, "title": title}));
        self.announce(WINDOW_OPENED, id, title);
        self.notify_host(id, WindowState::Focused, title);
        true
    }

    /// Focus `id` and unfocus every other window
    ///
    /// A minimized target stays minimized; callers restore explicitly.
    pub fn focus_window(&self, id: &str) -> bool {
        debug!(%id, "WindowStateCoordinator::focus_window: called");
        let found = self.entries.update_if(|entries| {
            if !entries.iter().any(|e| e.id == id) {
                return false;
            }
            for entry in entries.iter_mut() {
                entry.focused = entry.id == id;
            }
            true
        });
        if found {
            let title = self.title_of(id);
            self.announce(WINDOW_FOCUSED, id, &title);
            self.notify_host(id, WindowState::Focused, &title);
        }
        found
    }

    /// The widget reports `id` lost focus
    pub fn blur_window(&self, id: &str) -> bool {
        debug!(%id, "WindowStateCoordinator::blur_window: called");
        let found = self.modify(id, |entry| entry.focused = false);
        if found {
            let title = self.title_of(id);
            self.announce(WINDOW_BLURRED, id, &title);
            self.notify_host(id, WindowState::Blurred, &title);
        }
        found
    }

    pub fn minimize_window(&self, id: &str) -> bool {
        debug!(%id, "WindowStateCoordinator::minimize_window: called");
        let found = self.modify(id, |entry| {
            entry.minimized = true;
            entry.focused = false;
        });
        if found {
            let title = self.title_of(id);
            self.announce(WINDOW_MINIMIZED, id, &title);
            self.notify_host(id, WindowState::Minimized, &title);
        }
        found
    }

    /// Un-minimize `id`; also clears its maximized flag
    pub fn restore_window(&self, id: &str) -> bool {
        debug!(%id, "WindowStateCoordinator::restore_window: called");
        let found = self.modify(id, |entry| entry.minimized = false);
        if found {
            self.index().maximized.remove(id);
            let title = self.title_of(id);
            self.announce(WINDOW_RESTORED, id, &title);
            self.notify_host(id, WindowState::Restored, &title);
        }
        found
    }

    pub fn maximize_window(&self, id: &str) -> bool {
        debug!(%id, "WindowStateCoordinator::maximize_window: called");
        if !self.contains(id) {
            return false;
        }
        self.index().maximized.insert(id.to_string());
        let title = self.title_of(id);
        self.announce(WINDOW_MAXIMIZED, id, &title);
        self.notify_host(id, WindowState::Maximized, &title);
        true
    }

    /// Forget `id`, dropping its card index entry first; no-op if absent
    ///
    /// The entry is gone before `window:closed` goes out.
    pub fn remove_window(&self, id: &str) -> bool {
        debug!(%id, "WindowStateCoordinator::remove_window: called");
        if !self.contains(id) {
            return false;
        }
        let title = self.title_of(id);
        {
            let mut index = self.index();
            index.by_card.retain(|_, window_id| window_id != id);
            index.maximized.remove(id);
        }
        self.entries.update_if(|entries| {
            entries.retain(|e| e.id != id);
            true
        });
        self.announce(WINDOW_CLOSED, id, &title);
        self.notify_host(id, WindowState::Closed, &title);
        self.logger.info("Window closed", json!({"id": id, "title": title}));
        true
    }

    /// Close every window; returns how many were closed
    pub fn clear_all_windows(&self) -> usize {
        let ids: Vec<String> = self.entries.with(|entries| entries.iter().map(|e| e.id.clone()).collect());
        debug!(count = ids.len(), "WindowStateCoordinator::clear_all_windows: called");
        for id in &ids {
            self.remove_window(id);
        }
        let mut index = self.index();
        index.by_card.clear();
        index.maximized.clear();
        ids.len()
    }

    /// Minimize everything ("show main menu")
    ///
    /// Publishes `window:minimized` for each window that was not minimized,
    /// then `window:home-selected {count}`. Returns the window count.
    pub fn minimize_all_windows(&self) -> usize {
        let visible: Vec<String> = self
            .entries
            .with(|entries| entries.iter().filter(|e| !e.minimized).map(|e| e.id.clone()).collect());
        debug!(visible = visible.len(), "WindowStateCoordinator::minimize_all_windows: called");
        for id in &visible {
            self.minimize_window(id);
        }
        let count = self.window_count();
        self.bus.publish(WINDOW_HOME_SELECTED, json!({"count": count}));
        count
    }

    /// Open the window for `card`, or bring its existing window back
    pub fn open_card(&self, card: &Card, viewport: &Viewport) -> CardWindow {
        self.logger.info("Card clicked", json!({"id": card.id, "title": card.title}));

        let existing = self.window_for_card(card.id).filter(|id| self.contains(id));
        if let Some(id) = existing {
            self.logger.info("Focusing existing window", json!({"windowId": id}));
            if self.entry(&id).is_some_and(|e| e.minimized) {
                self.restore_window(&id);
            }
            self.focus_window(&id);
            self.bus.publish(WINDOW_REFOCUSED, json!({"id": id, "title": card.title}));
            return CardWindow::Refocused { id };
        }

        let id = format!("card-{}", card.id);
        let rect = viewport.available_rect();
        let options = WidgetOptions {
            id: id.clone(),
            title: format!("{} {}", card.icon, card.title),
            background: card.color.clone(),
            width: rect.width,
            height: rect.height,
            x: rect.left,
            y: rect.top,
            minwidth: MIN_WINDOW_WIDTH,
            minheight: MIN_WINDOW_HEIGHT,
            html: card.content.clone(),
        };
        self.index().by_card.insert(card.id, id.clone());
        self.add_window(&id, &card.title);
        CardWindow::Created(options)
    }

    /// Apply one widget lifecycle callback
    ///
    /// Each callback maps to exactly one mutation. The return value is the
    /// acknowledgement the widget expects; only `Close` is confirmed.
    pub fn handle_widget_event(&self, id: &str, event: WidgetEvent) -> bool {
        debug!(%id, ?event, "WindowStateCoordinator::handle_widget_event: called");
        match event {
            WidgetEvent::Focus => {
                self.focus_window(id);
                false
            }
            WidgetEvent::Blur => {
                self.blur_window(id);
                false
            }
            WidgetEvent::Minimize => {
                self.minimize_window(id);
                false
            }
            WidgetEvent::Maximize => {
                self.maximize_window(id);
                false
            }
            WidgetEvent::Restore => {
                self.restore_window(id);
                false
            }
            WidgetEvent::Close => {
                self.remove_window(id);
                true
            }
        }
    }

    pub fn entries(&self) -> Vec<WindowEntry> {
        self.entries.get()
    }

    pub fn entry(&self, id: &str) -> Option<WindowEntry> {
        self.entries.with(|entries| entries.iter().find(|e| e.id == id).cloned())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.with(|entries| entries.iter().any(|e| e.id == id))
    }

    pub fn window_count(&self) -> usize {
        self.entries.with(Vec::len)
    }

    pub fn minimized_count(&self) -> usize {
        self.entries.with(|entries| entries.iter().filter(|e| e.minimized).count())
    }

    pub fn has_focused_window(&self) -> bool {
        self.focused_window().is_some()
    }

    pub fn focused_window(&self) -> Option<String> {
        self.entries
            .with(|entries| entries.iter().find(|e| e.focused).map(|e| e.id.clone()))
    }

    pub fn is_maximized(&self, id: &str) -> bool {
        self.index().maximized.contains(id)
    }

    pub fn window_for_card(&self, card_id: u32) -> Option<String> {
        self.index().by_card.get(&card_id).cloned()
    }

    /// Watch the window list
    pub fn watch<F>(&self, watcher: F) -> Subscription
    where
        F: Fn(&Vec<WindowEntry>) + Send + Sync + 'static,
    {
        self.entries.subscribe(watcher)
    }

    fn modify(&self, id: &str, f: impl FnOnce(&mut WindowEntry)) -> bool {
        self.entries.update_if(|entries| match entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                f(entry);
                true
            }
            None => false,
        })
    }

    fn title_of(&self, id: &str) -> String {
        self.entry(id)
            .map(|e| e.title)
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
    }

    fn announce(&self, event: &str, id: &str, title: &str) {
        self.bus.publish(event, json!({"id": id, "title": title}));
    }

    /// Best-effort `window_state_change`; failures are only traced
    fn notify_host(&self, id: &str, state: WindowState, title: &str) {
        if !self.bridge.has_function(WINDOW_STATE_CHANGE) {
            return;
        }
        let payload = match serde_json::to_string(&StateChange::now(id, state, title)) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "WindowStateCoordinator::notify_host: serialize failed");
                return;
            }
        };
        if let Err(e) = self.bridge.invoke(WINDOW_STATE_CHANGE, &[payload]) {
            debug!(%id, state = state.as_str(), error = %e, "WindowStateCoordinator::notify_host: host call failed");
        }
    }

    fn index(&self) -> MutexGuard<'_, WindowIndex> {
        self.index.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::RecordingBridge;
    use crate::logging::LoggingBackend;
    use crate::windows::cards::default_cards;
    use proptest::prelude::*;
    use serde_json::Value;

    fn setup() -> (WindowStateCoordinator, Arc<EventBus>, Arc<RecordingBridge>) {
        let bus = Arc::new(EventBus::default());
        let bridge = Arc::new(RecordingBridge::new());
        let logger = Logger::root(Arc::new(LoggingBackend::default())).child("windows", Value::Null);
        (WindowStateCoordinator::new(bus.clone(), bridge.clone(), logger), bus, bridge)
    }

    fn focused_count(c: &WindowStateCoordinator) -> usize {
        c.entries().iter().filter(|e| e.focused).count()
    }

    fn host_states(bridge: &RecordingBridge) -> Vec<String> {
        bridge
            .calls_to(WINDOW_STATE_CHANGE)
            .iter()
            .map(|call| {
                let v: Value = serde_json::from_str(&call.args[0]).unwrap();
                v["state"].as_str().unwrap().to_string()
            })
            .collect()
    }

    #[test]
    fn test_add_window_focuses_newest() {
        let (c, bus, bridge) = setup();
        assert!(c.add_window("a", "A"));
        assert!(c.add_window("b", "B"));

        assert_eq!(c.focused_window().as_deref(), Some("b"));
        assert_eq!(focused_count(&c), 1);
        assert_eq!(bus.get_history(Some(WINDOW_OPENED), None).len(), 2);
        assert_eq!(host_states(&bridge), vec!["focused", "focused"]);
    }

    #[test]
    fn test_add_existing_id_keeps_one_entry() {
        let (c, _, _) = setup();
        c.add_window("a", "A");
        c.add_window("b", "B");
        assert!(!c.add_window("a", "A"));
        assert_eq!(c.window_count(), 2);
        assert_eq!(c.focused_window().as_deref(), Some("a"));
    }

    #[test]
    fn test_focus_does_not_clear_minimized() {
        let (c, _, _) = setup();
        c.add_window("a", "A");
        c.minimize_window("a");
        assert!(c.focus_window("a"));

        let entry = c.entry("a").unwrap();
        assert!(entry.focused);
        assert!(entry.minimized);
    }

    #[test]
    fn test_minimize_clears_focus_and_restore_clears_flag() {
        let (c, bus, _) = setup();
        c.add_window("a", "A");
        c.minimize_window("a");
        assert!(!c.has_focused_window());
        assert_eq!(c.minimized_count(), 1);

        c.restore_window("a");
        assert_eq!(c.minimized_count(), 0);
        assert_eq!(bus.get_last(WINDOW_RESTORED).unwrap().payload, json!({"id": "a", "title": "A"}));
    }

    #[test]
    fn test_maximize_is_orthogonal() {
        let (c, bus, bridge) = setup();
        c.add_window("a", "A");
        assert!(c.maximize_window("a"));
        assert!(c.is_maximized("a"));
        assert!(c.entry("a").unwrap().focused);
        assert!(bus.get_last(WINDOW_MAXIMIZED).is_some());

        c.restore_window("a");
        assert!(!c.is_maximized("a"));
        assert_eq!(host_states(&bridge), vec!["focused", "maximized", "restored"]);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let (c, bus, bridge) = setup();
        assert!(!c.focus_window("ghost"));
        assert!(!c.minimize_window("ghost"));
        assert!(!c.restore_window("ghost"));
        assert!(!c.maximize_window("ghost"));
        assert!(!c.remove_window("ghost"));
        assert_eq!(bus.stats().history_size, 0);
        assert!(bridge.calls().is_empty());
    }

    #[test]
    fn test_host_failures_are_swallowed() {
        let (c, bus, bridge) = setup();
        bridge.fail_function(WINDOW_STATE_CHANGE);
        assert!(c.add_window("a", "A"));
        assert!(c.minimize_window("a"));
        assert_eq!(bus.get_history(None, None).len(), 2);
    }

    #[test]
    fn test_host_without_state_function_is_skipped() {
        let bus = Arc::new(EventBus::default());
        let bridge = Arc::new(RecordingBridge::with_functions(&[]));
        let logger = Logger::root(Arc::new(LoggingBackend::default()));
        let c = WindowStateCoordinator::new(bus, bridge.clone(), logger);
        c.add_window("a", "A");
        assert!(bridge.calls().is_empty());
    }

    #[test]
    fn test_open_card_creates_then_refocuses() {
        let (c, bus, _) = setup();
        let card = &default_cards()[0];
        let viewport = Viewport::new(1280, 800);

        let created = c.open_card(card, &viewport);
        let CardWindow::Created(options) = &created else {
            panic!("expected a new window");
        };
        assert_eq!(options.id, "card-1");
        assert_eq!(options.title, format!("{} Angular", card.icon));
        assert_eq!(options.x, 10);
        assert_eq!(options.y, 84);
        assert_eq!(options.minwidth, 300);
        assert_eq!(c.window_for_card(1).as_deref(), Some("card-1"));

        c.minimize_window("card-1");
        let again = c.open_card(card, &viewport);

        assert_eq!(again, CardWindow::Refocused { id: "card-1".to_string() });
        let entry = c.entry("card-1").unwrap();
        assert!(entry.focused);
        assert!(!entry.minimized);
        assert_eq!(c.window_count(), 1);
        assert_eq!(
            bus.get_last(WINDOW_REFOCUSED).unwrap().payload,
            json!({"id": "card-1", "title": "Angular"})
        );
    }

    #[test]
    fn test_close_drops_card_index_and_acknowledges() {
        let (c, bus, bridge) = setup();
        let card = &default_cards()[1];
        c.open_card(card, &Viewport::default());

        assert!(c.handle_widget_event("card-2", WidgetEvent::Close));

        assert!(c.window_for_card(2).is_none());
        assert!(c.entries().is_empty());
        assert_eq!(
            bus.get_last(WINDOW_CLOSED).unwrap().payload,
            json!({"id": "card-2", "title": "Rsbuild"})
        );
        assert_eq!(host_states(&bridge).last().map(String::as_str), Some("closed"));

        assert!(matches!(c.open_card(card, &Viewport::default()), CardWindow::Created(_)));
    }

    #[test]
    fn test_widget_events_map_to_mutations() {
        let (c, bus, _) = setup();
        c.add_window("a", "A");
        c.add_window("b", "B");

        assert!(!c.handle_widget_event("a", WidgetEvent::Focus));
        assert_eq!(c.focused_window().as_deref(), Some("a"));
        c.handle_widget_event("a", WidgetEvent::Blur);
        assert!(!c.has_focused_window());
        assert!(bus.get_last(WINDOW_BLURRED).is_some());
        c.handle_widget_event("b", WidgetEvent::Minimize);
        assert!(c.entry("b").unwrap().minimized);
        c.handle_widget_event("b", WidgetEvent::Maximize);
        assert!(c.is_maximized("b"));
        c.handle_widget_event("b", WidgetEvent::Restore);
        assert!(!c.entry("b").unwrap().minimized);
    }

    #[test]
    fn test_minimize_all_windows() {
        let (c, bus, _) = setup();
        c.add_window("a", "A");
        c.add_window("b", "B");
        c.minimize_window("a");

        assert_eq!(c.minimize_all_windows(), 2);

        assert_eq!(c.minimized_count(), 2);
        assert!(!c.has_focused_window());
        assert_eq!(bus.get_history(Some(WINDOW_MINIMIZED), None).len(), 2);
        assert_eq!(bus.get_last(WINDOW_HOME_SELECTED).unwrap().payload["count"], 2);
    }

    #[test]
    fn test_clear_all_windows() {
        let (c, bus, _) = setup();
        c.open_card(&default_cards()[0], &Viewport::default());
        c.add_window("x", "X");

        assert_eq!(c.clear_all_windows(), 2);
        assert_eq!(c.window_count(), 0);
        assert!(c.window_for_card(1).is_none());
        assert_eq!(bus.get_history(Some(WINDOW_CLOSED), None).len(), 2);
    }

    #[test]
    fn test_watch_sees_changes() {
        let (c, _, _) = setup();
        let counts = Arc::new(Mutex::new(Vec::new()));
        let counts_clone = Arc::clone(&counts);
        let _sub = c.watch(move |entries| counts_clone.lock().unwrap().push(entries.len()));

        c.add_window("a", "A");
        c.remove_window("a");

        assert_eq!(*counts.lock().unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_watch_ignores_unknown_ids() {
        let (c, _, _) = setup();
        c.add_window("a", "A");
        let calls = Arc::new(Mutex::new(0));
        let calls_clone = Arc::clone(&calls);
        let _sub = c.watch(move |_| *calls_clone.lock().unwrap() += 1);

        c.focus_window("ghost");
        c.blur_window("ghost");
        c.minimize_window("ghost");
        c.restore_window("ghost");
        assert!(!c.add_window("a", "A"));
        assert_eq!(*calls.lock().unwrap(), 1);

        c.minimize_window("a");
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_closed_subscriber_sees_window_gone() {
        let (c, bus, _) = setup();
        let c = Arc::new(c);
        c.add_window("a", "A");
        c.add_window("b", "B");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let weak = Arc::downgrade(&c);
        bus.subscribe(WINDOW_CLOSED, move |payload, _| {
            if let (Some(c), Some(id)) = (weak.upgrade(), payload["id"].as_str()) {
                seen_clone.lock().unwrap().push((c.contains(id), c.window_count()));
            }
        });

        assert!(c.remove_window("a"));
        assert_eq!(*seen.lock().unwrap(), vec![(false, 1)]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(u8),
        Focus(u8),
        Blur(u8),
        Minimize(u8),
        Restore(u8),
        Remove(u8),
        MinimizeAll,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..5).prop_map(Op::Add),
            (0u8..5).prop_map(Op::Focus),
            (0u8..5).prop_map(Op::Blur),
            (0u8..5).prop_map(Op::Minimize),
            (0u8..5).prop_map(Op::Restore),
            (0u8..5).prop_map(Op::Remove),
            Just(Op::MinimizeAll),
        ]
    }

    proptest! {
        #[test]
        fn prop_at_most_one_focused(ops in proptest::collection::vec(op(), 0..40), target in 0u8..5) {
            let (c, _, _) = setup();
            for op in ops {
                match op {
                    Op::Add(n) => { c.add_window(&format!("w{}", n), "W"); }
                    Op::Focus(n) => { c.focus_window(&format!("w{}", n)); }
                    Op::Blur(n) => { c.blur_window(&format!("w{}", n)); }
                    Op::Minimize(n) => { c.minimize_window(&format!("w{}", n)); }
                    Op::Restore(n) => { c.restore_window(&format!("w{}", n)); }
                    Op::Remove(n) => { c.remove_window(&format!("w{}", n)); }
                    Op::MinimizeAll => { c.minimize_all_windows(); }
                }
                prop_assert!(focused_count(&c) <= 1);
                let ids: HashSet<String> = c.entries().into_iter().map(|e| e.id).collect();
                prop_assert_eq!(ids.len(), c.window_count());
            }

            let id = format!("w{}", target);
            if c.focus_window(&id) {
                prop_assert_eq!(focused_count(&c), 1);
                prop_assert_eq!(c.focused_window(), Some(id));
            }
        }
    }
}
