//! Named response routing for request/response host calls

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::oneshot;
use tracing::debug;

use super::messages::ApiResponse;

#[derive(Default)]
struct RouterState {
    next_id: u64,
    pending: HashMap<String, VecDeque<(u64, oneshot::Sender<ApiResponse>)>>,
}

/// Delivers named response events to waiting callers, exactly once each
///
/// Responses go to the oldest pending listener for the event name. A
/// response with nobody listening (for example one arriving after its
/// caller timed out) is dropped.
#[derive(Clone, Default)]
pub struct ResponseRouter {
    state: Arc<Mutex<RouterState>>,
}

impl ResponseRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a one-shot listener for `event`
    ///
    /// The listener is deregistered when the returned value is dropped,
    /// whether or not a response arrived.
    pub fn listen(&self, event: &str) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let id = {
            let mut state = self.state();
            state.next_id += 1;
            let id = state.next_id;
            state.pending.entry(event.to_string()).or_default().push_back((id, tx));
            id
        };
        debug!(%event, id, "ResponseRouter::listen: registered");
        PendingResponse {
            event: event.to_string(),
            id,
            receiver: rx,
            router: Arc::downgrade(&self.state),
        }
    }

    /// Deliver `response` to the oldest listener for `event`
    ///
    /// Returns false when nobody was listening.
    pub fn dispatch(&self, event: &str, response: ApiResponse) -> bool {
        let mut response = response;
        loop {
            let next = {
                let mut state = self.state();
                let Some(queue) = state.pending.get_mut(event) else {
                    break;
                };
                let next = queue.pop_front();
                if queue.is_empty() {
                    state.pending.remove(event);
                }
                next
            };
            let Some((id, tx)) = next else {
                break;
            };
            match tx.send(response) {
                Ok(()) => {
                    debug!(%event, id, "ResponseRouter::dispatch: delivered");
                    return true;
                }
                Err(returned) => response = returned,
            }
        }
        debug!(%event, "ResponseRouter::dispatch: no listener, dropping response");
        false
    }

    /// Listeners still waiting, across all event names
    pub fn pending_count(&self) -> usize {
        self.state().pending.values().map(VecDeque::len).sum()
    }

    fn state(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A registered listener awaiting one response
pub struct PendingResponse {
    event: String,
    id: u64,
    receiver: oneshot::Receiver<ApiResponse>,
    router: Weak<Mutex<RouterState>>,
}

impl PendingResponse {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Wait for the response; `None` if the router went away first
    pub async fn recv(&mut self) -> Option<ApiResponse> {
        (&mut self.receiver).await.ok()
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        let Some(router) = self.router.upgrade() else {
            return;
        };
        let mut state = router.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(queue) = state.pending.get_mut(&self.event) {
            queue.retain(|(id, _)| *id != self.id);
            if queue.is_empty() {
                state.pending.remove(&self.event);
            }
        }
    }
}
