//! Host-side handler table shared by the transports

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;

use super::traits::{EventHandler, SubscriptionHandle};

/// Event name -> registered handlers, in registration order
#[derive(Default)]
pub(crate) struct ListenerTable {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<String, Vec<(u64, EventHandler)>>>,
}

impl ListenerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, event: &str, handler: EventHandler) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.handlers
            .write()
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        SubscriptionHandle {
            id,
            event: event.to_string(),
        }
    }

    pub(crate) fn remove(&self, handle: &SubscriptionHandle) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(&handle.event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != handle.id);
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(&handle.event);
        }
        removed
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        self.handlers.read().get(event).map_or(0, Vec::len)
    }

    /// Deliver `payload` to every handler for `event`; returns how many ran
    ///
    /// Handlers are called after the table lock is released, so a handler
    /// may register or remove listeners itself.
    pub(crate) fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let snapshot: Vec<EventHandler> = match self.handlers.read().get(event) {
            Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
            None => return 0,
        };
        for handler in &snapshot {
            handler(payload.clone());
        }
        snapshot.len()
    }

    pub(crate) fn clear(&self) {
        self.handlers.write().clear();
    }
}
