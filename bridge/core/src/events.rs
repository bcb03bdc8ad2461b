//! Renderer Notifications
//!
//! One typed publish/subscribe set per notification category. Front-ends
//! register with `on_*` and must call [`EventHub::off`] to unregister; each
//! set has a fixed capacity so forgotten listeners surface as an error instead
//! of growing without bound.
//!
//! # Delivery
//!
//! Listeners run synchronously, in registration order, on the thread that
//! emits. The set's lock is released before any listener runs, so a listener
//! may call `on_*` or `off` itself.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::RenderIntent;
use crate::error::BridgeError;
use crate::messages::{
    ErrorEvent, ProgressEvent, SessionStatus, BRAIN_ERROR, PROGRESS_UPDATE, SESSION_EVENT,
    SESSION_RESET,
};
use crate::tasks::TaskId;

/// Default capacity of each listener set
pub const DEFAULT_MAX_LISTENERS: usize = 32;

/// Notification category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Progress correlated to the pending task
    Progress,
    /// Backend error events
    Error,
    /// Opaque session payloads from the backend
    Session,
    /// Completed session resets
    Reset,
}

impl EventKind {
    /// Event name used on the renderer boundary
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => PROGRESS_UPDATE,
            Self::Error => BRAIN_ERROR,
            Self::Session => SESSION_EVENT,
            Self::Reset => SESSION_RESET,
        }
    }

    /// Parse an event name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            PROGRESS_UPDATE => Some(Self::Progress),
            BRAIN_ERROR => Some(Self::Error),
            SESSION_EVENT => Some(Self::Session),
            SESSION_RESET => Some(Self::Reset),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration returned by the `on_*` methods
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId {
    kind: EventKind,
    id: u64,
}

impl ListenerId {
    /// Category this listener is registered for
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// Progress for the pending task
#[derive(Clone, Debug)]
pub struct ProgressNotice {
    /// Task the progress was correlated to
    pub task_id: TaskId,
    /// The validated event
    pub event: ProgressEvent,
    /// What to display
    pub intent: RenderIntent,
}

/// Backend error event
#[derive(Clone, Debug)]
pub struct ErrorNotice {
    /// Task the error was correlated to; `None` when no task was pending
    pub task_id: Option<TaskId>,
    /// Whether this became the task's recorded error, which the settled
    /// outcome carries
    pub attached: bool,
    /// The validated event
    pub event: ErrorEvent,
    /// What to display
    pub intent: RenderIntent,
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ListenerSet<T> {
    kind: EventKind,
    limit: usize,
    entries: RwLock<Vec<(u64, Listener<T>)>>,
}

impl<T> ListenerSet<T> {
    fn new(kind: EventKind, limit: usize) -> Self {
        Self {
            kind,
            limit,
            entries: RwLock::new(Vec::new()),
        }
    }

    fn add(&self, id: u64, listener: Listener<T>) -> Result<ListenerId, BridgeError> {
        let mut entries = self.entries.write();
        if entries.len() >= self.limit {
            return Err(BridgeError::TooManyListeners {
                kind: self.kind,
                limit: self.limit,
            });
        }
        entries.push((id, listener));
        Ok(ListenerId {
            kind: self.kind,
            id,
        })
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Listener<T>> = self
            .entries
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &snapshot {
            listener(value);
        }
        snapshot.len()
    }
}

/// Listener registry for the renderer boundary
pub struct EventHub {
    next_id: AtomicU64,
    progress: ListenerSet<ProgressNotice>,
    errors: ListenerSet<ErrorNotice>,
    session: ListenerSet<Value>,
    resets: ListenerSet<SessionStatus>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LISTENERS)
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("progress", &self.progress.len())
            .field("errors", &self.errors.len())
            .field("session", &self.session.len())
            .field("resets", &self.resets.len())
            .finish()
    }
}

impl EventHub {
    /// Create a hub allowing `max_per_kind` listeners per category
    #[must_use]
    pub fn new(max_per_kind: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            progress: ListenerSet::new(EventKind::Progress, max_per_kind),
            errors: ListenerSet::new(EventKind::Error, max_per_kind),
            session: ListenerSet::new(EventKind::Session, max_per_kind),
            resets: ListenerSet::new(EventKind::Reset, max_per_kind),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Listen for progress on the pending task
    ///
    /// # Errors
    ///
    /// `TooManyListeners` when the set is full.
    pub fn on_progress<F>(&self, listener: F) -> Result<ListenerId, BridgeError>
    where
        F: Fn(&ProgressNotice) + Send + Sync + 'static,
    {
        self.progress.add(self.next_id(), Arc::new(listener))
    }

    /// Listen for backend error events
    ///
    /// # Errors
    ///
    /// `TooManyListeners` when the set is full.
    pub fn on_error<F>(&self, listener: F) -> Result<ListenerId, BridgeError>
    where
        F: Fn(&ErrorNotice) + Send + Sync + 'static,
    {
        self.errors.add(self.next_id(), Arc::new(listener))
    }

    /// Listen for raw session payloads
    ///
    /// # Errors
    ///
    /// `TooManyListeners` when the set is full.
    pub fn on_session_event<F>(&self, listener: F) -> Result<ListenerId, BridgeError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.session.add(self.next_id(), Arc::new(listener))
    }

    /// Listen for completed resets; receives the post-reset status
    ///
    /// # Errors
    ///
    /// `TooManyListeners` when the set is full.
    pub fn on_session_reset<F>(&self, listener: F) -> Result<ListenerId, BridgeError>
    where
        F: Fn(&SessionStatus) + Send + Sync + 'static,
    {
        self.resets.add(self.next_id(), Arc::new(listener))
    }

    /// Unregister a listener; returns whether it was registered
    pub fn off(&self, id: ListenerId) -> bool {
        match id.kind {
            EventKind::Progress => self.progress.remove(id.id),
            EventKind::Error => self.errors.remove(id.id),
            EventKind::Session => self.session.remove(id.id),
            EventKind::Reset => self.resets.remove(id.id),
        }
    }

    /// Number of listeners registered for `kind`
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Progress => self.progress.len(),
            EventKind::Error => self.errors.len(),
            EventKind::Session => self.session.len(),
            EventKind::Reset => self.resets.len(),
        }
    }

    pub(crate) fn emit_progress(&self, notice: &ProgressNotice) -> usize {
        self.progress.emit(notice)
    }

    pub(crate) fn emit_error(&self, notice: &ErrorNotice) -> usize {
        self.errors.emit(notice)
    }

    pub(crate) fn emit_session_event(&self, payload: &Value) -> usize {
        self.session.emit(payload)
    }

    pub(crate) fn emit_session_reset(&self, status: &SessionStatus) -> usize {
        self.resets.emit(status)
    }
}
