//! Task Tracking
//!
//! A [`Task`] is one submitted query's full lifecycle. The bridge runs at most
//! one task at a time, so instead of a task table there is a single
//! [`TaskSlot`] that holds either the pending task or the last resolved one.
//!
//! # Single-flight
//!
//! The slot moves between three phases:
//!
//! ```text
//!   Idle --begin()--> Busy(task) --lease settles/drops--> Idle
//!   Idle --begin_reset()--> Resetting --permit drops--> Idle
//! ```
//!
//! Every transition out of `Idle` hands back an RAII value ([`TaskLease`] or
//! [`ResetPermit`]). Dropping it returns the slot to `Idle`, so a caller that
//! abandons a future mid-await can never leave the slot wedged.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::messages::{now_ms, ErrorEvent, ProgressEvent, QueryResponse};

/// Task identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a task ID from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a new unique task ID
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("task_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Get the string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Remote call outstanding
    Pending,
    /// Remote call settled with a backend response (which may itself be an error)
    Completed,
    /// Remote call failed at the transport level or was abandoned
    Failed,
}

impl TaskStatus {
    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }

    /// Whether the task has resolved
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One submitted query
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier
    pub id: TaskId,
    /// The trimmed query text
    pub query: String,
    /// Current status
    pub status: TaskStatus,
    /// When the task was submitted (Unix timestamp ms)
    pub started_at: u64,
    /// When the remote call settled (Unix timestamp ms)
    pub resolved_at: Option<u64>,
    /// Progress events in arrival order
    pub progress_log: Vec<ProgressEvent>,
    /// First error event correlated to this task
    pub error: Option<ErrorEvent>,
    /// The response; set exactly once, on resolution
    pub response: Option<QueryResponse>,
}

impl Task {
    /// Create a new pending task
    #[must_use]
    pub fn new(id: TaskId, query: String) -> Self {
        Self {
            id,
            query,
            status: TaskStatus::Pending,
            started_at: now_ms(),
            resolved_at: None,
            progress_log: Vec::new(),
            error: None,
            response: None,
        }
    }

    /// Append a progress event; ignored once the task has resolved
    pub fn record_progress(&mut self, event: ProgressEvent) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.progress_log.push(event);
        true
    }

    /// Attach the terminal error; only the first one sticks
    pub fn record_error(&mut self, event: ErrorEvent) -> bool {
        if self.status.is_terminal() || self.error.is_some() {
            return false;
        }
        self.error = Some(event);
        true
    }

    /// Mark the task completed with the backend's response
    pub fn complete(&mut self, response: QueryResponse) {
        self.resolve(TaskStatus::Completed, response);
    }

    /// Mark the task failed with a synthesized response
    pub fn fail(&mut self, response: QueryResponse) {
        self.resolve(TaskStatus::Failed, response);
    }

    fn resolve(&mut self, status: TaskStatus, response: QueryResponse) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.response = Some(response);
        self.resolved_at = Some(now_ms());
    }

    /// Milliseconds between submission and resolution (or now, while pending)
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.resolved_at
            .unwrap_or_else(now_ms)
            .saturating_sub(self.started_at)
    }
}

/// Phase of the task slot
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotPhase {
    /// No task pending
    Idle,
    /// A task is pending
    Busy(TaskId),
    /// A session reset is running
    Resetting,
}

#[derive(Debug)]
struct SlotState {
    phase: SlotPhase,
    /// Pending task while `Busy`, otherwise the last resolved task
    task: Option<Task>,
    /// The pending task's remote call has settled; events no longer apply
    sealed: bool,
}

/// The single active-task slot shared by the orchestrator and session holder
#[derive(Debug)]
pub struct TaskSlot {
    state: Mutex<SlotState>,
}

impl Default for TaskSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskSlot {
    /// Create an idle slot
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                phase: SlotPhase::Idle,
                task: None,
                sealed: false,
            }),
        }
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> SlotPhase {
        self.state.lock().phase.clone()
    }

    /// Whether a task is pending
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self.state.lock().phase, SlotPhase::Busy(_))
    }

    /// Snapshot of the pending task
    #[must_use]
    pub fn active_task(&self) -> Option<Task> {
        let state = self.state.lock();
        match state.phase {
            SlotPhase::Busy(_) => state.task.clone(),
            _ => None,
        }
    }

    /// Snapshot of the last resolved task, retained until the next submission
    #[must_use]
    pub fn last_task(&self) -> Option<Task> {
        let state = self.state.lock();
        match state.phase {
            SlotPhase::Busy(_) => None,
            _ => state.task.clone(),
        }
    }

    /// Claim the slot for a new task
    ///
    /// # Errors
    ///
    /// `OrchestratorBusy` while another task is pending, `ResetInProgress`
    /// while a reset is running.
    pub fn begin(self: &Arc<Self>, query: String) -> Result<TaskLease, BridgeError> {
        let mut state = self.state.lock();
        match &state.phase {
            SlotPhase::Busy(task_id) => Err(BridgeError::OrchestratorBusy {
                task_id: task_id.clone(),
            }),
            SlotPhase::Resetting => Err(BridgeError::ResetInProgress),
            SlotPhase::Idle => {
                let id = TaskId::generate();
                state.phase = SlotPhase::Busy(id.clone());
                state.task = Some(Task::new(id.clone(), query));
                state.sealed = false;
                Ok(TaskLease {
                    slot: Arc::clone(self),
                    id,
                    settled: false,
                })
            }
        }
    }

    /// Claim the slot for a session reset
    ///
    /// # Errors
    ///
    /// `SessionBusy` while a task is pending, `ResetInProgress` while another
    /// reset is running.
    pub fn begin_reset(self: &Arc<Self>) -> Result<ResetPermit, BridgeError> {
        let mut state = self.state.lock();
        match &state.phase {
            SlotPhase::Busy(task_id) => Err(BridgeError::SessionBusy {
                task_id: task_id.clone(),
            }),
            SlotPhase::Resetting => Err(BridgeError::ResetInProgress),
            SlotPhase::Idle => {
                state.phase = SlotPhase::Resetting;
                Ok(ResetPermit {
                    slot: Arc::clone(self),
                })
            }
        }
    }

    /// Stop attributing events to task `id`
    ///
    /// Called from the transport's delivery path the moment the task's remote
    /// call settles, ahead of the lease being settled by its owner. A stale
    /// id is ignored.
    pub fn seal(&self, id: &TaskId) {
        let mut state = self.state.lock();
        if matches!(&state.phase, SlotPhase::Busy(busy) if busy == id) {
            state.sealed = true;
        }
    }

    /// Run `f` against the pending task, if there is one still taking events
    pub(crate) fn with_active<R>(&self, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
        let mut state = self.state.lock();
        if state.sealed || !matches!(state.phase, SlotPhase::Busy(_)) {
            return None;
        }
        state.task.as_mut().map(f)
    }

    fn finish(&self, id: &TaskId, status: TaskStatus, response: QueryResponse) -> Option<Task> {
        let mut state = self.state.lock();
        if state.phase != SlotPhase::Busy(id.clone()) {
            return None;
        }
        state.phase = SlotPhase::Idle;
        let task = state.task.as_mut()?;
        match status {
            TaskStatus::Failed => task.fail(response),
            _ => task.complete(response),
        }
        Some(task.clone())
    }

    fn end_reset(&self) {
        let mut state = self.state.lock();
        if state.phase == SlotPhase::Resetting {
            state.phase = SlotPhase::Idle;
        }
    }
}

/// Exclusive claim on the slot for one pending task
///
/// Settle it with [`TaskLease::complete`] or [`TaskLease::fail`]. Dropping an
/// unsettled lease fails the task and frees the slot.
#[derive(Debug)]
pub struct TaskLease {
    slot: Arc<TaskSlot>,
    id: TaskId,
    settled: bool,
}

impl TaskLease {
    /// The task this lease covers
    #[must_use]
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Resolve the task as completed; returns the resolved snapshot
    pub fn complete(mut self, response: QueryResponse) -> Option<Task> {
        self.settled = true;
        self.slot.finish(&self.id, TaskStatus::Completed, response)
    }

    /// Resolve the task as failed; returns the resolved snapshot
    pub fn fail(mut self, response: QueryResponse) -> Option<Task> {
        self.settled = true;
        self.slot.finish(&self.id, TaskStatus::Failed, response)
    }
}

impl Drop for TaskLease {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        tracing::warn!(task_id = %self.id, "Task abandoned before the remote call settled");
        let response = QueryResponse::communication_failure(&"query abandoned before completion");
        self.slot.finish(&self.id, TaskStatus::Failed, response);
    }
}

/// Exclusive claim on the slot for a session reset
#[derive(Debug)]
pub struct ResetPermit {
    slot: Arc<TaskSlot>,
}

impl Drop for ResetPermit {
    fn drop(&mut self) {
        self.slot.end_reset();
    }
}
