//! Query Orchestrator
//!
//! Runs one query at a time and reconciles the three signals that describe
//! it: the reply to `processQuery`, progress events, and error events.
//!
//! # State machine
//!
//! ```text
//!            submit(q) ok             reply received         submit resumes
//!   Idle ───────────────────► Busy(task) ──────────────► Sealed ──────────────► Idle
//!                               │  progress_update          │  events discarded
//!                               │    -> progress log        │  submit(q) -> OrchestratorBusy
//!                               │  brain_error -> task error
//!                               │  submit(q) -> OrchestratorBusy
//! ```
//!
//! The task is sealed by the transport on its delivery path, so an event the
//! backend sends after its reply never reaches the task even if it is
//! delivered before `submit` gets to run again.
//!
//! # Correlation
//!
//! `processQuery` carries the task id. An event that names a different task
//! is dropped. An event that names no task belongs to whichever task is
//! pending. Progress that arrives with no task pending is discarded; errors
//! are always forwarded so a failure is never silent.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::dispatch::{self, Outcome, OutcomeOrigin, RenderIntent};
use crate::error::BridgeError;
use crate::events::{ErrorNotice, EventHub, ProgressNotice};
use crate::messages::{QueryConfig, QueryResponse, PROCESS_QUERY};
use crate::session::SessionHolder;
use crate::tasks::{Task, TaskId, TaskSlot};
use crate::transport::{SettleHook, TransportAdapter};
use crate::validation::{payload, QueryValidator};

/// Everything known about a settled query
#[derive(Clone, Debug)]
pub struct Resolution {
    /// The settled outcome
    pub outcome: Outcome,
    /// What to display for it
    pub intent: RenderIntent,
    /// Final snapshot of the task, including its progress log
    pub task: Option<Task>,
}

impl Resolution {
    /// The response, real or synthesized
    #[must_use]
    pub fn response(&self) -> &QueryResponse {
        &self.outcome.response
    }
}

/// Single-flight query state machine
pub struct QueryOrchestrator {
    transport: TransportAdapter,
    validator: QueryValidator,
    query_config: QueryConfig,
    slot: Arc<TaskSlot>,
    session: Arc<SessionHolder>,
    events: Arc<EventHub>,
}

impl QueryOrchestrator {
    /// Create an orchestrator sharing `slot` with the session holder
    #[must_use]
    pub fn new(
        transport: TransportAdapter,
        query_config: QueryConfig,
        slot: Arc<TaskSlot>,
        session: Arc<SessionHolder>,
        events: Arc<EventHub>,
    ) -> Self {
        Self {
            transport,
            validator: QueryValidator::default(),
            query_config,
            slot,
            session,
            events,
        }
    }

    /// Whether a query is pending
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    /// Snapshot of the pending task
    #[must_use]
    pub fn active_task(&self) -> Option<Task> {
        self.slot.active_task()
    }

    /// Snapshot of the last settled task
    #[must_use]
    pub fn last_task(&self) -> Option<Task> {
        self.slot.last_task()
    }

    /// Submit a query with the configured options
    ///
    /// # Errors
    ///
    /// See [`QueryOrchestrator::submit_with`].
    pub async fn submit(&self, query: &str) -> Result<Resolution, BridgeError> {
        self.submit_with(query, self.query_config).await
    }

    /// Submit a query and wait for it to settle
    ///
    /// Transport failures do not produce an `Err`: they settle the task as
    /// failed with a synthesized Error-typed response.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` before anything is sent, `OrchestratorBusy` while
    /// another query is pending, `ResetInProgress` during a session reset.
    pub async fn submit_with(
        &self,
        query: &str,
        config: QueryConfig,
    ) -> Result<Resolution, BridgeError> {
        let query = self.validator.validate(query)?;
        let lease = self.slot.begin(query.clone())?;
        let task_id = lease.id().clone();

        tracing::info!(
            task_id = %task_id,
            chars = query.chars().count(),
            "Query submitted"
        );

        let args = json!({
            "query": query,
            "config": config,
            "task_id": task_id,
        });

        let slot = Arc::clone(&self.slot);
        let sealed_id = task_id.clone();
        let on_settle: SettleHook = Box::new(move || slot.seal(&sealed_id));

        let (response, origin) = match self
            .transport
            .invoke_settled(PROCESS_QUERY, args, on_settle)
            .await
        {
            Ok(value) => (payload::query_response(&value), OutcomeOrigin::Backend),
            Err(e) => {
                tracing::warn!(task_id = %task_id, error = %e, "Query failed in transport");
                (
                    QueryResponse::communication_failure(&e),
                    OutcomeOrigin::Transport,
                )
            }
        };

        let task = match origin {
            OutcomeOrigin::Backend => lease.complete(response.clone()),
            OutcomeOrigin::Transport => lease.fail(response.clone()),
        };

        tracing::info!(
            task_id = %task_id,
            response_type = %response.response_type,
            success = response.success,
            progress_events = task.as_ref().map_or(0, |t| t.progress_log.len()),
            elapsed_ms = task.as_ref().map_or(0, Task::elapsed_ms),
            "Query resolved"
        );

        self.session.refresh_detached();

        let outcome = Outcome {
            task_id,
            response,
            origin,
            error: task.as_ref().and_then(|t| t.error.clone()),
        };
        let intent = dispatch::render_outcome(&outcome);

        Ok(Resolution {
            outcome,
            intent,
            task,
        })
    }

    /// Apply a raw `progress_update` payload to the pending task
    ///
    /// Returns the notice delivered to listeners, or `None` if the event was
    /// discarded.
    pub fn correlate_progress(&self, raw: &Value) -> Option<ProgressNotice> {
        let event = payload::progress_event(raw);

        let correlated = self.slot.with_active(|task| match &event.task_id {
            Some(claimed) if *claimed != task.id => Err(claimed.clone()),
            _ => {
                task.record_progress(event.clone());
                Ok(task.id.clone())
            }
        });

        let task_id = match correlated {
            Some(Ok(task_id)) => task_id,
            Some(Err(claimed)) => {
                tracing::debug!(claimed = %claimed, "Discarding progress for another task");
                return None;
            }
            None => {
                tracing::debug!(
                    current_step = event.current_step,
                    "Discarding progress, no query taking events"
                );
                return None;
            }
        };

        tracing::debug!(
            task_id = %task_id,
            kind = event.kind.label(),
            current_step = event.current_step,
            "Progress correlated"
        );

        let notice = ProgressNotice {
            intent: dispatch::progress_intent(&task_id, &event),
            task_id,
            event,
        };
        self.events.emit_progress(&notice);
        Some(notice)
    }

    /// Forward a raw `brain_error` payload, attaching it to the pending task
    /// when it belongs there
    pub fn correlate_error(&self, raw: &Value) -> ErrorNotice {
        let event = payload::error_event(raw);

        let correlated: Option<(TaskId, bool)> = self
            .slot
            .with_active(|task| match &event.task_id {
                Some(claimed) if *claimed != task.id => None,
                _ => {
                    let attached = task.record_error(event.clone());
                    if !attached {
                        tracing::debug!(task_id = %task.id, "Task already has an error");
                    }
                    Some((task.id.clone(), attached))
                }
            })
            .flatten();
        let (task_id, attached) = match correlated {
            Some((task_id, attached)) => (Some(task_id), attached),
            None => (None, false),
        };

        tracing::warn!(
            task_id = task_id.as_ref().map(TaskId::as_str),
            code = %event.error_code,
            recoverable = event.recoverable,
            message = %event.message,
            "Brain reported an error"
        );

        let notice = ErrorNotice {
            intent: dispatch::error_intent(task_id.as_ref(), &event),
            task_id,
            attached,
            event,
        };
        self.events.emit_error(&notice);
        notice
    }

    /// Pass a `session_event` payload to listeners unchanged
    pub fn relay_session_event(&self, raw: &Value) -> usize {
        let delivered = self.events.emit_session_event(raw);
        tracing::debug!(delivered, "Session event relayed");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{BrainErrorCode, ProgressKind, ResponseType};
    use crate::tasks::TaskStatus;
    use crate::transport::{BackendEndpoint, InProcessTransport};

    fn orchestrator() -> (Arc<QueryOrchestrator>, BackendEndpoint) {
        let (transport, endpoint) = InProcessTransport::new_pair();
        let adapter = TransportAdapter::new(Arc::new(transport));
        let slot = Arc::new(TaskSlot::new());
        let events = Arc::new(EventHub::default());
        let session = Arc::new(SessionHolder::new(
            adapter.clone(),
            Arc::clone(&slot),
            Arc::clone(&events),
        ));
        let orchestrator = Arc::new(QueryOrchestrator::new(
            adapter,
            QueryConfig::default(),
            slot,
            session,
            events,
        ));
        (orchestrator, endpoint)
    }

    #[tokio::test]
    async fn test_invalid_query_sends_nothing() {
        let (orchestrator, mut endpoint) = orchestrator();

        let err = orchestrator.submit("   ").await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidQuery(_)));
        assert!(endpoint.try_next_request().is_none());
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_args_carry_query_config_and_task_id() {
        let (orchestrator, mut endpoint) = orchestrator();

        let backend = tokio::spawn(async move {
            let request = endpoint.next_request().await.unwrap();
            let args = request.args.clone();
            request.resolve(json!({ "success": true, "response_type": "DIRECT", "message": "hi" }));
            args
        });

        let resolution = orchestrator.submit("  hello  ").await.unwrap();
        let args = backend.await.unwrap();

        assert_eq!(args["query"], "hello");
        assert_eq!(args["config"]["context_collection"], true);
        assert_eq!(args["config"]["timeout_ms"], 60_000);
        assert_eq!(args["config"]["verbose_mode"], false);
        assert_eq!(args["task_id"], resolution.outcome.task_id.as_str());
        assert_eq!(resolution.intent.label(), "direct");
    }

    #[tokio::test]
    async fn test_error_typed_response_still_completes() {
        let (orchestrator, mut endpoint) = orchestrator();

        tokio::spawn(async move {
            endpoint.next_request().await.unwrap().resolve(json!({
                "success": false,
                "response_type": "ERROR",
                "message": "could not plan"
            }));
        });

        let resolution = orchestrator.submit("plan my week").await.unwrap();
        assert_eq!(resolution.response().response_type, ResponseType::Error);
        assert_eq!(resolution.outcome.origin, OutcomeOrigin::Backend);
        assert_eq!(resolution.task.unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_progress_without_task_is_discarded() {
        let (orchestrator, _endpoint) = orchestrator();
        let notice = orchestrator.correlate_progress(&json!({ "current_step": 1 }));
        assert!(notice.is_none());
    }

    #[tokio::test]
    async fn test_progress_for_other_task_is_dropped() {
        let (orchestrator, mut endpoint) = orchestrator();

        let handle = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.submit("q").await })
        };
        let request = endpoint.next_request().await.unwrap();

        let foreign = orchestrator.correlate_progress(&json!({
            "type": "task_execution",
            "current_step": 1,
            "task_id": "task_someone_else"
        }));
        assert!(foreign.is_none());

        let own = orchestrator
            .correlate_progress(&json!({
                "type": "context_collection",
                "current_step": 1,
                "task_id": request.args["task_id"]
            }))
            .unwrap();
        assert_eq!(own.event.kind, ProgressKind::ContextCollection);

        request.resolve(json!({ "success": true, "response_type": "SIMPLE" }));
        let resolution = handle.await.unwrap().unwrap();
        assert_eq!(resolution.task.unwrap().progress_log.len(), 1);
    }

    #[tokio::test]
    async fn test_error_without_task_is_still_forwarded() {
        let (orchestrator, _endpoint) = orchestrator();
        let notice = orchestrator.correlate_error(&json!({
            "error_code": "SESSION_ERROR",
            "message": "session store unavailable"
        }));
        assert!(notice.task_id.is_none());
        assert!(notice.intent.is_error());
    }

    #[tokio::test]
    async fn test_first_error_sticks_to_task() {
        let (orchestrator, mut endpoint) = orchestrator();

        let handle = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.submit("q").await })
        };
        let request = endpoint.next_request().await.unwrap();

        let first =
            orchestrator.correlate_error(&json!({ "error_code": "LLM_ERROR", "message": "first" }));
        let second = orchestrator
            .correlate_error(&json!({ "error_code": "TIMEOUT_ERROR", "message": "second" }));
        assert!(first.attached);
        assert!(!second.attached);
        assert_eq!(second.task_id, first.task_id);
        request.resolve(json!({ "success": false, "response_type": "ERROR", "message": "failed" }));

        let resolution = handle.await.unwrap().unwrap();
        let RenderIntent::Error(intent) = resolution.intent else {
            panic!("expected error intent");
        };
        assert_eq!(intent.code, BrainErrorCode::LlmError);
        assert_eq!(resolution.task.unwrap().error.unwrap().message, "first");
    }

    #[tokio::test]
    async fn test_events_after_reply_do_not_touch_task() {
        let (orchestrator, mut endpoint) = orchestrator();

        let handle = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.submit("q").await })
        };
        let request = endpoint.next_request().await.unwrap();
        request.resolve(json!({ "success": false, "response_type": "ERROR", "message": "failed" }));

        // The submit task has not run since the reply
        assert!(orchestrator.is_busy());
        let late = orchestrator.correlate_progress(&json!({
            "type": "step_complete",
            "current_step": 9,
            "total_steps": 10
        }));
        assert!(late.is_none());
        let error = orchestrator.correlate_error(&json!({ "error_code": "LLM_ERROR", "message": "late" }));
        assert!(error.task_id.is_none());
        assert!(!error.attached);

        let resolution = handle.await.unwrap().unwrap();
        let task = resolution.task.unwrap();
        assert!(task.progress_log.is_empty());
        assert!(task.error.is_none());
        let RenderIntent::Error(intent) = resolution.intent else {
            panic!("expected error intent");
        };
        assert_eq!(intent.code, BrainErrorCode::UnknownError);
    }
}
