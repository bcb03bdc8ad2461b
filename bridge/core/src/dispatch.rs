//! Outcome Dispatch
//!
//! Pure mapping from resolved outcomes and progress reports to
//! [`RenderIntent`]s: plain data describing what a front-end should show.
//! Nothing here performs I/O or touches shared state.
//!
//! ```text
//!   QueryResponse.response_type ──► Simple | Complex | Direct | Error
//!   ProgressEvent               ──► Progress (percent or indeterminate)
//!   ErrorEvent                  ──► Error
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ErrorClass;
use crate::messages::{
    BrainErrorCode, ErrorEvent, ProgressEvent, ProgressKind, QueryResponse, ResponseMetadata,
    ResponseType,
};
use crate::tasks::TaskId;

// ============================================
// Outcomes
// ============================================

/// Where a resolved response came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeOrigin {
    /// The backend answered (possibly with an Error-typed response)
    Backend,
    /// The remote call failed and the response was synthesized
    Transport,
}

/// A settled task, ready to render
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// The task that settled
    pub task_id: TaskId,
    /// Real or synthesized response
    pub response: QueryResponse,
    /// Where the response came from
    pub origin: OutcomeOrigin,
    /// First error event correlated to the task, if any
    pub error: Option<ErrorEvent>,
}

// ============================================
// Intents
// ============================================

/// How far along a progress display should be
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    /// Whole percent, 0..=100
    Percent(u8),
    /// Step count unknown
    Indeterminate,
}

impl Completion {
    /// Compute completion for `current` of `total` steps
    ///
    /// Rounds half up and clamps at 100. A missing or zero total is
    /// indeterminate.
    #[must_use]
    pub fn of(current: u64, total: Option<u64>) -> Self {
        match total {
            Some(total) if total > 0 => {
                let (current, total) = (u128::from(current), u128::from(total));
                let percent = (current * 200 + total) / (total * 2);
                Self::Percent(u8::try_from(percent.min(100)).unwrap_or(100))
            }
            _ => Self::Indeterminate,
        }
    }
}

/// Progress display update for a pending task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressIntent {
    /// Task the progress belongs to
    pub task_id: TaskId,
    /// Phase being reported
    pub kind: ProgressKind,
    /// Status line
    pub message: String,
    /// Step as reported
    pub current_step: u64,
    /// Planned steps as reported
    pub total_steps: Option<u64>,
    /// Bar position
    pub completion: Completion,
}

/// Failure display
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorIntent {
    /// Machine-readable code
    pub code: BrainErrorCode,
    /// Broad category
    pub class: ErrorClass,
    /// Human-readable message
    pub message: String,
    /// Extra diagnostic text
    pub details: Option<String>,
    /// Whether retrying may help
    pub recoverable: bool,
    /// Execution details, when the failure ended a query
    pub metadata: Option<ResponseMetadata>,
    /// Task the failure belongs to, when known
    pub task_id: Option<TaskId>,
}

/// What a front-end should display
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderIntent {
    /// Short answer
    Simple {
        /// Answer text
        message: String,
        /// Execution details
        metadata: ResponseMetadata,
    },
    /// Multi-step answer; any progress display for the task is finished
    Complex {
        /// Answer text
        message: String,
        /// Execution details
        metadata: ResponseMetadata,
        /// Task whose progress display should be closed
        finish_progress_for: TaskId,
    },
    /// Answer straight from the model
    Direct {
        /// Answer text
        message: String,
        /// Execution details
        metadata: ResponseMetadata,
    },
    /// Failure
    Error(ErrorIntent),
    /// Progress update
    Progress(ProgressIntent),
}

impl RenderIntent {
    /// Short variant label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Simple { .. } => "simple",
            Self::Complex { .. } => "complex",
            Self::Direct { .. } => "direct",
            Self::Error(_) => "error",
            Self::Progress(_) => "progress",
        }
    }

    /// Text to show
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Simple { message, .. }
            | Self::Complex { message, .. }
            | Self::Direct { message, .. } => message,
            Self::Error(intent) => &intent.message,
            Self::Progress(intent) => &intent.message,
        }
    }

    /// Whether this intent reports a failure
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

// ============================================
// Mapping
// ============================================

/// Map a settled task to its intent, using `response_type` as discriminant
#[must_use]
pub fn render_outcome(outcome: &Outcome) -> RenderIntent {
    let response = &outcome.response;
    let message = response.message.clone();
    let metadata = response.metadata.clone();

    match response.response_type {
        ResponseType::Simple => RenderIntent::Simple { message, metadata },
        ResponseType::Complex => RenderIntent::Complex {
            message,
            metadata,
            finish_progress_for: outcome.task_id.clone(),
        },
        ResponseType::Direct => RenderIntent::Direct { message, metadata },
        ResponseType::Error => RenderIntent::Error(failed_query(outcome)),
    }
}

fn failed_query(outcome: &Outcome) -> ErrorIntent {
    let response = &outcome.response;
    let (code, class, details, recoverable) = match (outcome.origin, &outcome.error) {
        (OutcomeOrigin::Transport, _) => (
            BrainErrorCode::CommunicationError,
            ErrorClass::Transport,
            None,
            true,
        ),
        (OutcomeOrigin::Backend, Some(event)) => (
            event.error_code,
            ErrorClass::Backend,
            event.details.clone(),
            event.recoverable,
        ),
        (OutcomeOrigin::Backend, None) => {
            (BrainErrorCode::UnknownError, ErrorClass::Backend, None, false)
        }
    };

    ErrorIntent {
        code,
        class,
        message: response.message.clone(),
        details,
        recoverable,
        metadata: Some(response.metadata.clone()),
        task_id: Some(outcome.task_id.clone()),
    }
}

/// Map a progress event for `task_id` to a progress intent
#[must_use]
pub fn progress_intent(task_id: &TaskId, event: &ProgressEvent) -> RenderIntent {
    RenderIntent::Progress(ProgressIntent {
        task_id: task_id.clone(),
        kind: event.kind,
        message: event.message.clone(),
        current_step: event.current_step,
        total_steps: event.total_steps,
        completion: Completion::of(event.current_step, event.total_steps),
    })
}

/// Map a pushed error event to an error intent
///
/// `task_id` is the task the event was correlated to, if any.
#[must_use]
pub fn error_intent(task_id: Option<&TaskId>, event: &ErrorEvent) -> RenderIntent {
    RenderIntent::Error(ErrorIntent {
        code: event.error_code,
        class: ErrorClass::Backend,
        message: event.message.clone(),
        details: event.details.clone(),
        recoverable: event.recoverable,
        metadata: None,
        task_id: task_id.cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcome(response_type: ResponseType, origin: OutcomeOrigin) -> Outcome {
        Outcome {
            task_id: TaskId::new("task_1"),
            response: QueryResponse {
                success: response_type != ResponseType::Error,
                response_type,
                message: "msg".to_string(),
                metadata: ResponseMetadata::default(),
            },
            origin,
            error: None,
        }
    }

    fn progress(current: u64, total: Option<u64>) -> ProgressEvent {
        ProgressEvent {
            kind: ProgressKind::TaskExecution,
            message: "working".to_string(),
            current_step: current,
            total_steps: total,
            timestamp: 0,
            task_id: None,
        }
    }

    #[test]
    fn test_each_response_type_has_its_own_intent() {
        let labels: Vec<_> = [
            ResponseType::Simple,
            ResponseType::Complex,
            ResponseType::Direct,
            ResponseType::Error,
        ]
        .into_iter()
        .map(|t| render_outcome(&outcome(t, OutcomeOrigin::Backend)).label())
        .collect();

        assert_eq!(labels, vec!["simple", "complex", "direct", "error"]);
    }

    #[test]
    fn test_complex_finishes_progress_for_task() {
        let intent = render_outcome(&outcome(ResponseType::Complex, OutcomeOrigin::Backend));
        assert!(matches!(
            intent,
            RenderIntent::Complex { ref finish_progress_for, .. } if finish_progress_for.as_str() == "task_1"
        ));
    }

    #[test]
    fn test_transport_failure_is_communication_error() {
        let mut failed = outcome(ResponseType::Error, OutcomeOrigin::Transport);
        failed.response = QueryResponse::communication_failure(&"network unreachable");

        let RenderIntent::Error(intent) = render_outcome(&failed) else {
            panic!("expected error intent");
        };
        assert_eq!(intent.code, BrainErrorCode::CommunicationError);
        assert_eq!(intent.class, ErrorClass::Transport);
        assert_eq!(intent.message, "Communication failed: network unreachable");
        assert!(intent.recoverable);
    }

    #[test]
    fn test_backend_error_uses_correlated_event() {
        let mut failed = outcome(ResponseType::Error, OutcomeOrigin::Backend);
        failed.error = Some(ErrorEvent {
            error_code: BrainErrorCode::LlmError,
            message: "model refused".to_string(),
            details: Some("quota".to_string()),
            recoverable: true,
            timestamp: 0,
            task_id: None,
        });

        let RenderIntent::Error(intent) = render_outcome(&failed) else {
            panic!("expected error intent");
        };
        assert_eq!(intent.code, BrainErrorCode::LlmError);
        assert_eq!(intent.details.as_deref(), Some("quota"));
        assert_eq!(intent.message, "msg");
    }

    #[test]
    fn test_backend_error_without_event() {
        let RenderIntent::Error(intent) =
            render_outcome(&outcome(ResponseType::Error, OutcomeOrigin::Backend))
        else {
            panic!("expected error intent");
        };
        assert_eq!(intent.code, BrainErrorCode::UnknownError);
        assert!(!intent.recoverable);
    }

    #[test]
    fn test_completion_rounding() {
        assert_eq!(Completion::of(1, Some(5)), Completion::Percent(20));
        assert_eq!(Completion::of(1, Some(3)), Completion::Percent(33));
        assert_eq!(Completion::of(2, Some(3)), Completion::Percent(67));
        assert_eq!(Completion::of(1, Some(8)), Completion::Percent(13));
        assert_eq!(Completion::of(0, Some(4)), Completion::Percent(0));
    }

    #[test]
    fn test_completion_edges() {
        assert_eq!(Completion::of(7, Some(5)), Completion::Percent(100));
        assert_eq!(Completion::of(3, None), Completion::Indeterminate);
        assert_eq!(Completion::of(3, Some(0)), Completion::Indeterminate);
        assert_eq!(
            Completion::of(u64::MAX, Some(u64::MAX)),
            Completion::Percent(100)
        );
    }

    #[test]
    fn test_progress_intent_carries_task() {
        let RenderIntent::Progress(intent) =
            progress_intent(&TaskId::new("task_7"), &progress(3, Some(5)))
        else {
            panic!("expected progress intent");
        };
        assert_eq!(intent.task_id, TaskId::new("task_7"));
        assert_eq!(intent.completion, Completion::Percent(60));
    }

    #[test]
    fn test_error_intent_from_event() {
        let event = ErrorEvent {
            error_code: BrainErrorCode::TimeoutError,
            message: "took too long".to_string(),
            details: None,
            recoverable: true,
            timestamp: 0,
            task_id: None,
        };
        let intent = error_intent(None, &event);
        assert!(intent.is_error());
        assert_eq!(intent.message(), "took too long");
    }
}
