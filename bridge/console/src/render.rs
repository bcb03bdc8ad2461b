//! Text rendering for the console
//!
//! Every function here is pure: intents in, lines out.

use bridge_core::dispatch::error_intent;
use bridge_core::{
    Completion, ErrorIntent, ProgressIntent, RenderIntent, Resolution, ResponseMetadata,
    SessionStatus,
};

/// Width of the progress bar, in cells
const BAR_WIDTH: usize = 20;

/// Render any intent
pub fn intent(intent: &RenderIntent) -> String {
    match intent {
        RenderIntent::Simple { message, metadata } | RenderIntent::Direct { message, metadata } => {
            format!("{message}\n{}", metadata_line(metadata))
        }
        RenderIntent::Complex {
            message, metadata, ..
        } => format!("{}\n{message}\n{}", rule(), metadata_line(metadata)),
        RenderIntent::Error(error) => self::error(error),
        RenderIntent::Progress(progress) => self::progress(progress),
    }
}

/// A settled query: the answer, plus any error the backend reported for it
///
/// A backend Error answer already shows the reported code, so the report is
/// only appended when the answer does not.
pub fn resolution(resolution: &Resolution) -> String {
    let answer = intent(&resolution.intent);
    let Some(event) = &resolution.outcome.error else {
        return answer;
    };
    if let RenderIntent::Error(shown) = &resolution.intent {
        if shown.code == event.error_code {
            return answer;
        }
    }
    let reported = error_intent(Some(&resolution.outcome.task_id), event);
    format!("{answer}\n{}", intent(&reported))
}

/// One progress line, e.g. `[#####...............]  25% Executing task: fetching`
pub fn progress(intent: &ProgressIntent) -> String {
    let step = match intent.total_steps {
        Some(total) if total > 0 => format!("step {}/{total}", intent.current_step),
        _ => format!("step {}", intent.current_step),
    };

    match intent.completion {
        Completion::Percent(percent) => {
            let filled = usize::from(percent) * BAR_WIDTH / 100;
            format!(
                "[{}{}] {percent:>3}% {}: {} ({step})",
                "#".repeat(filled),
                ".".repeat(BAR_WIDTH - filled),
                intent.kind.label(),
                intent.message
            )
        }
        Completion::Indeterminate => format!(
            "[{}]  ... {}: {} ({step})",
            "~".repeat(BAR_WIDTH),
            intent.kind.label(),
            intent.message
        ),
    }
}

/// Failure block
pub fn error(intent: &ErrorIntent) -> String {
    let mut out = format!("error [{}]: {}", intent.code.as_str(), intent.message);
    if let Some(details) = &intent.details {
        out.push_str(&format!("\n  details: {details}"));
    }
    if intent.recoverable {
        out.push_str("\n  you can try again");
    }
    out
}

/// Execution summary under an answer
pub fn metadata_line(metadata: &ResponseMetadata) -> String {
    format!(
        "  ({} in {} ms, {} steps)",
        metadata.route_taken, metadata.execution_time_ms, metadata.steps_completed
    )
}

/// Session summary for `/status`
pub fn status(status: &SessionStatus) -> String {
    if status.is_placeholder() {
        return "session: unknown (backend not reporting)".to_string();
    }
    let mut out = format!(
        "session: {}\n  messages: {}\n  memory: {} bytes\n  active: {}",
        status.session_id,
        status.message_count,
        status.memory_size,
        if status.is_active { "yes" } else { "no" }
    );
    if let Some(task) = &status.current_task {
        out.push_str(&format!("\n  current task: {task}"));
    }
    out
}

fn rule() -> String {
    "-".repeat(BAR_WIDTH + 6)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{
        BrainErrorCode, ErrorClass, ErrorEvent, Outcome, OutcomeOrigin, ProgressKind,
        QueryResponse, ResponseType, TaskId,
    };
    use pretty_assertions::assert_eq;

    fn progress_intent(current: u64, total: Option<u64>) -> ProgressIntent {
        ProgressIntent {
            task_id: TaskId::new("task_1"),
            kind: ProgressKind::TaskExecution,
            message: "fetching".to_string(),
            current_step: current,
            total_steps: total,
            completion: Completion::of(current, total),
        }
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(
            progress(&progress_intent(1, Some(4))),
            "[#####...............]  25% Executing task: fetching (step 1/4)"
        );
    }

    #[test]
    fn test_progress_without_total() {
        let line = progress(&progress_intent(3, None));
        assert!(line.contains("..."));
        assert!(line.ends_with("(step 3)"));
    }

    #[test]
    fn test_error_block() {
        let text = error(&ErrorIntent {
            code: BrainErrorCode::TimeoutError,
            class: ErrorClass::Backend,
            message: "took too long".to_string(),
            details: Some("planner stalled".to_string()),
            recoverable: true,
            metadata: None,
            task_id: None,
        });
        assert_eq!(
            text,
            "error [TIMEOUT_ERROR]: took too long\n  details: planner stalled\n  you can try again"
        );
    }

    #[test]
    fn test_simple_answer() {
        let text = intent(&RenderIntent::Simple {
            message: "Sunny, 72°F".to_string(),
            metadata: ResponseMetadata {
                route_taken: "weather_tool".to_string(),
                execution_time_ms: 340,
                steps_completed: 1,
                session_id: "abc123".to_string(),
            },
        });
        assert_eq!(text, "Sunny, 72°F\n  (weather_tool in 340 ms, 1 steps)");
    }

    #[test]
    fn test_placeholder_status() {
        assert!(status(&SessionStatus::inactive()).contains("unknown"));
    }

    fn settled(response_type: ResponseType, error: Option<ErrorEvent>) -> Resolution {
        settled_from(OutcomeOrigin::Backend, response_type, error)
    }

    fn settled_from(
        origin: OutcomeOrigin,
        response_type: ResponseType,
        error: Option<ErrorEvent>,
    ) -> Resolution {
        let response = QueryResponse {
            success: response_type != ResponseType::Error,
            response_type,
            message: "Table booked".to_string(),
            metadata: ResponseMetadata::default(),
        };
        let outcome = Outcome {
            task_id: TaskId::new("task_1"),
            response,
            origin,
            error,
        };
        Resolution {
            intent: bridge_core::dispatch::render_outcome(&outcome),
            outcome,
            task: None,
        }
    }

    fn reported(message: &str) -> ErrorEvent {
        ErrorEvent {
            error_code: BrainErrorCode::TaskExecutionError,
            message: message.to_string(),
            details: None,
            recoverable: false,
            timestamp: 0,
            task_id: None,
        }
    }

    #[test]
    fn test_answer_keeps_error_reported_for_its_task() {
        let text = resolution(&settled(
            ResponseType::Direct,
            Some(reported("calendar tool crashed")),
        ));
        assert!(text.starts_with("Table booked\n"));
        assert!(text.ends_with("error [TASK_EXECUTION_ERROR]: calendar tool crashed"));
    }

    #[test]
    fn test_error_answer_shows_error_once() {
        let text = resolution(&settled(ResponseType::Error, Some(reported("no slots"))));
        assert_eq!(text.matches("error [").count(), 1);
        assert!(text.starts_with("error [TASK_EXECUTION_ERROR]: Table booked"));
    }

    #[test]
    fn test_clean_answer_has_no_error_block() {
        let text = resolution(&settled(ResponseType::Simple, None));
        assert!(!text.contains("error ["));
    }

    #[test]
    fn test_transport_failure_keeps_earlier_backend_error() {
        let text = resolution(&settled_from(
            OutcomeOrigin::Transport,
            ResponseType::Error,
            Some(reported("calendar tool crashed")),
        ));
        assert!(text.starts_with("error [COMMUNICATION_ERROR]"));
        assert!(text.contains("error [TASK_EXECUTION_ERROR]: calendar tool crashed"));
    }
}
