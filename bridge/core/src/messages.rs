//! Brain Wire Messages
//!
//! Typed shapes of everything that crosses the boundary to the Brain backend:
//! the reply to `processQuery`, the pushed `progress_update` / `brain_error`
//! events and the `getSessionStatus` snapshot.
//!
//! # Design Philosophy
//!
//! These types are the *validated* side of the boundary. Nothing in this
//! module parses untrusted input; raw payloads go through
//! [`crate::validation::payload`] first, which always yields one of these
//! fully-populated values. Serialization uses the backend's snake_case field
//! names so a validated value can be re-validated without change.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tasks::TaskId;

// ============================================
// Boundary names
// ============================================

/// Remote operation that runs a query
pub const PROCESS_QUERY: &str = "processQuery";
/// Remote operation that discards the current backend session
pub const RESET_SESSION: &str = "resetSession";
/// Remote operation that reports the current backend session
pub const GET_SESSION_STATUS: &str = "getSessionStatus";

/// Inbound stream of [`ProgressEvent`]s
pub const PROGRESS_UPDATE: &str = "progress_update";
/// Inbound stream of [`ErrorEvent`]s
pub const BRAIN_ERROR: &str = "brain_error";
/// Inbound stream of opaque session payloads
pub const SESSION_EVENT: &str = "session_event";
/// Local notification emitted after a successful reset
pub const SESSION_RESET: &str = "session_reset";

/// Placeholder for missing identifiers and labels
pub const UNKNOWN: &str = "unknown";
/// Placeholder for missing human-readable messages
pub const NO_MESSAGE: &str = "No message provided";

/// Current time as Unix milliseconds
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ============================================
// Query response
// ============================================

/// Rendering category chosen by the backend for a response
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseType {
    /// Short answer from a single tool or lookup
    Simple,
    /// Multi-step answer that was accompanied by progress events
    Complex,
    /// Answer produced directly by the model without routing
    Direct,
    /// Application-level failure
    Error,
}

impl ResponseType {
    /// Parse a wire value, ignoring case and surrounding whitespace
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(Self::Simple),
            "complex" => Some(Self::Complex),
            "direct" => Some(Self::Direct),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Wire label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "SIMPLE",
            Self::Complex => "COMPLEX",
            Self::Direct => "DIRECT",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution details attached to every response
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Backend route that handled the query (tool name, model, ...)
    pub route_taken: String,
    /// Wall-clock time spent in the backend
    pub execution_time_ms: u64,
    /// Number of plan steps the backend finished
    pub steps_completed: u64,
    /// Backend session that answered
    pub session_id: String,
}

impl Default for ResponseMetadata {
    fn default() -> Self {
        Self {
            route_taken: UNKNOWN.to_string(),
            execution_time_ms: 0,
            steps_completed: 0,
            session_id: UNKNOWN.to_string(),
        }
    }
}

/// The settled result of one query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Whether the backend considers the query answered
    pub success: bool,
    /// Rendering category
    pub response_type: ResponseType,
    /// Text to show the user
    pub message: String,
    /// Execution details
    pub metadata: ResponseMetadata,
}

impl QueryResponse {
    /// Build the response used when the remote call itself failed
    ///
    /// The transport error text is embedded verbatim after the
    /// `Communication failed: ` prefix.
    #[must_use]
    pub fn communication_failure(error: &impl fmt::Display) -> Self {
        Self {
            success: false,
            response_type: ResponseType::Error,
            message: format!("Communication failed: {error}"),
            metadata: ResponseMetadata::default(),
        }
    }

    /// Whether this response should be rendered as a failure
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.response_type == ResponseType::Error
    }
}

// ============================================
// Progress events
// ============================================

/// Phase of backend work reported by a progress event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    /// Gathering context before planning
    ContextCollection,
    /// Executing the plan
    TaskExecution,
    /// A single plan step finished
    StepComplete,
}

impl ProgressKind {
    /// Parse a wire value; accepts `snake_case`, `SCREAMING_CASE` and `camelCase`
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "contextcollection" => Some(Self::ContextCollection),
            "taskexecution" => Some(Self::TaskExecution),
            "stepcomplete" => Some(Self::StepComplete),
            _ => None,
        }
    }

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ContextCollection => "Collecting context",
            Self::TaskExecution => "Executing task",
            Self::StepComplete => "Step complete",
        }
    }
}

/// Out-of-band progress report for the in-flight query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Phase being reported
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    /// Status line
    pub message: String,
    /// Step the backend is on; not guaranteed monotonic across events
    pub current_step: u64,
    /// Planned step count, when the backend knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u64>,
    /// Backend timestamp (Unix ms, 0 when unknown)
    pub timestamp: u64,
    /// Task the backend attributes this event to, if it says
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

// ============================================
// Error events
// ============================================

/// Machine-readable failure code
///
/// Any code the backend sends that is not listed here is coerced to
/// [`BrainErrorCode::UnknownError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrainErrorCode {
    /// Context collection failed
    ContextCollectionError,
    /// A plan step failed
    TaskExecutionError,
    /// The language model failed or refused
    LlmError,
    /// The backend gave up waiting
    TimeoutError,
    /// Session bookkeeping failed
    SessionError,
    /// The bridge could not reach the backend
    CommunicationError,
    /// The backend rejected the query as malformed
    ValidationError,
    /// Anything else
    UnknownError,
}

impl BrainErrorCode {
    /// Parse a wire value; unrecognized codes yield `None`
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONTEXT_COLLECTION_ERROR" => Some(Self::ContextCollectionError),
            "TASK_EXECUTION_ERROR" => Some(Self::TaskExecutionError),
            "LLM_ERROR" => Some(Self::LlmError),
            "TIMEOUT_ERROR" => Some(Self::TimeoutError),
            "SESSION_ERROR" => Some(Self::SessionError),
            "COMMUNICATION_ERROR" => Some(Self::CommunicationError),
            "VALIDATION_ERROR" => Some(Self::ValidationError),
            "UNKNOWN_ERROR" => Some(Self::UnknownError),
            _ => None,
        }
    }

    /// Wire label
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContextCollectionError => "CONTEXT_COLLECTION_ERROR",
            Self::TaskExecutionError => "TASK_EXECUTION_ERROR",
            Self::LlmError => "LLM_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
            Self::SessionError => "SESSION_ERROR",
            Self::CommunicationError => "COMMUNICATION_ERROR",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for BrainErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-level failure pushed by the backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    /// Failure code
    pub error_code: BrainErrorCode,
    /// Human-readable description
    pub message: String,
    /// Extra diagnostic text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Whether the user can simply try again
    pub recoverable: bool,
    /// Backend timestamp (Unix ms, 0 when unknown)
    pub timestamp: u64,
    /// Task the backend attributes this error to, if it says
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
}

// ============================================
// Session status
// ============================================

/// Backend session snapshot
///
/// Replaced wholesale on every refresh; never merged field by field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Session identifier; stable until a reset
    pub session_id: String,
    /// When the backend created the session (Unix ms, 0 when unknown)
    pub created_at: u64,
    /// Messages exchanged in this session
    pub message_count: u64,
    /// Task the backend is currently working on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<String>,
    /// Backend memory footprint in bytes
    pub memory_size: u64,
    /// Whether the backend has work in progress
    pub is_active: bool,
}

impl SessionStatus {
    /// Placeholder used before the first refresh and when a refresh fails
    #[must_use]
    pub fn inactive() -> Self {
        Self {
            session_id: UNKNOWN.to_string(),
            created_at: 0,
            message_count: 0,
            current_task: None,
            memory_size: 0,
            is_active: false,
        }
    }

    /// Whether this is the placeholder rather than a backend report
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.session_id == UNKNOWN
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::inactive()
    }
}

// ============================================
// Query configuration
// ============================================

/// Per-call options forwarded with `processQuery`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Let the backend gather context before planning
    pub context_collection: bool,
    /// Advisory time budget; enforcement belongs to the backend
    pub timeout_ms: u64,
    /// Ask the backend for more detailed progress
    pub verbose_mode: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            context_collection: true,
            timeout_ms: 60_000,
            verbose_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_type_parse_ignores_case() {
        assert_eq!(ResponseType::parse("SIMPLE"), Some(ResponseType::Simple));
        assert_eq!(ResponseType::parse(" complex "), Some(ResponseType::Complex));
        assert_eq!(ResponseType::parse("Error"), Some(ResponseType::Error));
        assert_eq!(ResponseType::parse("weather"), None);
    }

    #[test]
    fn test_progress_kind_parse_spellings() {
        assert_eq!(
            ProgressKind::parse("context_collection"),
            Some(ProgressKind::ContextCollection)
        );
        assert_eq!(
            ProgressKind::parse("TASK_EXECUTION"),
            Some(ProgressKind::TaskExecution)
        );
        assert_eq!(
            ProgressKind::parse("stepComplete"),
            Some(ProgressKind::StepComplete)
        );
        assert_eq!(ProgressKind::parse("thinking"), None);
    }

    #[test]
    fn test_error_code_roundtrip_labels() {
        for code in [
            BrainErrorCode::ContextCollectionError,
            BrainErrorCode::TaskExecutionError,
            BrainErrorCode::LlmError,
            BrainErrorCode::TimeoutError,
            BrainErrorCode::SessionError,
            BrainErrorCode::CommunicationError,
            BrainErrorCode::ValidationError,
            BrainErrorCode::UnknownError,
        ] {
            assert_eq!(BrainErrorCode::parse(code.as_str()), Some(code));
        }
        assert_eq!(BrainErrorCode::parse("DISK_ON_FIRE"), None);
    }

    #[test]
    fn test_communication_failure_shape() {
        let response = QueryResponse::communication_failure(&"network unreachable");
        assert!(!response.success);
        assert_eq!(response.response_type, ResponseType::Error);
        assert_eq!(response.message, "Communication failed: network unreachable");
        assert_eq!(response.metadata.session_id, "unknown");
        assert_eq!(response.metadata.execution_time_ms, 0);
        assert_eq!(response.metadata.steps_completed, 0);
    }

    #[test]
    fn test_query_response_serializes_snake_case() {
        let response = QueryResponse {
            success: true,
            response_type: ResponseType::Simple,
            message: "hi".to_string(),
            metadata: ResponseMetadata::default(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["response_type"], "SIMPLE");
        assert_eq!(value["metadata"]["route_taken"], "unknown");
    }

    #[test]
    fn test_inactive_session_is_placeholder() {
        let status = SessionStatus::default();
        assert!(status.is_placeholder());
        assert!(!status.is_active);
    }
}
