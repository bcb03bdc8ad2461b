//! Payload Normalization
//!
//! Total functions from untrusted JSON to the typed messages in
//! [`crate::messages`]. None of them fail: a missing or mistyped field takes
//! its documented fallback, an unknown enum value takes its safe variant, and
//! a payload that is not an object at all yields an all-defaults value.
//!
//! | Field kind            | Fallback                     |
//! |-----------------------|------------------------------|
//! | identifier / label    | `"unknown"`                  |
//! | human-readable text   | `"No message provided"`      |
//! | count, size, step     | `0`                          |
//! | flag                  | `false`                      |
//! | `response_type`       | `ERROR`                      |
//! | progress `type`       | `task_execution`             |
//! | `error_code`          | `UNKNOWN_ERROR`              |
//! | timestamp             | `0`                          |
//!
//! Every normalizer is idempotent: serializing its output and normalizing
//! again yields the same value.
//!
//! Fields are read by their snake_case name first and camelCase second.

use chrono::DateTime;
use serde_json::{Map, Value};

use crate::messages::{
    BrainErrorCode, ErrorEvent, ProgressEvent, ProgressKind, QueryResponse, ResponseMetadata,
    ResponseType, SessionStatus, NO_MESSAGE, UNKNOWN,
};
use crate::tasks::TaskId;

static NULL: Value = Value::Null;

/// An untrusted payload, classified once at the boundary
#[derive(Clone, Copy, Debug)]
pub enum RawPayload<'a> {
    /// A JSON object; individual fields may still be wrong
    Object(&'a Map<String, Value>),
    /// Anything else; every field reads as missing
    Malformed(&'a Value),
}

impl<'a> RawPayload<'a> {
    /// Classify a JSON value
    #[must_use]
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            other => Self::Malformed(other),
        }
    }

    fn field(&self, names: &[&str]) -> Option<&'a Value> {
        let Self::Object(map) = self else {
            return None;
        };
        names
            .iter()
            .find_map(|name| map.get(*name))
            .filter(|value| !value.is_null())
    }

    fn nested(&self, names: &[&str]) -> RawPayload<'a> {
        Self::classify(self.field(names).unwrap_or(&NULL))
    }

    fn string(&self, names: &[&str]) -> Option<String> {
        self.field(names)?.as_str().map(str::to_string)
    }

    fn text_or(&self, names: &[&str], fallback: &str) -> String {
        self.string(names).unwrap_or_else(|| fallback.to_string())
    }

    fn number(&self, names: &[&str]) -> Option<u64> {
        as_count(self.field(names)?)
    }

    fn count(&self, names: &[&str]) -> u64 {
        self.number(names).unwrap_or(0)
    }

    fn flag(&self, names: &[&str]) -> bool {
        self.field(names).and_then(Value::as_bool).unwrap_or(false)
    }

    fn timestamp(&self, names: &[&str]) -> u64 {
        self.field(names).map_or(0, as_timestamp)
    }

    fn task_id(&self) -> Option<TaskId> {
        self.string(&["task_id", "taskId"])
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(TaskId)
    }
}

/// Non-negative integer from a number or a numeric string
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                // Saturating float-to-int cast
                .map(|f| f.floor() as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Unix milliseconds from epoch-ms or an RFC 3339 string
fn as_timestamp(value: &Value) -> u64 {
    if let Some(ms) = as_count(value) {
        return ms;
    }
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .and_then(|dt| u64::try_from(dt.timestamp_millis()).ok())
        .unwrap_or(0)
}

fn note_malformed(raw: &RawPayload<'_>, shape: &'static str) {
    if let RawPayload::Malformed(value) = raw {
        tracing::warn!(shape, received = %value, "Payload is not an object, using defaults");
    }
}

/// Normalize execution metadata
#[must_use]
pub fn response_metadata(value: &Value) -> ResponseMetadata {
    metadata_from(RawPayload::classify(value))
}

fn metadata_from(raw: RawPayload<'_>) -> ResponseMetadata {
    ResponseMetadata {
        route_taken: raw.text_or(&["route_taken", "routeTaken"], UNKNOWN),
        execution_time_ms: raw.count(&["execution_time_ms", "executionTimeMs"]),
        steps_completed: raw.count(&["steps_completed", "stepsCompleted"]),
        session_id: raw.text_or(&["session_id", "sessionId"], UNKNOWN),
    }
}

/// Normalize a `processQuery` result
#[must_use]
pub fn query_response(value: &Value) -> QueryResponse {
    let raw = RawPayload::classify(value);
    note_malformed(&raw, "query_response");

    QueryResponse {
        success: raw.flag(&["success"]),
        response_type: raw
            .string(&["response_type", "responseType"])
            .and_then(|s| ResponseType::parse(&s))
            .unwrap_or(ResponseType::Error),
        message: raw.text_or(&["message"], NO_MESSAGE),
        metadata: metadata_from(raw.nested(&["metadata"])),
    }
}

/// Normalize a `progress_update` payload
#[must_use]
pub fn progress_event(value: &Value) -> ProgressEvent {
    let raw = RawPayload::classify(value);
    note_malformed(&raw, "progress_event");

    ProgressEvent {
        kind: raw
            .string(&["type", "kind"])
            .and_then(|s| ProgressKind::parse(&s))
            .unwrap_or(ProgressKind::TaskExecution),
        message: raw.text_or(&["message"], NO_MESSAGE),
        current_step: raw.count(&["current_step", "currentStep"]),
        total_steps: raw.number(&["total_steps", "totalSteps"]),
        timestamp: raw.timestamp(&["timestamp"]),
        task_id: raw.task_id(),
    }
}

/// Normalize a `brain_error` payload
#[must_use]
pub fn error_event(value: &Value) -> ErrorEvent {
    let raw = RawPayload::classify(value);
    note_malformed(&raw, "error_event");

    ErrorEvent {
        error_code: raw
            .string(&["error_code", "errorCode"])
            .and_then(|s| BrainErrorCode::parse(&s))
            .unwrap_or(BrainErrorCode::UnknownError),
        message: raw.text_or(&["message"], NO_MESSAGE),
        details: raw.string(&["details"]),
        recoverable: raw.flag(&["recoverable"]),
        timestamp: raw.timestamp(&["timestamp"]),
        task_id: raw.task_id(),
    }
}

/// Normalize a `getSessionStatus` result
#[must_use]
pub fn session_status(value: &Value) -> SessionStatus {
    let raw = RawPayload::classify(value);
    note_malformed(&raw, "session_status");

    SessionStatus {
        session_id: raw.text_or(&["session_id", "sessionId"], UNKNOWN),
        created_at: raw.timestamp(&["created_at", "createdAt"]),
        message_count: raw.count(&["message_count", "messageCount"]),
        current_task: raw.string(&["current_task", "currentTask"]),
        memory_size: raw.count(&["memory_size", "memorySize"]),
        is_active: raw.flag(&["is_active", "isActive"]),
    }
}
