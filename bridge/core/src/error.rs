//! Bridge Errors
//!
//! Caller-visible failures of the bridge API. Transport failures during a
//! query never surface here; the orchestrator turns them into an Error-typed
//! [`crate::messages::QueryResponse`] instead. What remains are the failures a
//! caller must react to: bad input and state conflicts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::EventKind;
use crate::tasks::TaskId;
use crate::transport::TransportError;

/// Broad failure category, used for rendering and for logging
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed caller input, rejected before any remote call
    Validation,
    /// The bridge could not reach the backend
    Transport,
    /// The backend reported an application-level failure
    Backend,
    /// The call conflicts with current bridge state; back off and retry
    State,
}

impl ErrorClass {
    /// Short label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Transport => "transport",
            Self::Backend => "backend",
            Self::State => "state",
        }
    }
}

/// Errors returned by [`crate::BrainClient`] and the components behind it
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The query was empty, too long, or contained forbidden characters
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A query is already pending
    #[error("A query is already in progress ({task_id})")]
    OrchestratorBusy {
        /// The pending task
        task_id: TaskId,
    },

    /// A reset was requested while a query is pending
    #[error("Cannot reset the session while a query is in progress ({task_id})")]
    SessionBusy {
        /// The pending task
        task_id: TaskId,
    },

    /// A session reset is running
    #[error("A session reset is in progress")]
    ResetInProgress,

    /// A listener set is full
    #[error("Too many {kind} listeners (limit {limit})")]
    TooManyListeners {
        /// Listener category
        kind: EventKind,
        /// Configured limit per category
        limit: usize,
    },

    /// A remote call outside of `submit` failed
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl BridgeError {
    /// Failure category
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidQuery(_) => ErrorClass::Validation,
            Self::OrchestratorBusy { .. }
            | Self::SessionBusy { .. }
            | Self::ResetInProgress
            | Self::TooManyListeners { .. } => ErrorClass::State,
            Self::Transport(_) => ErrorClass::Transport,
        }
    }

    /// Whether the caller may simply try again later
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OrchestratorBusy { .. }
                | Self::SessionBusy { .. }
                | Self::ResetInProgress
                | Self::Transport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            BridgeError::InvalidQuery("empty".into()).class(),
            ErrorClass::Validation
        );
        assert_eq!(
            BridgeError::OrchestratorBusy {
                task_id: TaskId::new("t")
            }
            .class(),
            ErrorClass::State
        );
        assert_eq!(BridgeError::ResetInProgress.class(), ErrorClass::State);
        assert_eq!(
            BridgeError::from(TransportError::ConnectionClosed).class(),
            ErrorClass::Transport
        );
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        assert!(!BridgeError::InvalidQuery("empty".into()).is_retryable());
        assert!(BridgeError::ResetInProgress.is_retryable());
    }

    #[test]
    fn test_busy_message_names_task() {
        let err = BridgeError::SessionBusy {
            task_id: TaskId::new("task_42"),
        };
        assert!(err.to_string().contains("task_42"));
    }
}
