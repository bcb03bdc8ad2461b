//! Transport Traits
//!
//! The two primitives the bridge needs from whatever host connects it to the
//! Brain: invoke a named operation and await its result, and register a
//! handler for a named event stream.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Callback registered for one event stream
///
/// Handlers run on the transport's delivery path and must not block.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Callback run once, on the delivery path, when an invoke settles
///
/// It runs before any event the transport delivers after the reply, and
/// also when the call fails or is dropped unanswered.
pub type SettleHook = Box<dyn FnOnce() + Send + Sync>;

/// Registration returned by [`BrainTransport::listen`]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    /// Transport-unique registration id
    pub id: u64,
    /// Event stream the handler is registered for
    pub event: String,
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.event, self.id)
    }
}

/// Errors that can occur during transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection to the backend failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection was closed before the call settled
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to hand the request to the backend
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The host rejected the call; the text is the host's own
    #[error("{0}")]
    Rejected(String),

    /// Message serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Frame checksum mismatch - data corruption detected
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Expected checksum value
        expected: u32,
        /// Actual checksum value received
        actual: u32,
    },

    /// Transport not in expected state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The adapter's invoke deadline elapsed
    #[error("{operation} did not settle within {after_ms} ms")]
    DeadlineExceeded {
        /// Operation that was invoked
        operation: String,
        /// Deadline that elapsed
        after_ms: u64,
    },

    /// IO error from the underlying stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Host-side primitives for reaching the Brain
///
/// Implementations do not retry. Every failure is returned to the caller as is.
#[async_trait]
pub trait BrainTransport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether calls can currently reach the backend
    fn is_connected(&self) -> bool;

    /// Invoke a remote operation and await its result
    async fn invoke(&self, operation: &str, args: Value) -> Result<Value, TransportError>;

    /// Invoke a remote operation, running `on_settle` the moment it settles
    ///
    /// The fallback runs the hook when the caller resumes, so events
    /// delivered in between are not ordered against it. Transports that push
    /// events on their own path override this.
    async fn invoke_settled(
        &self,
        operation: &str,
        args: Value,
        on_settle: SettleHook,
    ) -> Result<Value, TransportError> {
        let result = self.invoke(operation, args).await;
        on_settle();
        result
    }

    /// Register `handler` for every payload pushed on `event`
    async fn listen(
        &self,
        event: &str,
        handler: EventHandler,
    ) -> Result<SubscriptionHandle, TransportError>;

    /// Remove a registration; unknown handles are ignored
    async fn unlisten(&self, handle: &SubscriptionHandle) -> Result<(), TransportError>;

    /// Stop delivering events and fail outstanding calls
    async fn close(&self) -> Result<(), TransportError>;
}
