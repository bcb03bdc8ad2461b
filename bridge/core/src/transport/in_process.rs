//! In-Process Transport
//!
//! Channel-based transport for a Brain backend embedded in the same process.
//! The bridge side gets an [`InProcessTransport`]; the backend side gets a
//! [`BackendEndpoint`] that receives invoke requests and pushes events.
//!
//! # Usage
//!
//! ```ignore
//! let (transport, mut endpoint) = InProcessTransport::new_pair();
//!
//! tokio::spawn(async move {
//!     while let Some(request) = endpoint.next_request().await {
//!         endpoint.emit("progress_update", json!({ "type": "task_execution", ... }));
//!         request.resolve(json!({ "success": true, ... }));
//!     }
//! });
//! ```
//!
//! Events emitted through the endpoint are delivered synchronously, so an
//! event emitted before `resolve` is always observed before the reply.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::listeners::ListenerTable;
use super::traits::{
    BrainTransport, EventHandler, SettleHook, SubscriptionHandle, TransportError,
};

/// Default request channel capacity
const DEFAULT_CAPACITY: usize = 100;

/// One remote call waiting for the embedded backend
pub struct InvokeRequest {
    /// Operation name
    pub operation: String,
    /// Call arguments
    pub args: Value,
    reply: Option<oneshot::Sender<Result<Value, String>>>,
    on_settle: Option<SettleHook>,
}

impl InvokeRequest {
    /// Settle the call with a result
    ///
    /// Returns `false` if the caller stopped waiting.
    pub fn resolve(mut self, result: Value) -> bool {
        self.settle(Ok(result))
    }

    /// Fail the call at the transport level with `message`
    pub fn reject(mut self, message: impl Into<String>) -> bool {
        self.settle(Err(message.into()))
    }

    fn run_hook(&mut self) {
        if let Some(hook) = self.on_settle.take() {
            hook();
        }
    }

    fn settle(&mut self, result: Result<Value, String>) -> bool {
        // The hook runs here, on the backend side, so any emit after this
        // call is already ordered after the settle
        self.run_hook();
        self.reply
            .take()
            .is_some_and(|reply| reply.send(result).is_ok())
    }
}

impl Drop for InvokeRequest {
    fn drop(&mut self) {
        self.run_hook();
    }
}

impl std::fmt::Debug for InvokeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokeRequest")
            .field("operation", &self.operation)
            .field("args", &self.args)
            .field("settled", &self.reply.is_none())
            .finish_non_exhaustive()
    }
}

/// Bridge side of the in-process pair
pub struct InProcessTransport {
    request_tx: mpsc::Sender<InvokeRequest>,
    listeners: Arc<ListenerTable>,
    connected: Arc<AtomicBool>,
}

/// Backend side of the in-process pair
pub struct BackendEndpoint {
    request_rx: mpsc::Receiver<InvokeRequest>,
    listeners: Arc<ListenerTable>,
    connected: Arc<AtomicBool>,
}

impl InProcessTransport {
    /// Create a new in-process transport pair
    #[must_use]
    pub fn new_pair() -> (Self, BackendEndpoint) {
        Self::new_pair_with_capacity(DEFAULT_CAPACITY)
    }

    /// Create with custom request channel capacity
    #[must_use]
    pub fn new_pair_with_capacity(capacity: usize) -> (Self, BackendEndpoint) {
        let (request_tx, request_rx) = mpsc::channel(capacity.max(1));
        let listeners = Arc::new(ListenerTable::new());
        let connected = Arc::new(AtomicBool::new(true));

        let transport = Self {
            request_tx,
            listeners: Arc::clone(&listeners),
            connected: Arc::clone(&connected),
        };
        let endpoint = BackendEndpoint {
            request_rx,
            listeners,
            connected,
        };

        (transport, endpoint)
    }

    async fn call(
        &self,
        operation: &str,
        args: Value,
        on_settle: Option<SettleHook>,
    ) -> Result<Value, TransportError> {
        if !self.is_connected() {
            if let Some(hook) = on_settle {
                hook();
            }
            return Err(TransportError::InvalidState(
                "Transport not connected".to_string(),
            ));
        }

        let (reply, reply_rx) = oneshot::channel();
        let request = InvokeRequest {
            operation: operation.to_string(),
            args,
            reply: Some(reply),
            on_settle,
        };

        // A request the backend never takes runs its hook when dropped
        self.request_tx
            .send(request)
            .await
            .map_err(|_| TransportError::SendFailed("Backend endpoint dropped".to_string()))?;

        match reply_rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(TransportError::Rejected(message)),
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }
}

impl BackendEndpoint {
    /// Wait for the next invoke request; `None` once the bridge side is gone
    pub async fn next_request(&mut self) -> Option<InvokeRequest> {
        self.request_rx.recv().await
    }

    /// Take a request if one is already queued
    pub fn try_next_request(&mut self) -> Option<InvokeRequest> {
        self.request_rx.try_recv().ok()
    }

    /// Push an event to every bridge-side handler; returns how many ran
    pub fn emit(&self, event: &str, payload: Value) -> usize {
        if !self.connected.load(Ordering::SeqCst) {
            return 0;
        }
        self.listeners.dispatch(event, &payload)
    }

    /// Number of handlers registered for `event`
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.count(event)
    }

    /// Whether the bridge side still accepts calls and events
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrainTransport for InProcessTransport {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn invoke(&self, operation: &str, args: Value) -> Result<Value, TransportError> {
        self.call(operation, args, None).await
    }

    async fn invoke_settled(
        &self,
        operation: &str,
        args: Value,
        on_settle: SettleHook,
    ) -> Result<Value, TransportError> {
        self.call(operation, args, Some(on_settle)).await
    }

    async fn listen(
        &self,
        event: &str,
        handler: EventHandler,
    ) -> Result<SubscriptionHandle, TransportError> {
        Ok(self.listeners.add(event, handler))
    }

    async fn unlisten(&self, handle: &SubscriptionHandle) -> Result<(), TransportError> {
        self.listeners.remove(handle);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        self.listeners.clear();
        Ok(())
    }
}
