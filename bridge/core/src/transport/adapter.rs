//! Transport Adapter
//!
//! The bridge's only view of the transport. It adds two things on top of a
//! [`BrainTransport`]:
//!
//! - one subscription per event name for the adapter's lifetime; subscribing
//!   again returns the existing handle instead of stacking a second handler
//! - an optional hard deadline on invokes
//!
//! There is no retry or backoff here. Failures reach the caller unchanged.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use super::traits::{
    BrainTransport, EventHandler, SettleHook, SubscriptionHandle, TransportError,
};

/// Adapter around the host transport
#[derive(Clone)]
pub struct TransportAdapter {
    inner: Arc<dyn BrainTransport>,
    subscriptions: Arc<Mutex<HashMap<String, SubscriptionHandle>>>,
    invoke_deadline: Option<Duration>,
}

impl TransportAdapter {
    /// Wrap a transport with no invoke deadline
    #[must_use]
    pub fn new(inner: Arc<dyn BrainTransport>) -> Self {
        Self {
            inner,
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            invoke_deadline: None,
        }
    }

    /// Fail invokes that do not settle within `deadline`
    #[must_use]
    pub fn with_invoke_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.invoke_deadline = deadline;
        self
    }

    /// Name of the wrapped transport
    #[must_use]
    pub fn transport_name(&self) -> &'static str {
        self.inner.name()
    }

    /// Whether the wrapped transport is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Invoke a remote operation
    ///
    /// # Errors
    ///
    /// Whatever the transport returns, or `DeadlineExceeded` when a deadline
    /// is configured and elapses first.
    pub async fn invoke(&self, operation: &str, args: Value) -> Result<Value, TransportError> {
        tracing::trace!(operation = %operation, transport = self.inner.name(), "Invoking");
        self.within_deadline(operation, self.inner.invoke(operation, args))
            .await
    }

    /// Invoke a remote operation, running `on_settle` on the transport's
    /// delivery path as soon as the call settles
    ///
    /// Events the transport delivers after the reply are ordered after the
    /// hook. When the deadline elapses first the caller settles on its own
    /// and the hook may still run later, when the transport lets go of the
    /// call.
    ///
    /// # Errors
    ///
    /// As [`TransportAdapter::invoke`].
    pub async fn invoke_settled(
        &self,
        operation: &str,
        args: Value,
        on_settle: SettleHook,
    ) -> Result<Value, TransportError> {
        tracing::trace!(operation = %operation, transport = self.inner.name(), "Invoking");
        self.within_deadline(
            operation,
            self.inner.invoke_settled(operation, args, on_settle),
        )
        .await
    }

    async fn within_deadline(
        &self,
        operation: &str,
        call: impl Future<Output = Result<Value, TransportError>>,
    ) -> Result<Value, TransportError> {
        match self.invoke_deadline {
            Some(deadline) => tokio::time::timeout(deadline, call).await.map_err(|_| {
                TransportError::DeadlineExceeded {
                    operation: operation.to_string(),
                    after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                }
            })?,
            None => call.await,
        }
    }

    /// Subscribe `handler` to `event`, once
    ///
    /// A second call for the same event name returns the first handle and
    /// drops `handler`.
    ///
    /// # Errors
    ///
    /// Whatever the transport returns from `listen`.
    pub async fn subscribe(
        &self,
        event: &str,
        handler: EventHandler,
    ) -> Result<SubscriptionHandle, TransportError> {
        let mut subscriptions = self.subscriptions.lock().await;
        if let Some(existing) = subscriptions.get(event) {
            tracing::debug!(event = %event, "Already subscribed");
            return Ok(existing.clone());
        }

        let handle = self.inner.listen(event, handler).await?;
        tracing::debug!(event = %event, handle = %handle, "Subscribed");
        subscriptions.insert(event.to_string(), handle.clone());
        Ok(handle)
    }

    /// Whether `event` has an adapter subscription
    pub async fn is_subscribed(&self, event: &str) -> bool {
        self.subscriptions.lock().await.contains_key(event)
    }

    /// Drop every adapter subscription
    ///
    /// # Errors
    ///
    /// The first `unlisten` failure; remaining handles are still released.
    pub async fn unsubscribe_all(&self) -> Result<(), TransportError> {
        let handles: Vec<SubscriptionHandle> = self
            .subscriptions
            .lock()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();

        let mut first_error = None;
        for handle in handles {
            if let Err(e) = self.inner.unlisten(&handle).await {
                tracing::warn!(handle = %handle, error = %e, "Failed to unsubscribe");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Release subscriptions and close the transport
    ///
    /// # Errors
    ///
    /// The transport's `close` failure.
    pub async fn close(&self) -> Result<(), TransportError> {
        if let Err(e) = self.unsubscribe_all().await {
            // Each failed handle was logged; closing clears them anyway
            tracing::debug!(error = %e, "Closing with subscriptions still registered");
        }
        self.inner.close().await
    }
}
