//! Session State Holder
//!
//! Keeps the last known [`SessionStatus`] for the backend session. The value
//! is replaced wholesale on every successful refresh and never merged.
//!
//! # Generations
//!
//! Every reset starts a new generation. A refresh records the generation it
//! started in and only stores its result if no reset happened meanwhile, so a
//! slow post-query refresh cannot bring back the pre-reset session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::json;

use crate::error::BridgeError;
use crate::events::EventHub;
use crate::messages::{SessionStatus, GET_SESSION_STATUS, RESET_SESSION};
use crate::tasks::TaskSlot;
use crate::transport::{TransportAdapter, TransportError};
use crate::validation::payload;

/// Process-wide holder of the backend session status
pub struct SessionHolder {
    transport: TransportAdapter,
    slot: Arc<TaskSlot>,
    events: Arc<EventHub>,
    status: RwLock<SessionStatus>,
    generation: AtomicU64,
}

impl SessionHolder {
    /// Create a holder with the inactive placeholder as current status
    #[must_use]
    pub fn new(transport: TransportAdapter, slot: Arc<TaskSlot>, events: Arc<EventHub>) -> Self {
        Self {
            transport,
            slot,
            events,
            status: RwLock::new(SessionStatus::inactive()),
            generation: AtomicU64::new(0),
        }
    }

    /// Last known status
    #[must_use]
    pub fn current(&self) -> SessionStatus {
        self.status.read().clone()
    }

    /// Number of resets performed
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Fetch the backend's status and store it
    ///
    /// On transport failure the stored status is left untouched and the
    /// inactive placeholder is returned.
    pub async fn refresh(&self) -> SessionStatus {
        let generation = self.generation();
        match self.fetch().await {
            Ok(status) => {
                if self.store(generation, &status) {
                    status
                } else {
                    self.current()
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session status refresh failed");
                SessionStatus::inactive()
            }
        }
    }

    /// Refresh in the background; used after every settled query
    pub fn refresh_detached(self: &Arc<Self>) {
        let holder = Arc::clone(self);
        tokio::spawn(async move {
            holder.refresh().await;
        });
    }

    /// Discard the backend session and load the new one
    ///
    /// Emits `session_reset` with the new status once the reset is complete.
    ///
    /// # Errors
    ///
    /// `SessionBusy` while a query is pending, `ResetInProgress` while
    /// another reset runs, `Transport` if the backend reset call fails.
    pub async fn reset(&self) -> Result<SessionStatus, BridgeError> {
        let permit = self.slot.begin_reset()?;
        let previous = self.current().session_id;
        tracing::info!(session_id = %previous, "Resetting session");

        if let Err(e) = self.transport.invoke(RESET_SESSION, json!({})).await {
            tracing::error!(session_id = %previous, error = %e, "Session reset failed");
            return Err(e.into());
        }

        let generation = {
            let mut status = self.status.write();
            *status = SessionStatus::inactive();
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let status = match self.fetch().await {
            Ok(status) => {
                self.store(generation, &status);
                status
            }
            Err(e) => {
                tracing::warn!(error = %e, "Status refresh after reset failed");
                SessionStatus::inactive()
            }
        };

        // Listeners may submit right away
        drop(permit);

        tracing::info!(
            previous = %previous,
            session_id = %status.session_id,
            generation,
            "Session reset"
        );
        self.events.emit_session_reset(&status);
        Ok(status)
    }

    async fn fetch(&self) -> Result<SessionStatus, TransportError> {
        let value = self.transport.invoke(GET_SESSION_STATUS, json!({})).await?;
        Ok(payload::session_status(&value))
    }

    fn store(&self, generation: u64, status: &SessionStatus) -> bool {
        let mut current = self.status.write();
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(
                session_id = %status.session_id,
                "Discarding status fetched before a reset"
            );
            return false;
        }
        *current = status.clone();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::transport::{BackendEndpoint, InProcessTransport};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn holder() -> (Arc<SessionHolder>, BackendEndpoint, Arc<TaskSlot>, Arc<EventHub>) {
        let (transport, endpoint) = InProcessTransport::new_pair();
        let slot = Arc::new(TaskSlot::new());
        let events = Arc::new(EventHub::default());
        let holder = Arc::new(SessionHolder::new(
            TransportAdapter::new(Arc::new(transport)),
            Arc::clone(&slot),
            Arc::clone(&events),
        ));
        (holder, endpoint, slot, events)
    }

    fn status(session_id: &str, messages: u64) -> Value {
        json!({
            "session_id": session_id,
            "created_at": 1_700_000_000_000_u64,
            "message_count": messages,
            "memory_size": 1024,
            "is_active": false
        })
    }

    #[test]
    fn test_current_defaults_to_placeholder() {
        let (holder, _endpoint, _slot, _events) = holder();
        assert!(holder.current().is_placeholder());
    }

    #[tokio::test]
    async fn test_refresh_replaces_status() {
        let (holder, mut endpoint, _slot, _events) = holder();

        tokio::spawn(async move {
            let request = endpoint.next_request().await.unwrap();
            assert_eq!(request.operation, GET_SESSION_STATUS);
            request.resolve(status("abc123", 3));
        });

        let refreshed = holder.refresh().await;
        assert_eq!(refreshed.session_id, "abc123");
        assert_eq!(holder.current(), refreshed);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous() {
        let (holder, mut endpoint, _slot, _events) = holder();

        tokio::spawn(async move {
            endpoint
                .next_request()
                .await
                .unwrap()
                .resolve(status("abc123", 1));
            endpoint.next_request().await.unwrap().reject("timeout");
        });

        holder.refresh().await;
        let fallback = holder.refresh().await;

        assert!(fallback.is_placeholder());
        assert_eq!(holder.current().session_id, "abc123");
    }

    #[tokio::test]
    async fn test_reset_refreshes_and_notifies() {
        let (holder, mut endpoint, _slot, events) = holder();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = seen.clone();
        events
            .on_session_reset(move |status| s.lock().push(status.session_id.clone()))
            .unwrap();

        tokio::spawn(async move {
            let reset = endpoint.next_request().await.unwrap();
            assert_eq!(reset.operation, RESET_SESSION);
            reset.resolve(Value::Null);
            endpoint
                .next_request()
                .await
                .unwrap()
                .resolve(status("fresh", 0));
        });

        let after = holder.reset().await.unwrap();
        assert_eq!(after.session_id, "fresh");
        assert_eq!(holder.current().session_id, "fresh");
        assert_eq!(holder.generation(), 1);
        assert_eq!(*seen.lock(), vec!["fresh".to_string()]);
        assert_eq!(events.listener_count(EventKind::Reset), 1);
    }

    #[tokio::test]
    async fn test_reset_rejected_while_query_pending() {
        let (holder, _endpoint, slot, _events) = holder();
        let _lease = slot.begin("long query".to_string()).unwrap();

        let err = holder.reset().await.unwrap_err();
        assert!(matches!(err, BridgeError::SessionBusy { .. }));
    }

    #[tokio::test]
    async fn test_failed_reset_frees_slot() {
        let (holder, mut endpoint, slot, _events) = holder();

        tokio::spawn(async move {
            endpoint.next_request().await.unwrap().reject("backend gone");
        });

        let err = holder.reset().await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
        assert!(slot.begin("next".to_string()).is_ok());
    }

    #[tokio::test]
    async fn test_stale_refresh_discarded_after_reset() {
        let (holder, mut endpoint, _slot, _events) = holder();

        // A refresh starts, then a reset completes before it is answered
        let slow = {
            let holder = Arc::clone(&holder);
            tokio::spawn(async move { holder.refresh().await })
        };
        let stale = endpoint.next_request().await.unwrap();

        let resetting = {
            let holder = Arc::clone(&holder);
            tokio::spawn(async move { holder.reset().await })
        };
        endpoint.next_request().await.unwrap().resolve(Value::Null);
        endpoint
            .next_request()
            .await
            .unwrap()
            .resolve(status("fresh", 0));
        resetting.await.unwrap().unwrap();

        stale.resolve(status("old", 9));
        let returned = slow.await.unwrap();

        assert_eq!(returned.session_id, "fresh");
        assert_eq!(holder.current().session_id, "fresh");
    }
}
