//! Brain Client
//!
//! Front-end facing entry point. Owns one orchestrator, one session holder
//! and one listener registry, all sharing a single transport adapter.
//!
//! # Lifecycle
//!
//! ```text
//! BrainClient::start(transport, &config)
//!   ├─ subscribe progress_update / brain_error / session_event
//!   └─ refresh session status
//!
//! front-end ── submit / reset / current / on_* / off ──► BrainClient
//! ```
//!
//! Transport handlers hold only weak references to the orchestrator, so
//! dropping the client stops event handling even if the transport outlives it.

use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::events::{ErrorNotice, EventHub, EventKind, ListenerId, ProgressNotice};
use crate::messages::{QueryConfig, SessionStatus, BRAIN_ERROR, PROGRESS_UPDATE, SESSION_EVENT};
use crate::orchestrator::{QueryOrchestrator, Resolution};
use crate::session::SessionHolder;
use crate::tasks::{Task, TaskSlot};
use crate::transport::{BrainTransport, EventHandler, TransportAdapter};

/// Handle used by front-ends to talk to the Brain
pub struct BrainClient {
    adapter: TransportAdapter,
    events: Arc<EventHub>,
    session: Arc<SessionHolder>,
    orchestrator: Arc<QueryOrchestrator>,
}

impl BrainClient {
    /// Build a client over `transport` without subscribing to anything
    ///
    /// Call [`BrainClient::attach`] before submitting, or use
    /// [`BrainClient::start`].
    #[must_use]
    pub fn new(transport: Arc<dyn BrainTransport>, config: &BridgeConfig) -> Self {
        let adapter =
            TransportAdapter::new(transport).with_invoke_deadline(config.transport.invoke_deadline());
        let slot = Arc::new(TaskSlot::new());
        let events = Arc::new(EventHub::new(config.max_listeners_per_event));
        let session = Arc::new(SessionHolder::new(
            adapter.clone(),
            Arc::clone(&slot),
            Arc::clone(&events),
        ));
        let orchestrator = Arc::new(QueryOrchestrator::new(
            adapter.clone(),
            config.query,
            slot,
            Arc::clone(&session),
            Arc::clone(&events),
        ));

        Self {
            adapter,
            events,
            session,
            orchestrator,
        }
    }

    /// Build, attach and load the initial session status
    ///
    /// # Errors
    ///
    /// `Transport` if a subscription cannot be made. A failed status load
    /// is not an error; the placeholder status is kept.
    pub async fn start(
        transport: Arc<dyn BrainTransport>,
        config: &BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let client = Self::new(transport, config);
        client.attach().await?;
        client.session.refresh().await;

        tracing::info!(
            transport = client.adapter.transport_name(),
            session_id = %client.session.current().session_id,
            "Brain client started"
        );
        Ok(client)
    }

    /// Connect to the socket-hosted backend in `config` and start
    ///
    /// # Errors
    ///
    /// `Transport` if the socket cannot be reached or subscribed to.
    #[cfg(unix)]
    pub async fn connect(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let transport = crate::transport::connect_transport(&config.transport).await?;
        Self::start(transport, config).await
    }

    /// Subscribe to the backend's pushed events
    ///
    /// Safe to call more than once; each event is subscribed a single time.
    ///
    /// # Errors
    ///
    /// `Transport` if the transport refuses a subscription.
    pub async fn attach(&self) -> Result<(), BridgeError> {
        let weak = Arc::downgrade(&self.orchestrator);

        self.adapter
            .subscribe(
                PROGRESS_UPDATE,
                forward(&weak, |orchestrator, payload| {
                    orchestrator.correlate_progress(&payload);
                }),
            )
            .await?;
        self.adapter
            .subscribe(
                BRAIN_ERROR,
                forward(&weak, |orchestrator, payload| {
                    orchestrator.correlate_error(&payload);
                }),
            )
            .await?;
        self.adapter
            .subscribe(
                SESSION_EVENT,
                forward(&weak, |orchestrator, payload| {
                    orchestrator.relay_session_event(&payload);
                }),
            )
            .await?;

        Ok(())
    }

    // ============================================
    // Queries
    // ============================================

    /// Submit a query with the configured options
    ///
    /// # Errors
    ///
    /// See [`QueryOrchestrator::submit_with`].
    pub async fn submit(&self, query: &str) -> Result<Resolution, BridgeError> {
        self.orchestrator.submit(query).await
    }

    /// Submit a query with explicit options
    ///
    /// # Errors
    ///
    /// See [`QueryOrchestrator::submit_with`].
    pub async fn submit_with(
        &self,
        query: &str,
        config: QueryConfig,
    ) -> Result<Resolution, BridgeError> {
        self.orchestrator.submit_with(query, config).await
    }

    /// Whether a query is pending
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.orchestrator.is_busy()
    }

    /// Snapshot of the pending task
    #[must_use]
    pub fn active_task(&self) -> Option<Task> {
        self.orchestrator.active_task()
    }

    /// Snapshot of the last settled task
    #[must_use]
    pub fn last_task(&self) -> Option<Task> {
        self.orchestrator.last_task()
    }

    // ============================================
    // Session
    // ============================================

    /// Last known session status
    #[must_use]
    pub fn current(&self) -> SessionStatus {
        self.session.current()
    }

    /// Fetch and store the session status
    pub async fn refresh(&self) -> SessionStatus {
        self.session.refresh().await
    }

    /// Reset the backend session
    ///
    /// # Errors
    ///
    /// See [`SessionHolder::reset`].
    pub async fn reset(&self) -> Result<SessionStatus, BridgeError> {
        self.session.reset().await
    }

    // ============================================
    // Listeners
    // ============================================

    /// The listener registry
    #[must_use]
    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    /// See [`EventHub::on_progress`]
    ///
    /// # Errors
    ///
    /// `TooManyListeners` when the set is full.
    pub fn on_progress<F>(&self, listener: F) -> Result<ListenerId, BridgeError>
    where
        F: Fn(&ProgressNotice) + Send + Sync + 'static,
    {
        self.events.on_progress(listener)
    }

    /// See [`EventHub::on_error`]
    ///
    /// # Errors
    ///
    /// `TooManyListeners` when the set is full.
    pub fn on_error<F>(&self, listener: F) -> Result<ListenerId, BridgeError>
    where
        F: Fn(&ErrorNotice) + Send + Sync + 'static,
    {
        self.events.on_error(listener)
    }

    /// See [`EventHub::on_session_event`]
    ///
    /// # Errors
    ///
    /// `TooManyListeners` when the set is full.
    pub fn on_session_event<F>(&self, listener: F) -> Result<ListenerId, BridgeError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.events.on_session_event(listener)
    }

    /// See [`EventHub::on_session_reset`]
    ///
    /// # Errors
    ///
    /// `TooManyListeners` when the set is full.
    pub fn on_session_reset<F>(&self, listener: F) -> Result<ListenerId, BridgeError>
    where
        F: Fn(&SessionStatus) + Send + Sync + 'static,
    {
        self.events.on_session_reset(listener)
    }

    /// Unregister a listener
    pub fn off(&self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    /// Number of listeners registered for `kind`
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.events.listener_count(kind)
    }

    // ============================================
    // Transport
    // ============================================

    /// Whether the transport is connected
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.adapter.is_connected()
    }

    /// Release subscriptions and close the transport
    ///
    /// # Errors
    ///
    /// `Transport` if the transport fails to close.
    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        tracing::info!(transport = self.adapter.transport_name(), "Shutting down");
        self.adapter.close().await?;
        Ok(())
    }
}

fn forward<F>(weak: &Weak<QueryOrchestrator>, f: F) -> EventHandler
where
    F: Fn(&QueryOrchestrator, Value) + Send + Sync + 'static,
{
    let weak = weak.clone();
    Arc::new(move |payload: Value| match weak.upgrade() {
        Some(orchestrator) => f(&orchestrator, payload),
        None => tracing::trace!("Event after client dropped"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InProcessTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_attach_is_idempotent() {
        let (transport, endpoint) = InProcessTransport::new_pair();
        let client = BrainClient::new(Arc::new(transport), &BridgeConfig::default());

        client.attach().await.unwrap();
        client.attach().await.unwrap();

        assert_eq!(endpoint.listener_count(PROGRESS_UPDATE), 1);
        assert_eq!(endpoint.listener_count(BRAIN_ERROR), 1);
        assert_eq!(endpoint.listener_count(SESSION_EVENT), 1);
    }

    #[tokio::test]
    async fn test_session_events_are_relayed_verbatim() {
        let (transport, endpoint) = InProcessTransport::new_pair();
        let client = BrainClient::new(Arc::new(transport), &BridgeConfig::default());
        client.attach().await.unwrap();

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let s = seen.clone();
        client
            .on_session_event(move |payload| s.lock().push(payload.clone()))
            .unwrap();

        endpoint.emit(SESSION_EVENT, json!({ "kind": "memory_compacted", "bytes": 42 }));
        assert_eq!(
            *seen.lock(),
            vec![json!({ "kind": "memory_compacted", "bytes": 42 })]
        );
    }

    #[tokio::test]
    async fn test_events_ignored_after_client_dropped() {
        let (transport, endpoint) = InProcessTransport::new_pair();
        let transport = Arc::new(transport);
        let client = BrainClient::new(transport.clone(), &BridgeConfig::default());
        client.attach().await.unwrap();
        drop(client);

        // Handlers are still registered but no longer reach anything
        assert_eq!(endpoint.emit(BRAIN_ERROR, json!({ "message": "late" })), 1);
    }

    #[tokio::test]
    async fn test_listener_limit_from_config() {
        let (transport, _endpoint) = InProcessTransport::new_pair();
        let mut config = BridgeConfig::default();
        config.max_listeners_per_event = 1;
        let client = BrainClient::new(Arc::new(transport), &config);

        client.on_error(|_| {}).unwrap();
        assert!(matches!(
            client.on_error(|_| {}),
            Err(BridgeError::TooManyListeners { limit: 1, .. })
        ));
    }
}
