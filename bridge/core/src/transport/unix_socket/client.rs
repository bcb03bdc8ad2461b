//! Unix Socket Client Transport
//!
//! Connects to a Brain backend and multiplexes calls and pushed events over
//! one stream.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::transport::frame::{encode, FrameDecoder, WireFrame};
use crate::transport::listeners::ListenerTable;
use crate::transport::traits::{
    BrainTransport, EventHandler, SettleHook, SubscriptionHandle, TransportError,
};

/// One call awaiting its reply frame
struct PendingCall {
    reply: oneshot::Sender<Result<Value, TransportError>>,
    on_settle: Option<SettleHook>,
}

impl PendingCall {
    /// Run the settle hook, then hand the result to the waiting invoke
    fn settle(self, result: Result<Value, TransportError>) {
        if let Some(hook) = self.on_settle {
            hook();
        }
        let _ = self.reply.send(result);
    }
}

type PendingMap = DashMap<u64, PendingCall>;

/// Outgoing frame queue depth
const WRITE_QUEUE: usize = 100;

/// Client-side Unix socket transport
pub struct UnixSocketTransport {
    socket_path: PathBuf,
    write_tx: mpsc::Sender<WireFrame>,
    pending: Arc<PendingMap>,
    listeners: Arc<ListenerTable>,
    next_request: AtomicU64,
    connected: Arc<AtomicBool>,
    tasks: parking_lot::Mutex<Vec<JoinHandle<()>>>,
}

/// Removes a pending entry if the awaiting invoke is dropped
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some((_, call)) = self.pending.remove(&self.id) {
            if let Some(hook) = call.on_settle {
                hook();
            }
        }
    }
}

fn fail_all_pending(pending: &PendingMap) {
    let ids: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for id in ids {
        if let Some((_, call)) = pending.remove(&id) {
            call.settle(Err(TransportError::ConnectionClosed));
        }
    }
}

impl UnixSocketTransport {
    /// Connect to the backend at `socket_path`
    ///
    /// # Errors
    ///
    /// `ConnectionFailed` if the socket cannot be reached within
    /// `connect_timeout`.
    pub async fn connect(
        socket_path: impl Into<PathBuf>,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let socket_path = socket_path.into();

        let stream = match tokio::time::timeout(connect_timeout, UnixStream::connect(&socket_path))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "Failed to connect to {}: {e}",
                    socket_path.display()
                )))
            }
            Err(_) => {
                return Err(TransportError::ConnectionFailed(format!(
                    "Timed out connecting to {} after {} ms",
                    socket_path.display(),
                    connect_timeout.as_millis()
                )))
            }
        };

        let (mut read_half, mut write_half) = stream.into_split();
        let (write_tx, mut write_rx) = mpsc::channel::<WireFrame>(WRITE_QUEUE);

        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let listeners = Arc::new(ListenerTable::new());
        let connected = Arc::new(AtomicBool::new(true));

        // Read task: stream -> replies and events
        let read_pending = Arc::clone(&pending);
        let read_listeners = Arc::clone(&listeners);
        let read_connected = Arc::clone(&connected);
        let reader = tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let mut buf = [0u8; 4096];

            'read: loop {
                match read_half.read(&mut buf).await {
                    Ok(0) => {
                        tracing::debug!("Connection closed by backend");
                        break;
                    }
                    Ok(n) => {
                        decoder.push(&buf[..n]);
                        loop {
                            match decoder.decode::<WireFrame>() {
                                Ok(Some(frame)) => {
                                    route_frame(frame, &read_pending, &read_listeners);
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    tracing::warn!(error = %e, "Frame decode error, dropping connection");
                                    break 'read;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Read error");
                        break;
                    }
                }
            }

            read_connected.store(false, Ordering::SeqCst);
            fail_all_pending(&read_pending);
            tracing::info!("Disconnected from Brain backend");
        });

        // Write task: queued frames -> stream
        let write_connected = Arc::clone(&connected);
        let write_pending = Arc::clone(&pending);
        let writer = tokio::spawn(async move {
            while let Some(frame) = write_rx.recv().await {
                match encode(&frame) {
                    Ok(data) => {
                        if let Err(e) = write_half.write_all(&data).await {
                            tracing::warn!(error = %e, "Write error");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Encode error");
                        if let WireFrame::Invoke { id, .. } = frame {
                            if let Some((_, call)) = write_pending.remove(&id) {
                                call.settle(Err(e));
                            }
                        }
                    }
                }
            }

            write_connected.store(false, Ordering::SeqCst);
            fail_all_pending(&write_pending);
        });

        tracing::info!(path = %socket_path.display(), "Connected to Brain backend");

        Ok(Self {
            socket_path,
            write_tx,
            pending,
            listeners,
            next_request: AtomicU64::new(1),
            connected,
            tasks: parking_lot::Mutex::new(vec![reader, writer]),
        })
    }

    /// Path this transport is connected to
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Number of calls awaiting a reply
    #[must_use]
    pub fn pending_calls(&self) -> usize {
        self.pending.len()
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
            return Err(TransportError::InvalidState("Not connected".to_string()));
        }

        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        self.pending.insert(id, PendingCall { reply, on_settle });
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        // The read task may have drained the map between the check above and the insert
        if !self.is_connected() {
            if let Some((_, call)) = self.pending.remove(&id) {
                call.settle(Err(TransportError::ConnectionClosed));
            }
            return Err(TransportError::ConnectionClosed);
        }

        self.write_tx
            .send(WireFrame::Invoke {
                id,
                operation: operation.to_string(),
                args,
            })
            .await
            .map_err(|_| TransportError::SendFailed("Writer closed".to_string()))?;

        rx.await.unwrap_or(Err(TransportError::ConnectionClosed))
    }
}

fn route_frame(frame: WireFrame, pending: &PendingMap, listeners: &ListenerTable) {
    match frame {
        WireFrame::Reply { id, result } => {
            if let Some((_, call)) = pending.remove(&id) {
                call.settle(Ok(result));
            } else {
                tracing::debug!(request_id = id, "Reply for a call nobody awaits");
            }
        }
        WireFrame::Failure { id, message } => {
            if let Some((_, call)) = pending.remove(&id) {
                call.settle(Err(TransportError::Rejected(message)));
            }
        }
        WireFrame::Event { name, payload } => {
            let delivered = listeners.dispatch(&name, &payload);
            tracing::trace!(event = %name, delivered, "Event delivered");
        }
        WireFrame::Invoke { id, operation, .. } => {
            tracing::warn!(request_id = id, operation = %operation, "Backend sent an invoke frame");
        }
    }
}

#[async_trait]
impl BrainTransport for UnixSocketTransport {
    fn name(&self) -> &'static str {
        "unix-socket"
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
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        fail_all_pending(&self.pending);
        self.listeners.clear();
        tracing::info!("Disconnected");
        Ok(())
    }
}

impl Drop for UnixSocketTransport {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
