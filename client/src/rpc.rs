//! JSON-RPC 2.0 request/response correlation over a [`Transport`].
//!
//! Requests carry sequential numeric ids. A router task owns the
//! transport's `messages` stream and resolves each response against a
//! pending-call map; when the stream completes, every outstanding call
//! fails with [`ClientError::TransportClosed`] instead of hanging.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::transport::{Transport, TransportStreams};

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, ClientError>>>;

/// Correlating JSON-RPC client. Owns the transport for its lifetime.
pub struct RpcClient<T: Transport> {
    transport: T,
    next_id: AtomicU64,
    pending: Arc<Mutex<PendingMap>>,
    router: Option<JoinHandle<()>>,
}

impl<T: Transport> RpcClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            router: None,
        }
    }

    /// Connect the transport and start routing responses. Returns the
    /// server-to-client notification stream for the caller to consume.
    pub async fn init(&mut self) -> Result<mpsc::Receiver<Value>, ClientError> {
        let TransportStreams {
            mut messages,
            notifications,
        } = self.transport.init().await?;

        let pending = Arc::clone(&self.pending);
        self.router = Some(tokio::spawn(async move {
            while let Some(frame) = messages.recv().await {
                route_response(&pending, frame).await;
            }
            fail_pending(&pending).await;
        }));

        Ok(notifications)
    }

    /// Send one request and wait for its response. `Value::Null` params
    /// are omitted from the frame.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let mut frame = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
        });
        if !params.is_null() {
            frame["params"] = params;
        }

        if let Err(e) = self.transport.send(frame) {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::TransportClosed),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Tear down the transport and fail any outstanding requests.
    pub async fn dispose(&mut self) {
        self.transport.dispose().await;
        if let Some(router) = self.router.take() {
            router.abort();
        }
        fail_pending(&self.pending).await;
    }
}

async fn route_response(pending: &Mutex<PendingMap>, mut frame: Value) {
    let Some(id) = frame.get("id").and_then(Value::as_u64) else {
        tracing::warn!("discarding response with a non-numeric id: {frame}");
        return;
    };
    let Some(tx) = pending.lock().await.remove(&id) else {
        tracing::warn!(id, "discarding response to an unknown request");
        return;
    };

    let outcome = match frame.get_mut("error") {
        Some(error) => Err(ClientError::Remote {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown server error")
                .to_string(),
        }),
        None => Ok(frame
            .get_mut("result")
            .map_or(Value::Null, Value::take)),
    };
    let _ = tx.send(outcome);
}

async fn fail_pending(pending: &Mutex<PendingMap>) {
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(ClientError::TransportClosed));
    }
}
