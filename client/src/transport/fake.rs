//! In-memory transport for exercising the RPC client and session without
//! a process or socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::transport::{FrameSinks, Transport, TransportStreams};

pub(crate) struct FakeTransport {
    sent_tx: mpsc::UnboundedSender<Value>,
    sinks: Arc<Mutex<Option<FrameSinks>>>,
    connected: Arc<AtomicBool>,
}

/// Test-side controls: observe what the client sent, inject server
/// frames, and simulate the server going away.
pub(crate) struct FakeHandle {
    pub sent: mpsc::UnboundedReceiver<Value>,
    sinks: Arc<Mutex<Option<FrameSinks>>>,
    connected: Arc<AtomicBool>,
}

impl FakeTransport {
    pub(crate) fn new() -> (Self, FakeHandle) {
        let (sent_tx, sent) = mpsc::unbounded_channel();
        let sinks = Arc::new(Mutex::new(None));
        let connected = Arc::new(AtomicBool::new(false));
        (
            Self {
                sent_tx,
                sinks: Arc::clone(&sinks),
                connected: Arc::clone(&connected),
            },
            FakeHandle {
                sent,
                sinks,
                connected,
            },
        )
    }
}

impl FakeHandle {
    /// Deliver a frame as if the server produced it.
    pub(crate) fn push(&self, frame: Value) {
        let guard = self.sinks.lock().unwrap();
        if let Some(sinks) = guard.as_ref() {
            sinks.try_route(frame);
        }
    }

    /// Close both output streams, as a crashed server would.
    pub(crate) fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.sinks.lock().unwrap().take();
    }
}

impl Transport for FakeTransport {
    async fn init(&mut self) -> Result<TransportStreams, ClientError> {
        let (sinks, streams) = FrameSinks::channel();
        *self.sinks.lock().unwrap() = Some(sinks);
        self.connected.store(true, Ordering::SeqCst);
        Ok(streams)
    }

    fn send(&self, frame: Value) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.sent_tx
            .send(frame)
            .map_err(|_| ClientError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn dispose(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        self.sinks.lock().unwrap().take();
    }
}
