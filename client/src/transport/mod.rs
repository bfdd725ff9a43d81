//! Byte channels to the mutation server, demultiplexed into messages and
//! notifications.
//!
//! Both implementations share one framing definition ([`crate::codec`]) and
//! one routing rule: a decoded frame with an `id` field goes to `messages`
//! (for the RPC client to correlate), a frame without one goes to
//! `notifications` (for the session to filter). Disposal completes both
//! streams by dropping their senders.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ClientError;

mod socket;
mod stdio;

#[cfg(test)]
pub(crate) mod fake;

pub use socket::SocketTransport;
pub use stdio::StdioTransport;

pub(crate) const STREAM_CHANNEL_CAPACITY: usize = 256;

/// The two read-only output streams a transport produces.
///
/// Id routing invariant: a frame with an `id` is never delivered to
/// `notifications`, and one without is never delivered to `messages`.
#[derive(Debug)]
pub struct TransportStreams {
    pub messages: mpsc::Receiver<Value>,
    pub notifications: mpsc::Receiver<Value>,
}

/// Lifecycle contract shared by the stdio and socket implementations.
pub trait Transport: Send {
    /// Connect the underlying channel and return the output streams.
    fn init(&mut self) -> impl Future<Output = Result<TransportStreams, ClientError>> + Send;

    /// Enqueue one JSON-RPC message for framed transmission.
    ///
    /// Fails with [`ClientError::NotConnected`] before `init` or after
    /// `dispose`.
    fn send(&self, frame: Value) -> Result<(), ClientError>;

    fn is_connected(&self) -> bool;

    /// Release the underlying channel and complete both output streams.
    /// Idempotent.
    fn dispose(&mut self) -> impl Future<Output = ()> + Send;
}

/// Sender halves of [`TransportStreams`], held by a transport's reader task.
pub(crate) struct FrameSinks {
    messages: mpsc::Sender<Value>,
    notifications: mpsc::Sender<Value>,
}

impl FrameSinks {
    pub(crate) fn channel() -> (Self, TransportStreams) {
        let (messages_tx, messages_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let (notifications_tx, notifications_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        (
            Self {
                messages: messages_tx,
                notifications: notifications_tx,
            },
            TransportStreams {
                messages: messages_rx,
                notifications: notifications_rx,
            },
        )
    }

    /// Route one decoded frame by id presence. Delivery failures mean the
    /// receiver is gone, which only happens during teardown.
    pub(crate) async fn route(&self, frame: Value) {
        if frame.get("id").is_some() {
            let _ = self.messages.send(frame).await;
        } else {
            let _ = self.notifications.send(frame).await;
        }
    }

    #[cfg(test)]
    pub(crate) fn try_route(&self, frame: Value) {
        if frame.get("id").is_some() {
            let _ = self.messages.try_send(frame);
        } else {
            let _ = self.notifications.try_send(frame);
        }
    }
}
