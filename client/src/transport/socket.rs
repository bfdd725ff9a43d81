//! Transport over a TCP socket the server listens on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use msp_types::ServerLocation;

use crate::codec::{encode_frame, FrameDecoder};
use crate::error::ClientError;
use crate::process::ServerProcess;
use crate::transport::{FrameSinks, Transport, TransportStreams};

const READ_BUF: usize = 8 * 1024;

/// Frames exchanged over a TCP connection to a server that announced its
/// coordinates on stdout. The process handle, when present, is owned so
/// that disposing the transport also kills the server.
pub struct SocketTransport {
    location: ServerLocation,
    process: Option<ServerProcess>,
    writer_tx: Option<mpsc::UnboundedSender<Value>>,
    connected: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SocketTransport {
    #[must_use]
    pub fn new(location: ServerLocation, process: Option<ServerProcess>) -> Self {
        Self {
            location,
            process,
            writer_tx: None,
            connected: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
        }
    }
}

impl Transport for SocketTransport {
    async fn init(&mut self) -> Result<TransportStreams, ClientError> {
        let stream = TcpStream::connect((self.location.host.as_str(), self.location.port))
            .await
            .map_err(ClientError::Connection)?;
        let (mut read_half, mut write_half) = stream.into_split();
        let (sinks, streams) = FrameSinks::channel();

        self.connected.store(true, Ordering::SeqCst);
        let connected = Arc::clone(&self.connected);
        self.tasks.push(tokio::spawn(async move {
            let mut decoder = FrameDecoder::new();
            let mut buf = [0u8; READ_BUF];
            loop {
                match read_half.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        for frame in decoder.feed(&buf[..n]) {
                            sinks.route(frame).await;
                        }
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            tracing::info!("mutation server closed the socket");
        }));

        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Value>();
        self.tasks.push(tokio::spawn(async move {
            while let Some(frame) = writer_rx.recv().await {
                let bytes = encode_frame(&frame);
                if let Err(e) = write_half.write_all(&bytes).await {
                    tracing::warn!("mutation server socket write error: {e}");
                    break;
                }
            }
        }));
        self.writer_tx = Some(writer_tx);

        if let Some(process) = &mut self.process {
            if let Some(mut stderr) = process.take_stderr() {
                self.tasks.push(tokio::spawn(async move {
                    while let Some(line) = stderr.recv().await {
                        tracing::info!(target: "mutation_server", "{line}");
                    }
                }));
            }
        }

        Ok(streams)
    }

    fn send(&self, frame: Value) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.writer_tx
            .as_ref()
            .ok_or(ClientError::NotConnected)?
            .send(frame)
            .map_err(|_| ClientError::NotConnected)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn dispose(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        self.writer_tx = None;
        if let Some(process) = &mut self.process {
            process.dispose();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn echo_listener() -> (ServerLocation, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if socket.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        (
            ServerLocation {
                host: "127.0.0.1".to_string(),
                port,
            },
            task,
        )
    }

    #[tokio::test]
    async fn test_connect_refused_is_a_connection_error() {
        let location = ServerLocation {
            host: "127.0.0.1".to_string(),
            port: 1,
        };
        let mut transport = SocketTransport::new(location, None);
        let err = transport.init().await.unwrap_err();
        assert!(matches!(err, ClientError::Connection(_)));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_frames_round_trip_through_the_socket() {
        let (location, server) = echo_listener().await;
        let mut transport = SocketTransport::new(location, None);
        let mut streams = transport.init().await.unwrap();

        let request = json!({"jsonrpc": "2.0", "id": 9, "method": "configure"});
        transport.send(request.clone()).unwrap();
        assert_eq!(streams.messages.recv().await.unwrap(), request);

        let notification = json!({"jsonrpc": "2.0", "method": "reportMutationTestProgress"});
        transport.send(notification.clone()).unwrap();
        assert_eq!(streams.notifications.recv().await.unwrap(), notification);

        transport.dispose().await;
        assert!(!transport.is_connected());
        server.abort();
    }

    #[tokio::test]
    async fn test_server_closing_completes_streams() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let location = ServerLocation {
            host: "127.0.0.1".to_string(),
            port: listener.local_addr().unwrap().port(),
        };
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let mut transport = SocketTransport::new(location, None);
        let mut streams = transport.init().await.unwrap();
        assert!(streams.messages.recv().await.is_none());
        assert!(streams.notifications.recv().await.is_none());
        assert!(!transport.is_connected());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_after_dispose_fails() {
        let (location, server) = echo_listener().await;
        let mut transport = SocketTransport::new(location, None);
        let _streams = transport.init().await.unwrap();
        transport.dispose().await;
        let err = transport.send(json!({"id": 1})).unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        server.abort();
    }
}
