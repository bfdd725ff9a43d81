//! Transport over the server process's own stdin and stdout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::codec::{encode_frame, FrameDecoder};
use crate::error::ClientError;
use crate::process::ServerProcess;
use crate::transport::{FrameSinks, Transport, TransportStreams};

/// Frames exchanged directly over the child's pipes. The process is owned
/// here: disposing the transport kills the server.
pub struct StdioTransport {
    process: ServerProcess,
    connected: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl StdioTransport {
    #[must_use]
    pub fn new(process: ServerProcess) -> Self {
        Self {
            process,
            connected: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
        }
    }
}

impl Transport for StdioTransport {
    async fn init(&mut self) -> Result<TransportStreams, ClientError> {
        let stdout = self.process.take_stdout().ok_or(ClientError::NotConnected)?;
        let stderr = self.process.take_stderr();
        let (sinks, streams) = FrameSinks::channel();

        self.connected.store(true, Ordering::SeqCst);
        let connected = Arc::clone(&self.connected);
        self.tasks.push(tokio::spawn(async move {
            let mut stdout = stdout;
            let mut decoder = FrameDecoder::new();
            while let Some(chunk) = stdout.recv().await {
                for frame in decoder.feed(&chunk) {
                    sinks.route(frame).await;
                }
            }
            connected.store(false, Ordering::SeqCst);
            tracing::info!("mutation server closed its stdout");
        }));

        if let Some(mut stderr) = stderr {
            self.tasks.push(tokio::spawn(async move {
                while let Some(line) = stderr.recv().await {
                    tracing::info!(target: "mutation_server", "{line}");
                }
            }));
        }

        Ok(streams)
    }

    fn send(&self, frame: Value) -> Result<(), ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.process.write(encode_frame(&frame))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn dispose(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        self.process.dispose();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
