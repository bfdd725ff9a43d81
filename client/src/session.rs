//! Protocol session over a connected RPC client.
//!
//! The session enforces method ordering: `configure` runs first and gates
//! everything else on an exact protocol version match, after which
//! `discover` and `mutationTest` may be called any number of times in any
//! order. Progress notifications are only meaningful while a
//! `mutationTest` call is in flight; the session forwards them to the
//! caller during the call and discards any that arrive outside one.

use std::path::Path;

use serde_json::Value;
use tokio::sync::mpsc;

use msp_types::{
    ConfigureParams, ConfigureResult, DiscoverParams, DiscoverResult, FileRange,
    MutationTestParams, MutationTestResult, MutationTestTarget, ServerSettings,
};

use crate::error::ClientError;
use crate::process::ServerProcess;
use crate::rpc::RpcClient;
use crate::transport::{SocketTransport, StdioTransport, Transport};

/// The protocol major version this client implements. The handshake
/// requires the server to report exactly this.
pub const SUPPORTED_PROTOCOL_VERSION: &str = "1";

const PROGRESS_METHOD: &str = "reportMutationTestProgress";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, not yet handshaken.
    Unconfigured,
    /// Handshake completed against a compatible server.
    Ready,
    /// Torn down, or the handshake failed. Terminal.
    Closed,
}

/// A configured conversation with one mutation server.
pub struct MutationSession<T: Transport> {
    rpc: RpcClient<T>,
    notifications: Option<mpsc::Receiver<Value>>,
    state: SessionState,
}

impl MutationSession<StdioTransport> {
    /// Spawn the configured server and converse over its stdio.
    pub fn spawn_stdio(
        settings: &ServerSettings,
        workspace_root: &Path,
    ) -> Result<Self, ClientError> {
        let process = ServerProcess::spawn(settings, workspace_root)?;
        Ok(Self::new(RpcClient::new(StdioTransport::new(process))))
    }
}

impl MutationSession<SocketTransport> {
    /// Spawn the configured server, wait for it to announce its socket
    /// coordinates on stdout, and converse over TCP.
    pub async fn spawn_socket(
        settings: &ServerSettings,
        workspace_root: &Path,
    ) -> Result<Self, ClientError> {
        let mut process = ServerProcess::spawn(settings, workspace_root)?;
        let location = process.server_location().await?;
        tracing::debug!(host = %location.host, port = location.port, "server reported its socket");
        Ok(Self::new(RpcClient::new(SocketTransport::new(
            location,
            Some(process),
        ))))
    }
}

impl<T: Transport> MutationSession<T> {
    #[must_use]
    pub fn new(rpc: RpcClient<T>) -> Self {
        Self {
            rpc,
            notifications: None,
            state: SessionState::Unconfigured,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the transport is still up. Goes false on server exit or
    /// crash; the owner decides whether to build a replacement session.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.rpc.is_connected()
    }

    /// Connect the transport and run the `configure` handshake. On any
    /// failure, version mismatch included, the session is disposed.
    pub async fn connect(&mut self, config_file_path: Option<String>) -> Result<(), ClientError> {
        if self.state != SessionState::Unconfigured {
            return Err(ClientError::NotReady);
        }
        match self.handshake(config_file_path).await {
            Ok(version) => {
                tracing::info!(%version, "mutation server session ready");
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(e) => {
                self.dispose().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self, config_file_path: Option<String>) -> Result<String, ClientError> {
        self.notifications = Some(self.rpc.init().await?);

        let params = serde_json::to_value(ConfigureParams { config_file_path })?;
        let result = self.rpc.request("configure", params).await?;
        let configure: ConfigureResult = serde_json::from_value(result)?;
        if configure.version == SUPPORTED_PROTOCOL_VERSION {
            Ok(configure.version)
        } else {
            Err(ClientError::UnsupportedServerVersion {
                version: configure.version,
            })
        }
    }

    /// Enumerate mutants in the given files, or the whole project when
    /// `files` is `None`, without running any tests.
    pub async fn discover(
        &mut self,
        files: Option<Vec<FileRange>>,
    ) -> Result<DiscoverResult, ClientError> {
        self.ensure_ready()?;
        let params = match files {
            Some(_) => serde_json::to_value(DiscoverParams { files })?,
            None => Value::Null,
        };
        let outcome = self.rpc.request("discover", params).await;
        let result = match outcome {
            Ok(result) => result,
            Err(e) => return Err(self.close_if_transport_lost(e)),
        };
        Ok(serde_json::from_value(result)?)
    }

    /// Run mutation testing on the given targets, or the whole project
    /// when `targets` is `None`. Partial results arriving as progress
    /// notifications during the call are forwarded to `on_progress`;
    /// the returned value is the final cumulative result.
    pub async fn mutation_test(
        &mut self,
        targets: Option<Vec<MutationTestTarget>>,
        mut on_progress: impl FnMut(MutationTestResult),
    ) -> Result<MutationTestResult, ClientError> {
        self.ensure_ready()?;
        let Self {
            rpc,
            notifications,
            state,
        } = self;
        let notifications = notifications.as_mut().ok_or(ClientError::NotConnected)?;

        // Discard progress left over from an earlier call.
        while notifications.try_recv().is_ok() {}

        let params = match targets {
            Some(_) => serde_json::to_value(MutationTestParams { targets })?,
            None => Value::Null,
        };
        let request = rpc.request("mutationTest", params);
        tokio::pin!(request);

        let mut notifications_open = true;
        let outcome = loop {
            if notifications_open {
                tokio::select! {
                    biased;
                    frame = notifications.recv() => match frame {
                        Some(frame) => forward_progress(frame, &mut on_progress),
                        None => notifications_open = false,
                    },
                    outcome = &mut request => break outcome,
                }
            } else {
                break request.await;
            }
        };

        // Progress that raced the final response.
        while let Ok(frame) = notifications.try_recv() {
            forward_progress(frame, &mut on_progress);
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                if matches!(e, ClientError::TransportClosed) {
                    *state = SessionState::Closed;
                }
                return Err(e);
            }
        };
        Ok(serde_json::from_value(result)?)
    }

    /// Tear down the transport, killing a spawned server. Idempotent.
    pub async fn dispose(&mut self) {
        self.state = SessionState::Closed;
        self.notifications = None;
        self.rpc.dispose().await;
    }

    fn ensure_ready(&self) -> Result<(), ClientError> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(ClientError::NotReady)
        }
    }

    /// An unexpected server exit surfaces as `TransportClosed`; the session
    /// is unusable from then on, so the state must say so.
    fn close_if_transport_lost(&mut self, e: ClientError) -> ClientError {
        if matches!(e, ClientError::TransportClosed) {
            self.state = SessionState::Closed;
        }
        e
    }
}

fn forward_progress(frame: Value, on_progress: &mut impl FnMut(MutationTestResult)) {
    if frame.get("method").and_then(Value::as_str) != Some(PROGRESS_METHOD) {
        tracing::debug!("ignoring unexpected server notification: {frame}");
        return;
    }
    let params = frame.get("params").cloned().unwrap_or(Value::Null);
    match serde_json::from_value::<MutationTestResult>(params) {
        Ok(partial) => on_progress(partial),
        Err(e) => tracing::warn!("discarding malformed progress notification: {e}"),
    }
}
