//! Error taxonomy for the client engine.
//!
//! Decode errors are deliberately absent: a malformed frame between valid
//! headers is logged and skipped inside the codec, never surfaced across
//! the transport boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// `send` was called before `init` or after `dispose`.
    #[error("transport is not connected")]
    NotConnected,

    /// The underlying socket connect (or stream setup) failed.
    #[error("failed to connect to mutation server: {0}")]
    Connection(#[source] std::io::Error),

    /// The mutation server process could not be spawned.
    #[error("mutation server process could not be spawned: {0}")]
    CouldNotSpawnProcess(#[source] std::io::Error),

    /// The server did not report its connection coordinates in time.
    #[error("mutation server did not start within the timeout")]
    ServerStartupTimeout,

    /// The server answered a request with a JSON-RPC error object.
    #[error("mutation server error: {message}")]
    Remote { code: i64, message: String },

    /// The transport closed or was disposed while the call was outstanding.
    #[error("transport closed with the request outstanding")]
    TransportClosed,

    /// The handshake succeeded but the server speaks an incompatible
    /// protocol major version.
    #[error("unsupported mutation server protocol version: {version}")]
    UnsupportedServerVersion { version: String },

    /// A session operation was invoked outside the `Ready` state.
    #[error("session is not ready")]
    NotReady,

    /// A response arrived but did not match the expected result shape.
    #[error("malformed mutation server response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}
