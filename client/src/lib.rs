//! Client engine for mutation testing servers.
//!
//! Drives an external mutation server process over JSON-RPC 2.0, framed
//! with `Content-Length` headers, transported over the server's stdio or a
//! TCP socket. The engine sequences the `configure` handshake, `discover`
//! calls, and `mutationTest` calls with their interleaved progress
//! notifications; presenting the results is the embedding application's
//! concern.

pub mod codec;
pub mod error;
pub mod process;
pub mod rpc;
pub mod session;
pub mod transport;
pub mod watch;

pub use error::ClientError;
pub use process::ServerProcess;
pub use rpc::RpcClient;
pub use session::{MutationSession, SessionState, SUPPORTED_PROTOCOL_VERSION};
pub use transport::{SocketTransport, StdioTransport, Transport, TransportStreams};
pub use watch::{ChangeBatch, ChangeBatcher, ChangeSender};
