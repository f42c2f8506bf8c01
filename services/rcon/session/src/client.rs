//! Protocol client contract consumed by the session layer.
//!
//! A [`Connector`] opens transports; the [`RconClient`] it returns performs
//! authentication and single command/response exchanges. The session layer
//! bounds every call with its own timeouts, so implementations may block
//! indefinitely on a silent peer.

use async_trait::async_trait;
use rcon_wire::WireError;
use thiserror::Error;

/// Errors reported by a protocol client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Socket-level failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed traffic
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    /// The peer closed the connection
    #[error("connection closed by peer")]
    Closed,
    /// The server refused the shared secret
    #[error("authentication rejected")]
    AuthRejected,
    /// A command was issued before authenticating
    #[error("not authenticated")]
    NotAuthenticated,
}

/// One connection to a remote console
#[async_trait]
pub trait RconClient: Send {
    /// Authenticate with the shared secret
    async fn authenticate(&mut self, secret: &str) -> Result<(), ClientError>;

    /// Send a command and wait for its complete response text
    async fn execute(&mut self, command: &str) -> Result<String, ClientError>;

    /// Transport is open
    fn is_connected(&self) -> bool;

    /// Authentication succeeded and has not been invalidated
    fn is_authenticated(&self) -> bool;

    /// Transport can still accept writes
    fn is_writable(&self) -> bool;

    /// Close the transport, resolving once the close completed or failed
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Factory for protocol clients
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a transport to `host:port`
    async fn open(&self, host: &str, port: u16) -> Result<Box<dyn RconClient>, ClientError>;
}
