//! Session layer error types.

use crate::client::ClientError;
use rcon_storage::{ServerId, StorageError};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by session and manager operations.
///
/// `execute` never returns these; it folds every failure into
/// [`CommandOutcome`](crate::CommandOutcome).
#[derive(Error, Debug)]
pub enum SessionError {
    /// No session or record is known for this id
    #[error("unknown server {0}")]
    UnknownServer(ServerId),

    /// Opening the transport or talking to the server failed
    #[error("server {id}: connect failed: {source}")]
    Connect {
        /// Server id
        id: ServerId,
        /// Underlying client error
        #[source]
        source: ClientError,
    },

    /// The server refused the shared secret
    #[error("server {0}: authentication rejected")]
    AuthRejected(ServerId),

    /// Open + authenticate did not finish in time
    #[error("server {id}: authentication timed out after {timeout:?}")]
    ConnectTimeout {
        /// Server id
        id: ServerId,
        /// Configured bound
        timeout: Duration,
    },

    /// The client finished authenticating but does not report a live link
    #[error("server {0}: connection not authenticated")]
    NotAuthenticated(ServerId),

    /// The session was deleted while the operation was in flight
    #[error("server {0} was deleted")]
    Retired(ServerId),

    /// Record store failure
    #[error("store error: {0}")]
    Storage(#[from] StorageError),
}
