//! Connection supervision for remote game server consoles.
//!
//! This crate keeps one authenticated RCON connection per registered server,
//! detects dead links with a periodic probe, reconnects transparently and
//! serializes commands per server so callers never interleave on a socket.
//!
//! ## Features
//!
//! - **Session lifecycle**: connect, authenticate, tear down, reconnect
//! - **Heartbeat**: cancellable per-session liveness probe
//! - **Serialized execution**: FIFO per server, parallel across servers
//! - **Normalized outcomes**: success, soft timeout or no connection
//! - **TCP transport**: `rcon-wire` codec over `tokio::net::TcpStream`
//!
//! ## Example
//!
//! ```rust,no_run
//! use rcon_session::{ManagerConfig, SessionManager, TcpConnector};
//! use rcon_storage::{MemoryServerStore, ServerId, ServerRecord};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let store = Arc::new(MemoryServerStore::with_records([ServerRecord::new(
//!     ServerId(1),
//!     "127.0.0.1",
//!     27015,
//!     "changeme",
//! )]));
//! let manager = SessionManager::new(store, Arc::new(TcpConnector::new()), ManagerConfig::default());
//!
//! manager.init_all().await;
//! let outcome = manager.execute(ServerId(1), "status").await;
//! println!("{:?}", outcome);
//! manager.shutdown().await;
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod commands;
pub mod error;
pub mod manager;
pub mod outcome;
pub mod transport;

mod heartbeat;
mod session;

#[cfg(test)]
mod mock;

pub use client::{ClientError, Connector, RconClient};
pub use commands::{PlayerCounts, PluginAction};
pub use error::SessionError;
pub use manager::{ManagerConfig, SessionManager, SessionSnapshot};
pub use outcome::{CommandOutcome, CommandReply, OutcomeKind};
pub use session::SessionState;
pub use transport::{TcpConnector, TcpRconClient, RESPONSE_SPLIT_THRESHOLD};
