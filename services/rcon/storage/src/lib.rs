//! Server record store for the RCON panel.
//!
//! The session layer never owns persistence: it reads server records through
//! the [`ServerStore`] trait at startup and when told about additions, edits
//! and deletions. This crate provides the record types, the trait, and two
//! backends (in-memory and a JSON file).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Stable identifier assigned to a server by the store
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub u64);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServerId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u64>() {
            Ok(id) if id > 0 => Ok(ServerId(id)),
            _ => Err(StorageError::Invalid(format!("not a server id: {:?}", s))),
        }
    }
}

/// Connection parameters for one remote server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Identifier assigned by the store
    pub id: ServerId,
    /// Host name or IP address
    pub host: String,
    /// RCON port
    pub port: u16,
    /// RCON password
    pub secret: String,
}

impl ServerRecord {
    /// Create a record
    pub fn new(id: ServerId, host: impl Into<String>, port: u16, secret: impl Into<String>) -> Self {
        Self {
            id,
            host: host.into(),
            port,
            secret: secret.into(),
        }
    }

    /// `host:port` for logging
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ServerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRecord")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A server that has not been assigned an id yet
#[derive(Clone, Serialize, Deserialize)]
pub struct NewServer {
    /// Host name or IP address
    pub host: String,
    /// RCON port
    pub port: u16,
    /// RCON password
    pub secret: String,
}

impl NewServer {
    /// Attach an id, producing a full record
    pub fn with_id(self, id: ServerId) -> ServerRecord {
        ServerRecord {
            id,
            host: self.host,
            port: self.port,
            secret: self.secret,
        }
    }
}

impl fmt::Debug for NewServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewServer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Invalid input or operation
    #[error("Invalid operation: {0}")]
    Invalid(String),
}

/// Registry of known servers
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Every known server, ordered by id
    async fn list_all(&self) -> Result<Vec<ServerRecord>, StorageError>;

    /// Look up one server
    async fn get_by_id(&self, id: ServerId) -> Result<Option<ServerRecord>, StorageError>;

    /// Store a new server and assign it an id
    async fn insert(&self, server: NewServer) -> Result<ServerRecord, StorageError>;

    /// Remove a server; returns whether it existed
    async fn remove(&self, id: ServerId) -> Result<bool, StorageError>;
}

/// Store backend configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StoreMode {
    /// In-memory store (dev/tests only)
    #[default]
    InMemory,
    /// JSON document on disk
    File {
        /// Path of the JSON document
        path: PathBuf,
    },
}

// Re-export backend implementations
pub use backend::file::FileServerStore;
pub use backend::mem::MemoryServerStore;

/// Create a store from configuration
pub async fn open_store(mode: StoreMode) -> Result<Box<dyn ServerStore>, StorageError> {
    match mode {
        StoreMode::InMemory => Ok(Box::new(MemoryServerStore::new())),
        StoreMode::File { path } => Ok(Box::new(FileServerStore::open(path).await?)),
    }
}
