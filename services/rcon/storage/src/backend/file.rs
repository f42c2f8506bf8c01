//! File-based store backend: a single JSON document

use crate::{NewServer, ServerId, ServerRecord, ServerStore, StorageError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// On-disk document layout
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct StoreDocument {
    next_id: u64,
    servers: Vec<ServerRecord>,
}

impl StoreDocument {
    fn allocate_id(&mut self) -> ServerId {
        let floor = self.servers.iter().map(|r| r.id.0).max().unwrap_or(0) + 1;
        let id = self.next_id.max(floor);
        self.next_id = id + 1;
        ServerId(id)
    }
}

/// Server store persisted as JSON
#[derive(Debug)]
pub struct FileServerStore {
    path: PathBuf,
    document: RwLock<StoreDocument>,
}

impl FileServerStore {
    /// Open the store at `path`, creating an empty one if missing
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let document = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let document: StoreDocument = serde_json::from_str(&raw)?;
            info!(
                "Loaded {} server records from {:?}",
                document.servers.len(),
                path
            );
            document
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            info!("Creating new server store at {:?}", path);
            let document = StoreDocument {
                next_id: 1,
                servers: Vec::new(),
            };
            persist(&path, &document)?;
            document
        };

        Ok(Self {
            path,
            document: RwLock::new(document),
        })
    }

    /// Location of the JSON document
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write to a sibling temp file, then rename over the target
fn persist(path: &Path, document: &StoreDocument) -> Result<(), StorageError> {
    let tmp = path.with_extension("json.tmp");
    let raw = serde_json::to_vec_pretty(document)?;

    let mut file = fs::File::create(&tmp)?;
    file.write_all(&raw)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;

    debug!("Persisted {} server records to {:?}", document.servers.len(), path);
    Ok(())
}

#[async_trait]
impl ServerStore for FileServerStore {
    async fn list_all(&self) -> Result<Vec<ServerRecord>, StorageError> {
        let document = self.document.read().await;
        let mut records = document.servers.clone();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn get_by_id(&self, id: ServerId) -> Result<Option<ServerRecord>, StorageError> {
        let document = self.document.read().await;
        Ok(document.servers.iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, server: NewServer) -> Result<ServerRecord, StorageError> {
        let mut document = self.document.write().await;

        let mut updated = document.clone();
        let record = server.with_id(updated.allocate_id());
        updated.servers.push(record.clone());

        // Only commit in memory once the file is written
        persist(&self.path, &updated)?;
        *document = updated;

        Ok(record)
    }

    async fn remove(&self, id: ServerId) -> Result<bool, StorageError> {
        let mut document = self.document.write().await;
        if !document.servers.iter().any(|r| r.id == id) {
            return Ok(false);
        }

        let mut updated = document.clone();
        updated.servers.retain(|r| r.id != id);
        persist(&self.path, &updated)?;
        *document = updated;

        Ok(true)
    }
}
