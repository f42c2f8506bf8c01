//! In-memory store backend for development and testing

use crate::{NewServer, ServerId, ServerRecord, ServerStore, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// In-memory server store
#[derive(Debug)]
pub struct MemoryServerStore {
    records: DashMap<ServerId, ServerRecord>,
    next_id: AtomicU64,
}

impl MemoryServerStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = ServerRecord>) -> Self {
        let store = Self::new();
        for record in records {
            store.upsert(record);
        }
        store
    }

    /// Insert or replace a record under its own id
    pub fn upsert(&self, record: ServerRecord) {
        self.next_id.fetch_max(record.id.0 + 1, Ordering::SeqCst);
        self.records.insert(record.id, record);
    }
}

impl Default for MemoryServerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServerStore for MemoryServerStore {
    async fn list_all(&self) -> Result<Vec<ServerRecord>, StorageError> {
        let mut records: Vec<ServerRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn get_by_id(&self, id: ServerId) -> Result<Option<ServerRecord>, StorageError> {
        Ok(self.records.get(&id).map(|entry| entry.value().clone()))
    }

    async fn insert(&self, server: NewServer) -> Result<ServerRecord, StorageError> {
        let id = ServerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = server.with_id(id);
        debug!("Store insert id={} addr={}", id, record.address());
        self.records.insert(id, record.clone());
        Ok(record)
    }

    async fn remove(&self, id: ServerId) -> Result<bool, StorageError> {
        debug!("Store remove id={}", id);
        Ok(self.records.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_server(port: u16) -> NewServer {
        NewServer {
            host: "127.0.0.1".to_string(),
            port,
            secret: "x".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_increasing_ids() {
        let store = MemoryServerStore::new();
        let a = store.insert(new_server(27015)).await.unwrap();
        let b = store.insert(new_server(27016)).await.unwrap();

        assert_eq!(a.id, ServerId(1));
        assert_eq!(b.id, ServerId(2));
        assert_eq!(store.list_all().await.unwrap(), vec![a, b]);
    }

    #[tokio::test]
    async fn test_with_records_continues_id_sequence() {
        let store = MemoryServerStore::with_records([ServerRecord::new(
            ServerId(10),
            "10.0.0.1",
            27015,
            "s",
        )]);

        let next = store.insert(new_server(27020)).await.unwrap();
        assert_eq!(next.id, ServerId(11));
        assert!(store.get_by_id(ServerId(10)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryServerStore::new();
        let record = store.insert(new_server(27015)).await.unwrap();

        assert!(store.remove(record.id).await.unwrap());
        assert!(!store.remove(record.id).await.unwrap());
        assert!(store.get_by_id(record.id).await.unwrap().is_none());
    }
}
