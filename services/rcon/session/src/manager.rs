//! Session manager owning every tracked server connection
//!
//! The [`SessionManager`] maps server ids to sessions, drives connects from
//! the record store and hands out normalized command outcomes. It is a cheap
//! handle: clones share the same registry.

use crate::client::Connector;
use crate::commands::{self, PlayerCounts, PluginAction};
use crate::error::SessionError;
use crate::outcome::CommandOutcome;
use crate::session::{SessionContext, SessionSlot};
use futures::future::join_all;
use rcon_storage::{ServerId, ServerRecord, ServerStore};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Timeouts and heartbeat settings shared by all sessions
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Bound on opening and authenticating one connection
    pub connect_timeout: Duration,
    /// Bound on closing a transport before it is abandoned
    pub close_timeout: Duration,
    /// Bound on waiting for one command response
    pub command_timeout: Duration,
    /// Period between heartbeat probes
    pub heartbeat_interval: Duration,
    /// Bound on one heartbeat probe
    pub heartbeat_timeout: Duration,
    /// Command sent as the heartbeat probe
    pub heartbeat_command: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(1),
            command_timeout: Duration::from_millis(2000),
            heartbeat_interval: Duration::from_secs(5),
            heartbeat_timeout: Duration::from_secs(5),
            heartbeat_command: "status".to_string(),
        }
    }
}

/// Cached liveness of one server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Server id
    pub id: ServerId,
    /// Transport open at last check
    pub connected: bool,
    /// Authenticated at last check
    pub authenticated: bool,
}

/// Registry of sessions keyed by server id
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    store: Arc<dyn ServerStore>,
    ctx: Arc<SessionContext>,
    /// Held only around lookup and mutation, never across I/O
    sessions: RwLock<HashMap<ServerId, Arc<SessionSlot>>>,
}

impl SessionManager {
    /// Create an empty manager
    pub fn new(
        store: Arc<dyn ServerStore>,
        connector: Arc<dyn Connector>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                store,
                ctx: Arc::new(SessionContext { connector, config }),
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.ctx.config
    }

    /// Record store backing this manager
    pub fn store(&self) -> &Arc<dyn ServerStore> {
        &self.inner.store
    }

    async fn slot(&self, id: ServerId) -> Option<Arc<SessionSlot>> {
        self.inner.sessions.read().await.get(&id).cloned()
    }

    /// Existing slot for the id, or a new one built from `record`
    async fn track(&self, record: ServerRecord) -> Arc<SessionSlot> {
        let mut sessions = self.inner.sessions.write().await;
        let ctx = &self.inner.ctx;
        sessions
            .entry(record.id)
            .or_insert_with(|| SessionSlot::new(record, Arc::clone(ctx)))
            .clone()
    }

    /// Whether a session exists for the id
    pub async fn is_tracked(&self, id: ServerId) -> bool {
        self.inner.sessions.read().await.contains_key(&id)
    }

    /// Connect every stored server that is not tracked yet.
    ///
    /// Best effort: failures are logged and skipped. Returns how many
    /// sessions came up live.
    pub async fn init_all(&self) -> usize {
        let records = match self.inner.store.list_all().await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to list servers: {}", e);
                return 0;
            }
        };
        info!("Initializing RCON for {} servers", records.len());

        let mut pending = Vec::new();
        for record in records {
            if self.is_tracked(record.id).await {
                continue;
            }
            pending.push(self.track(record).await);
        }

        let results = join_all(pending.iter().map(|slot| slot.connect(None))).await;
        let mut live = 0;
        for (slot, result) in pending.iter().zip(results) {
            match result {
                Ok(()) => live += 1,
                Err(e) => warn!(server_id = %slot.id(), "Initial connect failed: {}", e),
            }
        }

        info!("RCON initialized: {}/{} servers live", live, pending.len());
        live
    }

    /// Track `record` and try to connect; a failed connect is only logged.
    /// Returns whether the session is live.
    pub async fn add(&self, record: ServerRecord) -> bool {
        let id = record.id;
        match self.connect(id, record).await {
            Ok(()) => true,
            Err(e) => {
                warn!(server_id = %id, "Server added but not connected: {}", e);
                false
            }
        }
    }

    /// Track (or update) the record for `id` and reconnect with it
    pub async fn connect(&self, id: ServerId, record: ServerRecord) -> Result<(), SessionError> {
        let record = if record.id == id {
            record
        } else {
            ServerRecord { id, ..record }
        };
        let slot = self.track(record.clone()).await;
        slot.connect(Some(record)).await
    }

    /// Re-read the record from the store and reconnect
    pub async fn reconnect(&self, id: ServerId) -> Result<(), SessionError> {
        let slot = self.slot(id).await;
        let stored = match self.inner.store.get_by_id(id).await {
            Ok(record) => record,
            Err(e) => {
                if slot.is_none() {
                    return Err(e.into());
                }
                warn!(server_id = %id, "Store lookup failed, using cached record: {}", e);
                None
            }
        };

        match (slot, stored) {
            (Some(slot), record) => slot.connect(record).await,
            (None, Some(record)) => self.track(record).await.connect(None).await,
            (None, None) => Err(SessionError::UnknownServer(id)),
        }
    }

    /// Close the connection but keep tracking the server
    pub async fn disconnect(&self, id: ServerId) -> Result<(), SessionError> {
        let slot = self
            .slot(id)
            .await
            .ok_or(SessionError::UnknownServer(id))?;
        slot.disconnect().await;
        Ok(())
    }

    /// Stop tracking the server and close its connection. Idempotent.
    pub async fn delete(&self, id: ServerId) {
        let removed = self.inner.sessions.write().await.remove(&id);
        match removed {
            Some(slot) => {
                slot.retire();
                slot.disconnect().await;
                info!(server_id = %id, "Session deleted");
            }
            None => debug!(server_id = %id, "Delete of untracked server"),
        }
    }

    /// Cached flags of every session, ordered by id
    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        let sessions = self.inner.sessions.read().await;
        let mut snapshot: Vec<SessionSnapshot> = sessions
            .values()
            .map(|slot| SessionSnapshot {
                id: slot.id(),
                connected: slot.connected(),
                authenticated: slot.authenticated(),
            })
            .collect();
        snapshot.sort_by_key(|entry| entry.id);
        snapshot
    }

    /// Run a command on one server
    pub async fn execute(&self, id: ServerId, command: &str) -> CommandOutcome {
        match self.slot(id).await {
            Some(slot) => slot.execute(command).await,
            None => {
                warn!(server_id = %id, "No session for server");
                CommandOutcome::NoConnection
            }
        }
    }

    /// [`execute`](Self::execute) with the command logged under `tag`
    pub async fn execute_tagged(&self, id: ServerId, command: &str, tag: &str) -> CommandOutcome {
        info!(server_id = %id, tag, "{}", command);
        self.execute(id, command).await
    }

    /// `exec <cfg_name>`
    pub async fn exec_cfg(&self, id: ServerId, cfg_name: &str) -> CommandOutcome {
        let command = commands::exec_cfg_command(cfg_name);
        self.execute_tagged(id, &command, "setup-game").await
    }

    /// Load, unload or reload a server plugin
    pub async fn plugin_command(
        &self,
        id: ServerId,
        action: PluginAction,
        plugin_path: &str,
    ) -> CommandOutcome {
        let command = commands::plugin_command(action, plugin_path);
        self.execute_tagged(id, &command, "plugins").await
    }

    /// Current server hostname, when the server answered
    pub async fn hostname(&self, id: ServerId) -> Option<String> {
        self.execute(id, "hostname")
            .await
            .text()
            .map(commands::parse_hostname)
    }

    /// Human and bot counts from `status`, when the server answered
    pub async fn player_counts(&self, id: ServerId) -> Option<PlayerCounts> {
        self.execute(id, "status")
            .await
            .text()
            .and_then(commands::parse_player_counts)
    }

    /// Round backups the server keeps, as reported by the server
    pub async fn list_round_backups(&self, id: ServerId) -> CommandOutcome {
        self.execute(id, commands::LIST_ROUND_BACKUPS).await
    }

    /// Restore the backup of `round` and pause the match
    pub async fn restore_round_backup(&self, id: ServerId, round: u32) -> CommandOutcome {
        self.restore_backup(id, &commands::round_backup_file(round)).await
    }

    /// Restore the most recent round backup and pause the match. Returns the
    /// restored file, or `None` when the server has no backup or the restore
    /// could not be sent.
    pub async fn restore_last_round_backup(&self, id: ServerId) -> Option<String> {
        let file = self
            .execute(id, commands::LAST_ROUND_BACKUP)
            .await
            .text()
            .and_then(commands::parse_last_round_backup)?;
        self.restore_backup(id, &file).await.is_ok().then_some(file)
    }

    async fn restore_backup(&self, id: ServerId, file: &str) -> CommandOutcome {
        let command = commands::restore_backup_command(file);
        let outcome = self.execute_tagged(id, &command, "setup-game").await;
        if !outcome.is_ok() {
            return outcome;
        }
        self.execute_tagged(id, commands::PAUSE_MATCH, "setup-game").await
    }

    /// Disconnect and forget every session
    pub async fn shutdown(&self) {
        let slots: Vec<Arc<SessionSlot>> = {
            let mut sessions = self.inner.sessions.write().await;
            sessions.drain().map(|(_, slot)| slot).collect()
        };
        info!("Shutting down {} RCON sessions", slots.len());

        for slot in &slots {
            slot.retire();
        }
        join_all(slots.iter().map(|slot| slot.disconnect())).await;
    }
}
