//! Configuration handling for the panel.
//!
//! Settings come from an optional YAML file, then environment variables,
//! then command line flags (applied by `main`).

use anyhow::Result;
use rcon_session::ManagerConfig;
use rcon_storage::StoreMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Panel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// JSON file holding server records; in-memory store when unset
    pub store_path: Option<PathBuf>,
    /// Open + authenticate bound (milliseconds)
    pub connect_timeout_ms: u64,
    /// Transport close bound (milliseconds)
    pub close_timeout_ms: u64,
    /// Command response bound (milliseconds)
    pub command_timeout_ms: u64,
    /// Heartbeat period (milliseconds)
    pub heartbeat_interval_ms: u64,
    /// Heartbeat probe bound (milliseconds)
    pub heartbeat_timeout_ms: u64,
    /// Probe command
    pub heartbeat_command: String,
    /// Largest accepted RCON packet
    pub max_packet_size: usize,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            connect_timeout_ms: 10_000,
            close_timeout_ms: 1_000,
            command_timeout_ms: 2_000,
            heartbeat_interval_ms: 5_000,
            heartbeat_timeout_ms: 5_000,
            heartbeat_command: "status".to_string(),
            max_packet_size: rcon_wire::DEFAULT_MAX_PACKET_SIZE,
        }
    }
}

/// Root of the YAML document; panel settings live under `rcon:`
#[derive(Debug, Deserialize)]
struct RootConfig {
    rcon: Option<PanelConfig>,
}

impl PanelConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let path = config_path.as_ref();
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root) => {
                    info!("Loaded configuration from {:?}", path);
                    root.rcon.unwrap_or_default()
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?} ({}), using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                warn!("Config file {:?} not found, using defaults", path);
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        info!(
            "Final panel configuration: store={:?}, connect_timeout={}ms, command_timeout={}ms, heartbeat={}ms",
            config.store_path,
            config.connect_timeout_ms,
            config.command_timeout_ms,
            config.heartbeat_interval_ms
        );
        Ok(config)
    }

    /// Apply `RCON_*` overrides read through `lookup`
    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("RCON_COMMAND_TIMEOUT_MS") {
            match value.parse::<u64>() {
                Ok(ms) => {
                    self.command_timeout_ms = ms;
                    info!("Command timeout overridden by environment: {}ms", ms);
                }
                Err(_) => warn!("Ignoring invalid RCON_COMMAND_TIMEOUT_MS: {}", value),
            }
        }

        if let Some(value) = lookup("RCON_CONNECT_TIMEOUT_MS") {
            match value.parse::<u64>() {
                Ok(ms) => {
                    self.connect_timeout_ms = ms;
                    info!("Connect timeout overridden by environment: {}ms", ms);
                }
                Err(_) => warn!("Ignoring invalid RCON_CONNECT_TIMEOUT_MS: {}", value),
            }
        }

        if let Some(path) = lookup("RCON_STORE_PATH") {
            info!("Store path overridden by environment: {}", path);
            self.store_path = Some(PathBuf::from(path));
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("close_timeout_ms", self.close_timeout_ms),
            ("command_timeout_ms", self.command_timeout_ms),
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("heartbeat_timeout_ms", self.heartbeat_timeout_ms),
        ] {
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }
        if self.heartbeat_command.trim().is_empty() {
            anyhow::bail!("heartbeat_command must not be empty");
        }
        Ok(())
    }

    /// Session manager settings
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            close_timeout: Duration::from_millis(self.close_timeout_ms),
            command_timeout: Duration::from_millis(self.command_timeout_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            heartbeat_timeout: Duration::from_millis(self.heartbeat_timeout_ms),
            heartbeat_command: self.heartbeat_command.clone(),
        }
    }

    /// Record store backend
    pub fn store_mode(&self) -> StoreMode {
        match &self.store_path {
            Some(path) => StoreMode::File { path: path.clone() },
            None => StoreMode::InMemory,
        }
    }
}
