//! Command builders and response parsers layered on top of `execute`.
//!
//! The session layer treats commands as opaque text; these helpers only
//! exist so callers do not hand-assemble the handful of console commands the
//! panel sends itself.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::str::FromStr;

/// Plugin manager verbs understood by `css_plugins`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginAction {
    /// Load a plugin that is not loaded yet
    Load,
    /// Unload a loaded plugin
    Unload,
    /// Reload (or load) a plugin
    Reload,
}

impl PluginAction {
    /// Console spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginAction::Load => "load",
            PluginAction::Unload => "unload",
            PluginAction::Reload => "reload",
        }
    }
}

impl fmt::Display for PluginAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "load" => Ok(PluginAction::Load),
            "unload" => Ok(PluginAction::Unload),
            "reload" => Ok(PluginAction::Reload),
            other => Err(format!("unknown plugin action: {}", other)),
        }
    }
}

/// `exec <name>`
pub fn exec_cfg_command(cfg_name: &str) -> String {
    format!("exec {}", cfg_name)
}

/// `css_plugins <action> "<path>"`
pub fn plugin_command(action: PluginAction, plugin_path: &str) -> String {
    format!("css_plugins {} \"{}\"", action, plugin_path)
}

/// Value of a `hostname = <value>` reply, or the trimmed reply itself.
/// Only the text between the first and second `=` is the value.
pub fn parse_hostname(response: &str) -> String {
    match response.split('=').nth(1) {
        Some(value) => value.trim().to_string(),
        None => response.trim().to_string(),
    }
}

/// Player counts reported by `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerCounts {
    /// Connected humans
    pub humans: u32,
    /// Connected bots
    pub bots: u32,
}

static PLAYERS_LINE: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"players\s*:\s*(\d+)\s*humans,\s*(\d+)\s*bots")
        .case_insensitive(true)
        .build()
        .expect("player count pattern should never fail to compile")
});

/// Parse the `players : N humans, M bots` line of a `status` reply
pub fn parse_player_counts(response: &str) -> Option<PlayerCounts> {
    let captures = PLAYERS_LINE.captures(response)?;
    let humans = captures.get(1)?.as_str().parse().ok()?;
    let bots = captures.get(2)?.as_str().parse().ok()?;
    Some(PlayerCounts { humans, bots })
}

/// Lists the round backups the server keeps
pub const LIST_ROUND_BACKUPS: &str = "mp_backup_restore_list_files";

/// Asks for the most recent round backup file
pub const LAST_ROUND_BACKUP: &str = "mp_backup_round_file_last";

/// Pauses the match, sent after every restore
pub const PAUSE_MATCH: &str = "mp_pause_match";

/// Backup file the server writes for `round`, e.g. `backup_round07.txt`
pub fn round_backup_file(round: u32) -> String {
    format!("backup_round{:02}.txt", round)
}

/// `mp_backup_restore_load_file <file>`
pub fn restore_backup_command(file: &str) -> String {
    format!("mp_backup_restore_load_file {}", file)
}

/// File named by a `mp_backup_round_file_last` reply, if it is a backup
pub fn parse_last_round_backup(response: &str) -> Option<String> {
    let file = response.split('=').nth(1)?.trim();
    // Tolerate a quoted value
    let file = file.trim_matches('"');
    if file.ends_with(".txt") {
        Some(file.to_string())
    } else {
        None
    }
}
