//! Line-oriented operator console on stdin.

use crate::{component_info, component_warn};
use anyhow::{Context, Result};
use rcon_session::{CommandOutcome, CommandReply, PluginAction, SessionManager};
use rcon_storage::{NewServer, ServerId};
use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  servers                                 list sessions and liveness
  exec <id> <command...>                  run a console command
  hostname <id>                           show the server hostname
  players <id>                            show human/bot counts
  cfg <id> <name>                         exec a config file
  plugin <id> <load|unload|reload> <path> manage a plugin
  backups <id>                            list round backups
  restore <id> <round|last>               restore a round backup and pause
  add <host> <port> <secret>              register and connect a server
  reconnect <id>                          re-read the record and reconnect
  disconnect <id>                         close the connection
  delete <id>                             forget a server
  help                                    this text
  quit                                    disconnect everything and exit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Servers,
    Exec { id: ServerId, command: String },
    Hostname(ServerId),
    Players(ServerId),
    Cfg { id: ServerId, name: String },
    Plugin {
        id: ServerId,
        action: PluginAction,
        path: String,
    },
    Backups(ServerId),
    /// `None` restores the most recent backup
    Restore { id: ServerId, round: Option<u32> },
    Add { host: String, port: u16, secret: String },
    Reconnect(ServerId),
    Disconnect(ServerId),
    Delete(ServerId),
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConsoleError {
    #[error("unknown command '{0}', try 'help'")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid server id '{0}'")]
    BadId(String),
    #[error("invalid port '{0}'")]
    BadPort(String),
    #[error("invalid round '{0}'")]
    BadRound(String),
    #[error("{0}")]
    BadAction(String),
}

/// First whitespace-delimited word and the trimmed remainder
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(end) => (&s[..end], s[end..].trim()),
        None => (s, ""),
    }
}

fn parse_id(word: &str, usage: &'static str) -> Result<ServerId, ConsoleError> {
    if word.is_empty() {
        return Err(ConsoleError::Usage(usage));
    }
    ServerId::from_str(word).map_err(|_| ConsoleError::BadId(word.to_string()))
}

fn id_only(rest: &str, usage: &'static str) -> Result<ServerId, ConsoleError> {
    let (word, extra) = split_word(rest);
    if !extra.is_empty() {
        return Err(ConsoleError::Usage(usage));
    }
    parse_id(word, usage)
}

/// Parse one line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ConsoleError> {
    let (verb, rest) = split_word(line);
    if verb.is_empty() {
        return Ok(None);
    }

    let command = match verb.to_ascii_lowercase().as_str() {
        "servers" | "ls" => ConsoleCommand::Servers,
        "exec" => {
            const USAGE: &str = "exec <id> <command...>";
            let (id, command) = split_word(rest);
            let id = parse_id(id, USAGE)?;
            if command.is_empty() {
                return Err(ConsoleError::Usage(USAGE));
            }
            ConsoleCommand::Exec {
                id,
                command: command.to_string(),
            }
        }
        "hostname" => ConsoleCommand::Hostname(id_only(rest, "hostname <id>")?),
        "players" => ConsoleCommand::Players(id_only(rest, "players <id>")?),
        "cfg" => {
            const USAGE: &str = "cfg <id> <name>";
            let (id, name) = split_word(rest);
            let id = parse_id(id, USAGE)?;
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(ConsoleError::Usage(USAGE));
            }
            ConsoleCommand::Cfg {
                id,
                name: name.to_string(),
            }
        }
        "plugin" => {
            const USAGE: &str = "plugin <id> <load|unload|reload> <path>";
            let (id, rest) = split_word(rest);
            let id = parse_id(id, USAGE)?;
            let (action, path) = split_word(rest);
            if action.is_empty() || path.is_empty() {
                return Err(ConsoleError::Usage(USAGE));
            }
            let action = PluginAction::from_str(action).map_err(ConsoleError::BadAction)?;
            ConsoleCommand::Plugin {
                id,
                action,
                path: path.trim_matches('"').to_string(),
            }
        }
        "backups" => ConsoleCommand::Backups(id_only(rest, "backups <id>")?),
        "restore" => {
            const USAGE: &str = "restore <id> <round|last>";
            let (id, which) = split_word(rest);
            let id = parse_id(id, USAGE)?;
            let round = match which {
                "" => return Err(ConsoleError::Usage(USAGE)),
                "last" => None,
                n => Some(
                    n.parse::<u32>()
                        .map_err(|_| ConsoleError::BadRound(n.to_string()))?,
                ),
            };
            ConsoleCommand::Restore { id, round }
        }
        "add" => {
            const USAGE: &str = "add <host> <port> <secret>";
            let (host, rest) = split_word(rest);
            let (port, secret) = split_word(rest);
            if host.is_empty() || port.is_empty() || secret.is_empty() {
                return Err(ConsoleError::Usage(USAGE));
            }
            let port = port
                .parse::<u16>()
                .map_err(|_| ConsoleError::BadPort(port.to_string()))?;
            ConsoleCommand::Add {
                host: host.to_string(),
                port,
                secret: secret.to_string(),
            }
        }
        "reconnect" => ConsoleCommand::Reconnect(id_only(rest, "reconnect <id>")?),
        "disconnect" => ConsoleCommand::Disconnect(id_only(rest, "disconnect <id>")?),
        "delete" | "rm" => ConsoleCommand::Delete(id_only(rest, "delete <id>")?),
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(ConsoleError::Unknown(other.to_string())),
    };

    Ok(Some(command))
}

fn print_outcome(outcome: CommandOutcome) {
    match &outcome {
        CommandOutcome::Success(text) => println!("{}", text.trim_end()),
        CommandOutcome::SoftTimeout => println!("(sent, no response in time)"),
        CommandOutcome::NoConnection => println!("(no connection)"),
    }
}

/// Execute a parsed command against the manager
pub async fn run(manager: &SessionManager, command: ConsoleCommand) -> Result<()> {
    match command {
        ConsoleCommand::Servers => {
            let snapshot = manager.snapshot().await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        ConsoleCommand::Exec { id, command } => {
            let outcome = manager.execute_tagged(id, &command, "rcon").await;
            if !outcome.is_ok() {
                let reply = CommandReply::from(outcome.clone());
                component_warn!("console", "{}", serde_json::to_string(&reply)?);
            }
            print_outcome(outcome);
        }
        ConsoleCommand::Hostname(id) => match manager.hostname(id).await {
            Some(hostname) => println!("{}", hostname),
            None => println!("(unavailable)"),
        },
        ConsoleCommand::Players(id) => match manager.player_counts(id).await {
            Some(counts) => println!("{} humans, {} bots", counts.humans, counts.bots),
            None => println!("(unavailable)"),
        },
        ConsoleCommand::Cfg { id, name } => print_outcome(manager.exec_cfg(id, &name).await),
        ConsoleCommand::Plugin { id, action, path } => {
            print_outcome(manager.plugin_command(id, action, &path).await)
        }
        ConsoleCommand::Backups(id) => print_outcome(manager.list_round_backups(id).await),
        ConsoleCommand::Restore { id, round: Some(round) } => {
            print_outcome(manager.restore_round_backup(id, round).await)
        }
        ConsoleCommand::Restore { id, round: None } => {
            match manager.restore_last_round_backup(id).await {
                Some(file) => println!("restored {}", file),
                None => println!("(no backup restored)"),
            }
        }
        ConsoleCommand::Add { host, port, secret } => {
            let record = manager
                .store()
                .insert(NewServer { host, port, secret })
                .await
                .context("failed to store server")?;
            let id = record.id;
            let live = manager.add(record).await;
            component_info!("console", "Added server {} (live: {})", id, live);
        }
        ConsoleCommand::Reconnect(id) => {
            manager.reconnect(id).await?;
            component_info!("console", "Server {} reconnected", id);
        }
        ConsoleCommand::Disconnect(id) => {
            manager.disconnect(id).await?;
            component_info!("console", "Server {} disconnected", id);
        }
        ConsoleCommand::Delete(id) => {
            // Record first, so a concurrent reconnect cannot re-track it
            let existed = manager
                .store()
                .remove(id)
                .await
                .context("failed to remove server")?;
            manager.delete(id).await;
            component_info!("console", "Server {} deleted (stored: {})", id, existed);
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcon_session::{ManagerConfig, TcpConnector};
    use rcon_storage::{MemoryServerStore, ServerRecord, ServerStore};
    use std::sync::Arc;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("   "), Ok(None));
        assert_eq!(parse("servers"), Ok(Some(ConsoleCommand::Servers)));
        assert_eq!(
            parse("exec 3 say  hello world"),
            Ok(Some(ConsoleCommand::Exec {
                id: ServerId(3),
                command: "say  hello world".to_string()
            }))
        );
        assert_eq!(
            parse("plugin 2 Unload \"disabled/RetakesPlugin\""),
            Ok(Some(ConsoleCommand::Plugin {
                id: ServerId(2),
                action: PluginAction::Unload,
                path: "disabled/RetakesPlugin".to_string()
            }))
        );
        assert_eq!(
            parse("add 10.0.0.5 27015 hunter2"),
            Ok(Some(ConsoleCommand::Add {
                host: "10.0.0.5".to_string(),
                port: 27015,
                secret: "hunter2".to_string()
            }))
        );
        assert_eq!(parse("DELETE 4"), Ok(Some(ConsoleCommand::Delete(ServerId(4)))));
        assert_eq!(
            parse("restore 2 7"),
            Ok(Some(ConsoleCommand::Restore { id: ServerId(2), round: Some(7) }))
        );
        assert_eq!(
            parse("restore 2 last"),
            Ok(Some(ConsoleCommand::Restore { id: ServerId(2), round: None }))
        );
        assert_eq!(parse("backups 2"), Ok(Some(ConsoleCommand::Backups(ServerId(2)))));
        assert_eq!(parse("quit"), Ok(Some(ConsoleCommand::Quit)));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse("frobnicate"), Err(ConsoleError::Unknown("frobnicate".to_string())));
        assert_eq!(parse("exec 1"), Err(ConsoleError::Usage("exec <id> <command...>")));
        assert_eq!(parse("hostname abc"), Err(ConsoleError::BadId("abc".to_string())));
        assert_eq!(parse("hostname 0"), Err(ConsoleError::BadId("0".to_string())));
        assert_eq!(parse("add host 99999 pw"), Err(ConsoleError::BadPort("99999".to_string())));
        assert!(matches!(parse("plugin 1 enable foo"), Err(ConsoleError::BadAction(_))));
        assert_eq!(parse("reconnect"), Err(ConsoleError::Usage("reconnect <id>")));
        assert_eq!(parse("restore 1 latest"), Err(ConsoleError::BadRound("latest".to_string())));
        assert_eq!(parse("restore 1"), Err(ConsoleError::Usage("restore <id> <round|last>")));
    }

    #[tokio::test]
    async fn test_run_against_unreachable_servers() {
        let store = Arc::new(MemoryServerStore::with_records([ServerRecord::new(
            ServerId(1),
            "127.0.0.1",
            1,
            "pw",
        )]));
        let manager = SessionManager::new(
            store.clone(),
            Arc::new(TcpConnector::new()),
            ManagerConfig::default(),
        );

        // Unknown ids never touch the network
        run(&manager, ConsoleCommand::Exec { id: ServerId(9), command: "status".to_string() })
            .await
            .unwrap();
        assert!(run(&manager, ConsoleCommand::Reconnect(ServerId(9))).await.is_err());

        run(&manager, ConsoleCommand::Delete(ServerId(1))).await.unwrap();
        assert!(store.list_all().await.unwrap().is_empty());
        assert!(manager.snapshot().await.is_empty());

        // The record is gone, so a reconnect cannot re-track the server
        assert!(run(&manager, ConsoleCommand::Reconnect(ServerId(1))).await.is_err());
        assert!(!manager.is_tracked(ServerId(1)).await);
    }
}
