//! Game server control panel binary.
//!
//! Loads server records, keeps a supervised RCON session per server and
//! exposes an operator console on stdin until Ctrl-C or `quit`.

use clap::Parser;
use rcon_session::{SessionManager, TcpConnector};
use rcon_storage::{open_store, ServerStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod logging;

use config::PanelConfig;
use console::ConsoleCommand;
use logging::PanelLogFormatter;

/// Supervised RCON sessions for a fleet of game servers
#[derive(Parser, Debug)]
#[command(name = "rcon-panel", version, about = "Supervised RCON sessions with heartbeat and reconnect")]
struct Args {
    /// Configuration file path
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// JSON file with server records (overrides the config file)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Keep server records in memory only
    #[arg(long, conflicts_with = "store")]
    memory_store: bool,

    /// Command response timeout, e.g. 2s or 1500ms
    #[arg(long)]
    command_timeout: Option<humantime::Duration>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::new("warn")
        .add_directive(format!("rcon_panel={}", args.log_level).parse()?)
        .add_directive(format!("rcon_session={}", args.log_level).parse()?)
        .add_directive(format!("rcon_storage={}", args.log_level).parse()?)
        .add_directive(format!("rcon_wire={}", args.log_level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .event_format(PanelLogFormatter::new("rcon"))
        .init();

    info!("Starting RCON panel v{}", env!("CARGO_PKG_VERSION"));

    let mut panel_config = PanelConfig::load_from_file(&args.config)?;
    if let Some(path) = args.store {
        panel_config.store_path = Some(path);
    }
    if args.memory_store {
        panel_config.store_path = None;
    }
    if let Some(command_timeout) = args.command_timeout {
        let command_timeout: Duration = command_timeout.into();
        panel_config.command_timeout_ms = u64::try_from(command_timeout.as_millis()).unwrap_or(u64::MAX);
    }

    let store: Arc<dyn ServerStore> = Arc::from(open_store(panel_config.store_mode()).await?);
    let connector = Arc::new(TcpConnector::new().with_max_packet_size(panel_config.max_packet_size));
    let manager = SessionManager::new(store, connector, panel_config.manager_config());

    let live = manager.init_all().await;
    component_info!("console", "{} server(s) live, type 'help' for commands", live);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match console::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(e) = console::run(&manager, command).await {
                            component_error!("console", "{:#}", e);
                        }
                    }
                    Err(e) => component_warn!("console", "{}", e),
                },
                Ok(None) => {
                    info!("Console input closed, running until Ctrl-C");
                    tokio::signal::ctrl_c().await?;
                    break;
                }
                Err(e) => {
                    warn!("Failed to read console input: {}", e);
                    break;
                }
            }
        }
    }

    manager.shutdown().await;
    info!("RCON panel stopped");
    Ok(())
}
