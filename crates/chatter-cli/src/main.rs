//! # chatter
//!
//! Interactive terminal client for the Chatter sync engine.
//!
//! Several users can be signed in at once against the same store, which
//! makes it easy to watch a message travel from one inbox to the other.
//! Type `help` at the prompt for the command list.

mod app;
mod commands;
mod config;

use std::io::Write as _;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chatter_shared::constants::APP_NAME;
use chatter_store::{DocumentStore, MemoryStore, SqliteStore};

use crate::app::{App, Flow};
use crate::commands::Command;
use crate::config::{CliConfig, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they do not interleave with the conversation.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting {APP_NAME} v{}", env!("CARGO_PKG_VERSION"));

    let config = CliConfig::from_env();
    info!(?config, "Loaded configuration");

    let store = open_store(&config)?;
    let mut app = App::new(store, config.core_config());

    println!("{APP_NAME} {}: type `help` for commands", env!("CARGO_PKG_VERSION"));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", app.prompt());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match Command::parse(&line) {
            Ok(command) => {
                if app.handle(command).await == Flow::Quit {
                    break;
                }
            }
            Err(usage) => println!("! {usage}"),
        }
    }

    app.shutdown().await;
    info!("Bye");
    Ok(())
}

fn open_store(config: &CliConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if config.in_memory {
        info!("Using in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = match &config.db_path {
        Some(path) => SqliteStore::open_at(path)?,
        None => SqliteStore::open_default()?,
    };
    if let Some(path) = store.path() {
        info!(path = %path.display(), "Opened database");
    }
    Ok(Arc::new(store))
}
