//! Strictly Chess - Unified CLI
//!
//! Runs the HTTP game server or a single terminal game.

#![warn(missing_docs)]

mod cli;
mod terminal;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use std::path::PathBuf;
use std::sync::Arc;
use strictly_chess::{ChessRuntime, ServerConfig, UciLauncher, serve};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,strictly_chess=debug")),
        )
        .init();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            engine_path,
        } => run_server(config, host, port, engine_path).await,
        Command::Play {
            config,
            engine_path,
            pgn_out,
        } => run_terminal(config, engine_path, pgn_out).await,
    }
}

fn load_config(path: PathBuf, engine_path: Option<String>) -> Result<ServerConfig> {
    let mut config = ServerConfig::load(path)?;
    if let Some(engine_path) = engine_path {
        config = config.with_engine_path(engine_path);
    }
    Ok(config)
}

/// Run the HTTP game server until Ctrl-C
#[instrument]
async fn run_server(
    config_path: PathBuf,
    host: Option<String>,
    port: Option<u16>,
    engine_path: Option<String>,
) -> Result<()> {
    let mut config = load_config(config_path, engine_path)?;
    if host.is_some() || port.is_some() {
        let host = host.unwrap_or_else(|| config.host().clone());
        let port = port.unwrap_or(*config.port());
        config = config.with_bind(host, port);
    }

    info!(engine = %config.engine_path(), "Starting Strictly Chess server");

    let launcher = Arc::new(UciLauncher::from_config(&config));
    let runtime = ChessRuntime::start(&config, launcher).await;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
        }
        info!("Shutdown signal received");
    };

    let served = serve(
        Arc::clone(runtime.controller()),
        config.host(),
        *config.port(),
        shutdown,
    )
    .await;

    runtime.shutdown().await;
    served
}

/// Play one game in the terminal
#[instrument]
async fn run_terminal(
    config_path: PathBuf,
    engine_path: Option<String>,
    pgn_out: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path, engine_path)?.with_engine_reply_delay_ms(0);

    let launcher = Arc::new(UciLauncher::from_config(&config));
    let runtime = ChessRuntime::start(&config, launcher).await;

    let played = terminal::play(Arc::clone(runtime.controller()), pgn_out).await;

    runtime.shutdown().await;
    played
}
