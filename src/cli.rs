//! Command-line interface for strictly_chess.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strictly Chess - play chess against a shared UCI engine
#[derive(Parser, Debug)]
#[command(name = "strictly_chess")]
#[command(about = "Multi-session chess server backed by one UCI engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Serve {
        /// Path to the TOML config file
        #[arg(short, long, default_value = "strictly_chess.toml")]
        config: PathBuf,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Engine executable (overrides config and STOCKFISH_PATH)
        #[arg(long)]
        engine_path: Option<String>,
    },

    /// Play one game in the terminal
    Play {
        /// Path to the TOML config file
        #[arg(short, long, default_value = "strictly_chess.toml")]
        config: PathBuf,

        /// Engine executable (overrides config and STOCKFISH_PATH)
        #[arg(long)]
        engine_path: Option<String>,

        /// Write the finished game as PGN to this file
        #[arg(long)]
        pgn_out: Option<PathBuf>,
    },
}
