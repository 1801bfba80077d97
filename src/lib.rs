//! Strictly Chess library - many human games against one shared engine
//!
//! Each session is one game: the human plays white, a single UCI engine
//! process answers for black in every session.
//!
//! # Architecture
//!
//! - **Chess**: move tokens, positions and board views over `shakmaty`
//! - **Session**: game state, history and the concurrent session store
//! - **Engine**: the engine process handle and its FIFO serializer
//! - **Controller**: the turn state machine and engine turn application
//! - **Dispatch / Sweeper**: background workers and stale session removal
//! - **Server**: HTTP routes over the controller
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_chess::{ChessRuntime, ServerConfig, UciLauncher};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::default();
//! let launcher = Arc::new(UciLauncher::from_config(&config));
//! let runtime = ChessRuntime::start(&config, launcher).await;
//!
//! let game = runtime.controller().create_session()?;
//! let view = runtime.controller().submit_move(&game.session_id, "e2e4")?;
//! println!("{}", view.status);
//!
//! runtime.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod chess;
mod config;
mod controller;
mod dispatch;
mod engine;
mod error;
mod runtime;
mod server;
mod session;
mod sweeper;

// Crate-level exports - Chess rules
pub use chess::{
    AppliedMove, BoardView, GameOutcome, GamePosition, GameResult, HUMAN_COLOR, MoveToken,
    PieceView, PositionStatus, SquareView, Termination, ValidatedMove,
};

// Crate-level exports - Configuration
pub use config::{ENGINE_PATH_ENV, ServerConfig};

// Crate-level exports - Errors
pub use error::{ConfigError, EngineError, EngineErrorKind, SessionError};

// Crate-level exports - Sessions
pub use session::{
    Actor, HistoryEntry, HistoryEvent, Session, SessionId, SessionListing, SessionStatus,
    SessionStore, SessionSummary, SessionView, StoreCounts, to_pgn,
};

// Crate-level exports - Engine
pub use engine::{EngineLauncher, EngineSerializer, SearchEngine, UciEngine, UciLauncher};

// Crate-level exports - Control and background tasks
pub use controller::{HealthReport, SessionController};
pub use dispatch::{EngineDispatcher, EngineJob, JobQueue};
pub use runtime::ChessRuntime;
pub use sweeper::ExpirySweeper;

// Crate-level exports - HTTP
pub use server::{ApiError, AppState, MoveRequest, ServiceInfo, router, serve};
