//! Search engine handle and exclusive access to it.

mod serializer;
mod uci;

pub use serializer::EngineSerializer;
pub use uci::{UciEngine, UciLauncher};

use crate::chess::GamePosition;
use crate::error::EngineError;
use async_trait::async_trait;
use std::time::Duration;

/// A live handle to one engine process. Accepts one search at a time.
#[async_trait]
pub trait SearchEngine: Send {
    /// Searches the position for at most `time_limit` and returns the
    /// engine's move token, or `None` if it reports no move.
    async fn compute_move(
        &mut self,
        position: &GamePosition,
        time_limit: Duration,
    ) -> Result<Option<String>, EngineError>;

    /// Stops the engine process.
    async fn shutdown(&mut self);
}

/// Starts engine handles, initially and after a failure.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Starts a fresh handle.
    async fn launch(&self) -> Result<Box<dyn SearchEngine>, EngineError>;

    /// Human-readable description of what gets launched.
    fn describe(&self) -> String;
}
