//! Error taxonomy for session commands and the engine handle.

use derive_more::{Display, Error};
use tracing::{error, instrument};

/// Errors reported by session commands.
///
/// Validation variants (`NotFound`, `MalformedMove`, `IllegalMove`,
/// `InvalidState`) are recoverable by the caller and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SessionError {
    /// No session with this identifier exists.
    #[display("Session {} not found", _0)]
    NotFound(String),

    /// The move token is not a well-formed coordinate move.
    #[display("Malformed move '{}': use coordinate notation such as e2e4 or e7e8q", _0)]
    MalformedMove(String),

    /// The move is well formed but not legal in the current position.
    #[display("Illegal move '{}'", token)]
    IllegalMove {
        /// The rejected token, canonicalized.
        token: String,
        /// Every legal move token in the current position.
        legal_moves: Vec<String>,
    },

    /// The command is not valid for the session's current status.
    #[display("{}", _0)]
    InvalidState(String),

    /// The live session cap has been reached.
    #[display("Session limit of {} reached", _0)]
    ResourceExhausted(usize),

    /// The engine handle could not be (re)initialized.
    #[display("Engine unavailable: {}", _0)]
    EngineUnavailable(String),

    /// A search failed after a valid request was issued.
    #[display("Engine failure: {}", _0)]
    EngineFailure(String),

    /// Unexpected internal condition; details are logged, not reported.
    #[display("Internal error: {}", _0)]
    Internal(String),
}

impl std::error::Error for SessionError {}

impl SessionError {
    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::NotFound(_) => "not_found",
            SessionError::MalformedMove(_) => "malformed_move",
            SessionError::IllegalMove { .. } => "illegal_move",
            SessionError::InvalidState(_) => "invalid_state",
            SessionError::ResourceExhausted(_) => "resource_exhausted",
            SessionError::EngineUnavailable(_) => "engine_unavailable",
            SessionError::EngineFailure(_) => "engine_failure",
            SessionError::Internal(_) => "internal",
        }
    }
}

/// Classification of an engine handle failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum EngineErrorKind {
    /// The handle could not be started or restarted.
    #[display("unavailable")]
    Unavailable,
    /// The process died, stalled or broke protocol during a search.
    #[display("failure")]
    Failure,
}

/// Engine handle error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Engine {}: {} at {}:{}", kind, message, file, line)]
pub struct EngineError {
    /// Failure classification.
    pub kind: EngineErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl EngineError {
    /// Creates an error for a handle that cannot be started.
    #[track_caller]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::with_kind(EngineErrorKind::Unavailable, message.into())
    }

    /// Creates an error for a search that broke down.
    #[track_caller]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::with_kind(EngineErrorKind::Failure, message.into())
    }

    #[track_caller]
    fn with_kind(kind: EngineErrorKind, message: String) -> Self {
        let loc = std::panic::Location::caller();
        error!(%kind, error_message = %message, "Engine error created");
        Self {
            kind,
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err.kind {
            EngineErrorKind::Unavailable => SessionError::EngineUnavailable(err.message),
            EngineErrorKind::Failure => SessionError::EngineFailure(err.message),
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}
