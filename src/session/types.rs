//! Session aggregate and its history.

use crate::chess::{AppliedMove, BoardView, GameOutcome, GamePosition, GameResult, MoveToken, Termination};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Unique identifier for a game session.
pub type SessionId = String;

/// Turn state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    /// White (the human) is to move.
    AwaitingHuman,
    /// A search for black's reply is queued or running.
    EngineThinking,
    /// The game is over; position and history are frozen.
    Finished,
}

/// Who produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Actor {
    /// The human player.
    Human,
    /// The search engine.
    Engine,
    /// The server itself.
    System,
}

/// What a history entry records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEvent {
    /// A move was played.
    Move {
        /// Canonical move token.
        token: MoveToken,
    },
    /// The human resigned.
    Resignation,
    /// The engine produced no usable reply; the human's pending move, if
    /// any, was taken back.
    EngineFailure {
        /// Failure description.
        reason: String,
        /// Move removed from the position.
        taken_back: Option<MoveToken>,
    },
}

/// One append-only history record.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct HistoryEntry {
    actor: Actor,
    event: HistoryEvent,
    notation: String,
    timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    fn now(actor: Actor, event: HistoryEvent, notation: String) -> Self {
        Self {
            actor,
            event,
            notation,
            timestamp: Utc::now(),
        }
    }

    /// Token of the recorded move, if this entry is a move.
    pub fn move_token(&self) -> Option<&MoveToken> {
        match &self.event {
            HistoryEvent::Move { token } => Some(token),
            _ => None,
        }
    }

    /// Whether this entry undid a move.
    pub fn is_take_back(&self) -> bool {
        matches!(
            self.event,
            HistoryEvent::EngineFailure {
                taken_back: Some(_),
                ..
            }
        )
    }
}

/// One game against the engine.
#[derive(Debug, Clone, Getters)]
pub struct Session {
    id: SessionId,
    #[getter(skip)]
    position: GamePosition,
    history: Vec<HistoryEntry>,
    created_at: DateTime<Utc>,
    status: SessionStatus,
    outcome: Option<GameOutcome>,
    /// Bumped on reset so results computed for an earlier game are dropped.
    generation: u64,
    /// Store-assigned creation order.
    serial: u64,
    /// An engine job for this session sits in the queue or is running.
    engine_job_queued: bool,
}

impl Session {
    /// Creates a session in the initial state.
    #[instrument]
    pub fn new(id: SessionId, serial: u64) -> Self {
        info!(session_id = %id, "Creating new game session");
        Self {
            id,
            position: GamePosition::new(),
            history: Vec::new(),
            created_at: Utc::now(),
            status: SessionStatus::AwaitingHuman,
            outcome: None,
            generation: 0,
            serial,
            engine_job_queued: false,
        }
    }

    /// Current position.
    pub fn position(&self) -> &GamePosition {
        &self.position
    }

    /// Final score, once finished.
    pub fn result(&self) -> Option<GameResult> {
        self.outcome.map(|o| o.result)
    }

    /// Whether the game is over.
    pub fn is_finished(&self) -> bool {
        self.status == SessionStatus::Finished
    }

    /// Plies currently on the board: move entries minus take-backs.
    pub fn effective_plies(&self) -> usize {
        let moves = self.history.iter().filter(|e| e.move_token().is_some()).count();
        let take_backs = self.history.iter().filter(|e| e.is_take_back()).count();
        moves - take_backs
    }

    /// Board view of the current position. Legal moves are listed only
    /// while the human may submit one.
    pub fn board_view(&self) -> BoardView {
        let mut board = BoardView::render(&self.position, self.result());
        if self.status != SessionStatus::AwaitingHuman {
            board.legal_moves.clear();
        }
        board
    }

    /// Summary for listings.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id.clone(),
            created_at: self.created_at,
            move_count: self.position.ply(),
            status: self.status,
            result: self.result(),
        }
    }

    /// Full client-facing state.
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            status: self.status,
            board: self.board_view(),
            history: self.history.clone(),
            human_to_move: self.status == SessionStatus::AwaitingHuman,
            move_count: self.position.ply(),
            result: self.result(),
            termination: self.outcome.map(|o| o.termination),
            created_at: self.created_at,
        }
    }

    pub(crate) fn position_mut(&mut self) -> &mut GamePosition {
        &mut self.position
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        debug!(session_id = %self.id, from = %self.status, to = %status, "Status transition");
        self.status = status;
    }

    /// Marks an engine job as outstanding. Returns `false` if one already
    /// was; that job serves the session's latest turn instead.
    pub(crate) fn claim_engine_job(&mut self) -> bool {
        !std::mem::replace(&mut self.engine_job_queued, true)
    }

    pub(crate) fn release_engine_job(&mut self) {
        self.engine_job_queued = false;
    }

    pub(crate) fn record_move(&mut self, actor: Actor, applied: &AppliedMove) {
        self.history.push(HistoryEntry::now(
            actor,
            HistoryEvent::Move {
                token: applied.token.clone(),
            },
            applied.san.clone(),
        ));
    }

    pub(crate) fn record_event(&mut self, event: HistoryEvent, notation: impl Into<String>) {
        self.history
            .push(HistoryEntry::now(Actor::System, event, notation.into()));
    }

    pub(crate) fn finish(&mut self, outcome: GameOutcome) {
        info!(
            session_id = %self.id,
            result = %outcome.result,
            termination = %outcome.termination,
            "Game finished"
        );
        self.outcome = Some(outcome);
        self.set_status(SessionStatus::Finished);
    }

    /// Back to the initial state under the same identifier. An outstanding
    /// engine job stays claimed and picks up the new game if it reaches
    /// `engine_thinking` again.
    pub(crate) fn reset(&mut self) {
        info!(session_id = %self.id, previous_status = %self.status, "Resetting session");
        self.position = GamePosition::new();
        self.history.clear();
        self.status = SessionStatus::AwaitingHuman;
        self.outcome = None;
        self.generation += 1;
    }
}

/// Listing entry for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: SessionId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Plies on the board.
    pub move_count: usize,
    /// Turn state.
    pub status: SessionStatus,
    /// Final score, once finished.
    pub result: Option<GameResult>,
}

/// Client-facing snapshot of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    /// Session identifier.
    pub session_id: SessionId,
    /// Turn state.
    pub status: SessionStatus,
    /// Board snapshot.
    pub board: BoardView,
    /// Ordered history.
    pub history: Vec<HistoryEntry>,
    /// The human may submit a move now.
    pub human_to_move: bool,
    /// Plies on the board.
    pub move_count: usize,
    /// Final score, once finished.
    pub result: Option<GameResult>,
    /// How the game ended, once finished.
    pub termination: Option<Termination>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
