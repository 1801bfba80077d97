//! Turn state machine over the session store.
//!
//! A human move is applied synchronously and the caller gets the updated
//! view back at once. If the engine must reply, the session moves to
//! `engine_thinking` and a job goes to the worker pool; the worker applies
//! the engine's move later under the same per-session exclusivity.

use crate::chess::{GameOutcome, GamePosition, GameResult, HUMAN_COLOR, MoveToken, Termination};
use crate::dispatch::{EngineDispatcher, EngineJob};
use crate::engine::EngineSerializer;
use crate::error::{EngineError, SessionError};
use crate::session::{
    Actor, HistoryEvent, Session, SessionListing, SessionStatus, SessionStore, SessionView,
    StoreCounts, to_pgn,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Engine availability and session counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Whether the engine handle is up.
    pub engine_available: bool,
    /// Engine being launched.
    pub engine: String,
    /// Searches that returned a result.
    pub searches_completed: u64,
    /// Searches that failed.
    pub search_failures: u64,
    /// Live sessions by status.
    pub sessions: StoreCounts,
    /// Hard session cap.
    pub max_sessions: usize,
}

/// Applies commands to sessions and runs engine turns.
#[derive(Debug)]
pub struct SessionController {
    store: Arc<SessionStore>,
    engine: Arc<EngineSerializer>,
    dispatcher: EngineDispatcher,
    reply_delay: Duration,
}

impl SessionController {
    /// Wires the controller to its store, engine and job queue.
    #[instrument(skip(store, engine, dispatcher))]
    pub fn new(
        store: Arc<SessionStore>,
        engine: Arc<EngineSerializer>,
        dispatcher: EngineDispatcher,
        reply_delay: Duration,
    ) -> Self {
        info!("Creating session controller");
        Self {
            store,
            engine,
            dispatcher,
            reply_delay,
        }
    }

    /// The session store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// The engine serializer.
    pub fn engine(&self) -> &Arc<EngineSerializer> {
        &self.engine
    }

    /// Starts a new game and returns its initial view.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ResourceExhausted`] at the session cap.
    #[instrument(skip(self))]
    pub fn create_session(&self) -> Result<SessionView, SessionError> {
        let id = self.store.create()?;
        info!(session_id = %id, "Game created");
        Ok(self.store.get(&id)?.view())
    }

    /// Current state of a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for an unknown session.
    #[instrument(skip(self))]
    pub fn get_state(&self, session_id: &str) -> Result<SessionView, SessionError> {
        Ok(self.store.get(session_id)?.view())
    }

    /// Moves the human may submit right now; empty unless the session is
    /// awaiting the human.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for an unknown session.
    #[instrument(skip(self))]
    pub fn list_legal_moves(&self, session_id: &str) -> Result<Vec<MoveToken>, SessionError> {
        let session = self.store.get(session_id)?;
        if *session.status() == SessionStatus::AwaitingHuman {
            Ok(session.position().legal_moves())
        } else {
            Ok(Vec::new())
        }
    }

    /// Plays the human's move.
    ///
    /// Returns the updated view. Its status is `engine_thinking` if the
    /// engine now owes a reply, or `finished` if the move ended the game.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotFound`] for an unknown session.
    /// - [`SessionError::InvalidState`] if the game is over or the engine is
    ///   thinking, whatever the token.
    /// - [`SessionError::MalformedMove`] or [`SessionError::IllegalMove`].
    /// - [`SessionError::EngineUnavailable`] if the engine turn could not be
    ///   queued; the move has been taken back.
    #[instrument(skip(self))]
    pub fn submit_move(&self, session_id: &str, raw: &str) -> Result<SessionView, SessionError> {
        let (view, job) = self.store.mutate(session_id, |session| {
            match session.status() {
                SessionStatus::Finished => {
                    return Err(SessionError::InvalidState(
                        "Game is over; no further moves are accepted".to_string(),
                    ));
                }
                SessionStatus::EngineThinking => {
                    return Err(SessionError::InvalidState(
                        "Not your turn: the engine is thinking".to_string(),
                    ));
                }
                SessionStatus::AwaitingHuman => {}
            }

            let token = MoveToken::parse(raw)?;
            let validated = session.position().validate(&token)?;
            let applied = session.position_mut().apply(validated);
            session.record_move(Actor::Human, &applied);
            info!(token = %applied.token, san = %applied.san, "Human move applied");

            let job = match session.position().terminal_outcome() {
                Some(outcome) => {
                    session.finish(outcome);
                    None
                }
                None => {
                    session.set_status(SessionStatus::EngineThinking);
                    // an outstanding job from before a reset serves this turn
                    session.claim_engine_job().then(|| EngineJob {
                        session_id: session.id().clone(),
                        generation: *session.generation(),
                    })
                }
            };
            Ok((session.view(), job))
        })?;

        let Some(job) = job else {
            return Ok(view);
        };

        if let Err(e) = self.dispatcher.enqueue(job) {
            // the claim covered any turn requested since, so none is left waiting
            self.store.mutate(session_id, |session| {
                session.release_engine_job();
                if *session.status() == SessionStatus::EngineThinking {
                    revert_engine_turn(session, e.to_string());
                }
                Ok(())
            })?;
            return Err(e);
        }

        Ok(view)
    }

    /// The human resigns. Allowed while the engine is thinking; its reply
    /// is then discarded.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotFound`] for an unknown session.
    /// - [`SessionError::InvalidState`] if the game is already over.
    #[instrument(skip(self))]
    pub fn resign(&self, session_id: &str) -> Result<SessionView, SessionError> {
        self.store.mutate(session_id, |session| {
            if session.is_finished() {
                return Err(SessionError::InvalidState(
                    "Game is over; cannot resign".to_string(),
                ));
            }
            session.record_event(HistoryEvent::Resignation, "White resigns");
            session.finish(GameOutcome {
                result: GameResult::won_by(HUMAN_COLOR.other()),
                termination: Termination::Resignation,
            });
            Ok(session.view())
        })
    }

    /// Restarts the game under the same identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for an unknown session.
    #[instrument(skip(self))]
    pub fn reset(&self, session_id: &str) -> Result<SessionView, SessionError> {
        self.store.mutate(session_id, |session| {
            session.reset();
            Ok(session.view())
        })
    }

    /// Removes a session. Deleting an unknown session succeeds.
    #[instrument(skip(self))]
    pub fn delete(&self, session_id: &str) {
        self.store.remove(session_id);
    }

    /// Summaries of all sessions, newest first.
    #[instrument(skip(self))]
    pub fn list_sessions(&self) -> SessionListing {
        self.store.list_all()
    }

    /// The game as PGN.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for an unknown session.
    #[instrument(skip(self))]
    pub fn export_pgn(&self, session_id: &str) -> Result<String, SessionError> {
        Ok(to_pgn(&self.store.get(session_id)?))
    }

    /// Engine availability and session counts.
    #[instrument(skip(self))]
    pub fn health(&self) -> HealthReport {
        HealthReport {
            engine_available: self.engine.is_available(),
            engine: self.engine.describe(),
            searches_completed: self.engine.searches_completed(),
            search_failures: self.engine.search_failures(),
            sessions: self.store.counts(),
            max_sessions: self.store.max_sessions(),
        }
    }

    /// Replaces the engine handle with a fresh one.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::EngineUnavailable`] if the engine cannot start.
    #[instrument(skip(self))]
    pub async fn restart_engine(&self) -> Result<(), SessionError> {
        self.engine.restart().await?;
        info!("Engine restarted on request");
        Ok(())
    }

    /// Computes and applies the engine's reply for one queued job.
    ///
    /// The search runs without holding the session. A reply is applied only
    /// if the session is still in the game it was computed for. If the
    /// session was reset and is thinking again by then, the job searches
    /// the new position; a session never has two jobs outstanding.
    #[instrument(skip(self), fields(session_id = %job.session_id, generation = job.generation))]
    pub async fn run_engine_turn(&self, job: EngineJob) {
        if self.pending_turn(&job.session_id).is_none() {
            return;
        }
        if !self.reply_delay.is_zero() {
            tokio::time::sleep(self.reply_delay).await;
        }

        loop {
            let Some((generation, position)) = self.pending_turn(&job.session_id) else {
                return;
            };

            let reply = self.engine.request_move(&position).await;

            let step = self.store.mutate(&job.session_id, |session| {
                Ok(apply_engine_reply(session, generation, reply))
            });
            match step {
                Ok(TurnStep::Done) => return,
                Ok(TurnStep::Again) => debug!("Session was reset during search, searching again"),
                Err(e) => {
                    debug!(error = %e, "Session removed during engine turn");
                    return;
                }
            }
        }
    }

    /// Generation and position the engine owes a reply for. Releases the
    /// session's job claim and returns `None` if no reply is wanted.
    fn pending_turn(&self, session_id: &str) -> Option<(u64, GamePosition)> {
        let pending = self.store.mutate(session_id, |session| {
            if *session.status() == SessionStatus::EngineThinking {
                Ok(Some((*session.generation(), session.position().clone())))
            } else {
                session.release_engine_job();
                Ok(None)
            }
        });
        match pending {
            Ok(Some(turn)) => Some(turn),
            Ok(None) => {
                debug!("Engine turn no longer wanted");
                None
            }
            Err(_) => {
                debug!("Session removed before engine turn");
                None
            }
        }
    }
}

enum TurnStep {
    Done,
    Again,
}

fn apply_engine_reply(
    session: &mut Session,
    generation: u64,
    reply: Result<Option<String>, EngineError>,
) -> TurnStep {
    if *session.status() != SessionStatus::EngineThinking {
        debug!("Dropping engine reply, session no longer thinking");
        session.release_engine_job();
        return TurnStep::Done;
    }
    if *session.generation() != generation {
        return TurnStep::Again;
    }
    session.release_engine_job();

    let reason = match reply {
        Ok(Some(raw)) => match MoveToken::parse(&raw).and_then(|t| session.position().validate(&t)) {
            Ok(validated) => {
                let applied = session.position_mut().apply(validated);
                session.record_move(Actor::Engine, &applied);
                info!(token = %applied.token, san = %applied.san, "Engine move applied");
                match session.position().terminal_outcome() {
                    Some(outcome) => session.finish(outcome),
                    None => session.set_status(SessionStatus::AwaitingHuman),
                }
                return TurnStep::Done;
            }
            Err(e) => format!("engine proposed unusable move '{}': {}", raw, e),
        },
        Ok(None) => "engine reported no move".to_string(),
        Err(e) => e.message,
    };

    revert_engine_turn(session, reason);
    TurnStep::Done
}

/// Hands the turn back to the human after the engine failed to reply,
/// taking back the human's pending move.
fn revert_engine_turn(session: &mut Session, reason: String) {
    let taken_back = if session.position().is_human_to_move() {
        None
    } else {
        session.position_mut().undo_last().map(|m| m.token)
    };

    warn!(
        session_id = %session.id(),
        reason = %reason,
        taken_back = ?taken_back,
        "Engine turn failed, returning turn to human"
    );

    let notation = match &taken_back {
        Some(token) => format!("Engine failed ({}); {} taken back", reason, token),
        None => format!("Engine failed ({})", reason),
    };
    session.record_event(HistoryEvent::EngineFailure { reason, taken_back }, notation);
    session.set_status(SessionStatus::AwaitingHuman);
}
