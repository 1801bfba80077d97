//! Concurrent session store.
//!
//! The map lock is held only to find, insert or remove a slot. Each session
//! sits behind its own mutex, so mutations of different sessions never wait
//! on each other while two mutations of the same session are serialized.
//!
//! The map lock is never held while waiting on a slot lock, and code
//! holding a slot lock never touches the map. Removal empties the slot
//! first, so a reader that already cloned it sees the session as gone.

use super::types::{Session, SessionId, SessionStatus, SessionSummary};
use crate::error::SessionError;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// A removed session leaves `None` behind for anyone still holding the slot.
type Slot = Arc<Mutex<Option<Session>>>;

/// Session counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    /// Live sessions.
    pub total: usize,
    /// Sessions waiting for the human.
    pub awaiting_human: usize,
    /// Sessions waiting for the engine.
    pub engine_thinking: usize,
    /// Finished sessions.
    pub finished: usize,
}

/// Point-in-time listing of sessions, newest first. Consumed once.
#[derive(Debug)]
pub struct SessionListing {
    entries: std::vec::IntoIter<SessionSummary>,
}

impl Iterator for SessionListing {
    type Item = SessionSummary;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for SessionListing {}

/// Owns every live session.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Slot>>,
    max_sessions: usize,
    soft_limit: usize,
    next_serial: AtomicU64,
}

impl SessionStore {
    /// Creates an empty store with the given hard and soft caps.
    #[instrument]
    pub fn new(max_sessions: usize, soft_limit: usize) -> Self {
        info!(max_sessions, soft_limit, "Creating session store");
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions,
            soft_limit,
            next_serial: AtomicU64::new(0),
        }
    }

    /// Hard cap on live sessions.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Creates a session in the initial state.
    ///
    /// At the cap, every finished session is evicted, however recent; active
    /// games are never evicted to make room.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ResourceExhausted`] if the store is still full.
    #[instrument(skip(self))]
    pub fn create(&self) -> Result<SessionId, SessionError> {
        if self.len() >= self.max_sessions {
            let evicted = self.evict_where(|s| s.is_finished());
            info!(evicted = evicted.len(), "Session cap reached, evicted finished sessions");
        }

        let mut sessions = self.sessions.write();
        if sessions.len() >= self.max_sessions {
            warn!(max_sessions = self.max_sessions, "Refusing to create session");
            return Err(SessionError::ResourceExhausted(self.max_sessions));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        sessions.insert(id.clone(), Arc::new(Mutex::new(Some(Session::new(id.clone(), serial)))));

        debug!(session_id = %id, live = sessions.len(), "Session inserted");
        Ok(id)
    }

    /// Snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session does not exist.
    #[instrument(skip(self))]
    pub fn get(&self, id: &str) -> Result<Session, SessionError> {
        let slot = self.slot(id)?;
        let guard = slot.lock();
        guard
            .as_ref()
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Applies a state transition under exclusive access to one session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] if the session does not exist, or
    /// whatever the transition returns.
    #[instrument(skip(self, transition))]
    pub fn mutate<R>(
        &self,
        id: &str,
        transition: impl FnOnce(&mut Session) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let slot = self.slot(id)?;
        let mut guard = slot.lock();
        match guard.as_mut() {
            Some(session) => transition(session),
            None => {
                debug!(session_id = id, "Session removed before mutation");
                Err(SessionError::NotFound(id.to_string()))
            }
        }
    }

    /// Deletes a session. Removing an absent session is a no-op.
    #[instrument(skip(self))]
    pub fn remove(&self, id: &str) {
        let removed = self.sessions.write().remove(id);
        match removed {
            Some(slot) => {
                // waits for an in-flight mutation to finish
                slot.lock().take();
                info!(session_id = id, "Session removed");
            }
            None => debug!(session_id = id, "Remove of absent session ignored"),
        }
    }

    /// Summaries of all sessions at this instant, newest first.
    #[instrument(skip(self))]
    pub fn list_all(&self) -> SessionListing {
        let slots: Vec<Slot> = self.sessions.read().values().cloned().collect();

        let mut entries: Vec<(u64, SessionSummary)> = slots
            .iter()
            .filter_map(|slot| {
                let guard = slot.lock();
                guard.as_ref().map(|s| (*s.serial(), s.summary()))
            })
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));

        debug!(count = entries.len(), "Listed sessions");
        SessionListing {
            entries: entries
                .into_iter()
                .map(|(_, summary)| summary)
                .collect::<Vec<_>>()
                .into_iter(),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Session counts by status.
    #[instrument(skip(self))]
    pub fn counts(&self) -> StoreCounts {
        let slots: Vec<Slot> = self.sessions.read().values().cloned().collect();
        let mut counts = StoreCounts::default();
        for slot in slots {
            let guard = slot.lock();
            if let Some(session) = guard.as_ref() {
                counts.total += 1;
                match session.status() {
                    SessionStatus::AwaitingHuman => counts.awaiting_human += 1,
                    SessionStatus::EngineThinking => counts.engine_thinking += 1,
                    SessionStatus::Finished => counts.finished += 1,
                }
            }
        }
        counts
    }

    /// Removes sessions older than `max_age`, and finished sessions when the
    /// store is above its soft limit. Returns the removed identifiers.
    #[instrument(skip(self))]
    pub fn sweep(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<SessionId> {
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        let over_soft_limit = self.len() > self.soft_limit;

        let removed = self.evict_where(|s| {
            let age = now.signed_duration_since(*s.created_at());
            age > max_age || (over_soft_limit && s.is_finished())
        });

        info!(
            removed = removed.len(),
            remaining = self.len(),
            over_soft_limit,
            "Sweep complete"
        );
        removed
    }

    fn slot(&self, id: &str) -> Result<Slot, SessionError> {
        self.sessions.read().get(id).cloned().ok_or_else(|| {
            debug!(session_id = id, "Session not found");
            SessionError::NotFound(id.to_string())
        })
    }

    /// Removes every session matching `predicate`. Each slot is emptied
    /// under its own lock, so a session is never removed in the middle of a
    /// mutation; the map lock is only taken afterwards to drop the entries.
    fn evict_where(&self, predicate: impl Fn(&Session) -> bool) -> Vec<SessionId> {
        let slots: Vec<(SessionId, Slot)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();

        let mut removed = Vec::new();
        for (id, slot) in slots {
            let mut guard = slot.lock();
            if guard.as_ref().is_some_and(|s| predicate(s)) {
                guard.take();
                removed.push(id);
            }
        }

        if !removed.is_empty() {
            let mut sessions = self.sessions.write();
            for id in &removed {
                sessions.remove(id);
            }
        }
        removed
    }
}
