//! Game sessions and the store that owns them.

mod pgn;
mod store;
mod types;

pub use pgn::to_pgn;
pub use store::{SessionListing, SessionStore, StoreCounts};
pub use types::{
    Actor, HistoryEntry, HistoryEvent, Session, SessionId, SessionStatus, SessionSummary,
    SessionView,
};
