//! PGN export of a session's game.

use super::types::Session;
use tracing::instrument;

const LINE_WIDTH: usize = 79;

/// Renders the game as PGN with the seven-tag roster.
///
/// Movetext uses the moves currently on the board, so a move taken back
/// after an engine failure does not appear. Unfinished games get `*`.
#[instrument(skip(session), fields(session_id = %session.id()))]
pub fn to_pgn(session: &Session) -> String {
    let result = session
        .result()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "*".to_string());

    let mut out = String::new();
    for (tag, value) in [
        ("Event", "Human vs Engine".to_string()),
        ("Site", "strictly_chess".to_string()),
        ("Date", session.created_at().format("%Y.%m.%d").to_string()),
        ("Round", "-".to_string()),
        ("White", "Human".to_string()),
        ("Black", "Engine".to_string()),
        ("Result", result.clone()),
    ] {
        out.push_str(&format!("[{} \"{}\"]\n", tag, value));
    }
    if let Some(outcome) = session.outcome() {
        out.push_str(&format!("[Termination \"{}\"]\n", outcome.termination));
    }
    out.push('\n');

    let mut words = Vec::new();
    for (ply, applied) in session.position().played().iter().enumerate() {
        if ply % 2 == 0 {
            words.push(format!("{}.", ply / 2 + 1));
        }
        words.push(applied.san.clone());
    }
    words.push(result);

    let mut line = String::new();
    for word in words {
        if !line.is_empty() && line.len() + 1 + word.len() > LINE_WIDTH {
            out.push_str(&line);
            out.push('\n');
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&word);
    }
    out.push_str(&line);
    out.push('\n');
    out
}
