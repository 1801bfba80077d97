//! Board state wrapper over the rules engine.

use super::token::MoveToken;
use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position, Square};
use tracing::{debug, instrument, warn};

/// Color the human always plays.
pub const HUMAN_COLOR: Color = Color::White;

/// Final score of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum GameResult {
    /// White won.
    #[serde(rename = "1-0")]
    #[strum(serialize = "1-0")]
    WhiteWins,
    /// Black won.
    #[serde(rename = "0-1")]
    #[strum(serialize = "0-1")]
    BlackWins,
    /// Drawn game.
    #[serde(rename = "1/2-1/2")]
    #[strum(serialize = "1/2-1/2")]
    Draw,
}

impl GameResult {
    /// Result for a game the given color won.
    pub fn won_by(color: Color) -> Self {
        match color {
            Color::White => GameResult::WhiteWins,
            Color::Black => GameResult::BlackWins,
        }
    }
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Termination {
    /// Side to move is mated.
    Checkmate,
    /// Side to move has no legal move and is not in check.
    Stalemate,
    /// Neither side can mate.
    InsufficientMaterial,
    /// 75 moves without capture or pawn move.
    SeventyfiveMoves,
    /// Same position five times.
    FivefoldRepetition,
    /// The human resigned.
    Resignation,
}

/// Result plus the reason the game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOutcome {
    /// Final score.
    pub result: GameResult,
    /// How the game ended.
    pub termination: Termination,
}

/// Check and draw flags of a position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionStatus {
    /// Side to move is in check.
    pub check: bool,
    /// Side to move is mated.
    pub checkmate: bool,
    /// Side to move is stalemated.
    pub stalemate: bool,
    /// Neither side has mating material.
    pub insufficient_material: bool,
    /// Fifty-move rule can be claimed.
    pub fifty_move_rule: bool,
    /// The current position occurred at least three times.
    pub threefold_repetition: bool,
}

impl PositionStatus {
    /// Any draw condition, claimable or automatic.
    pub fn is_draw(&self) -> bool {
        self.stalemate || self.insufficient_material || self.fifty_move_rule || self.threefold_repetition
    }
}

/// A move checked against a specific position. Only [`GamePosition::validate`]
/// creates these, so an unvalidated move can never be applied.
#[derive(Debug, Clone)]
pub struct ValidatedMove {
    token: MoveToken,
    mv: Move,
}

impl ValidatedMove {
    /// Canonical token of the move.
    pub fn token(&self) -> &MoveToken {
        &self.token
    }
}

/// A move that has been played, with its notation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMove {
    /// Canonical coordinate token.
    pub token: MoveToken,
    /// Standard algebraic notation including check suffix.
    pub san: String,
}

/// Current board state of one game, always started from the standard
/// initial position.
#[derive(Debug, Clone)]
pub struct GamePosition {
    chess: Chess,
    played: Vec<AppliedMove>,
    repetition_keys: Vec<Zobrist64>,
}

impl Default for GamePosition {
    fn default() -> Self {
        Self::new()
    }
}

impl GamePosition {
    /// Standard starting position.
    pub fn new() -> Self {
        let chess = Chess::default();
        let start_key = repetition_key(&chess);
        Self {
            chess,
            played: Vec::new(),
            repetition_keys: vec![start_key],
        }
    }

    /// Rebuilds a position by replaying tokens from the start.
    #[instrument(skip(tokens))]
    pub fn replay<'a>(tokens: impl IntoIterator<Item = &'a MoveToken>) -> Result<Self, SessionError> {
        let mut position = Self::new();
        for token in tokens {
            let validated = position.validate(token)?;
            position.apply(validated);
        }
        Ok(position)
    }

    /// Moves played so far, oldest first.
    pub fn played(&self) -> &[AppliedMove] {
        &self.played
    }

    /// Number of half-moves played.
    pub fn ply(&self) -> usize {
        self.played.len()
    }

    /// Color to move.
    pub fn side_to_move(&self) -> Color {
        self.chess.turn()
    }

    /// Whether the human is to move.
    pub fn is_human_to_move(&self) -> bool {
        self.chess.turn() == HUMAN_COLOR
    }

    /// Every legal move in canonical token form.
    pub fn legal_moves(&self) -> Vec<MoveToken> {
        self.chess
            .legal_moves()
            .iter()
            .filter_map(|m| canonical_token(m))
            .collect()
    }

    /// Legal moves as plain strings.
    pub fn legal_move_strings(&self) -> Vec<String> {
        self.legal_moves().into_iter().map(String::from).collect()
    }

    /// Checks a token against the current position.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::IllegalMove`] carrying the full legal move set
    /// if the token does not name a legal move.
    #[instrument(skip(self), fields(token = %token))]
    pub fn validate(&self, token: &MoveToken) -> Result<ValidatedMove, SessionError> {
        let uci = UciMove::from_ascii(token.as_str().as_bytes())
            .map_err(|_| SessionError::MalformedMove(token.to_string()))?;

        let mv = uci.to_move(&self.chess).map_err(|_| {
            debug!("Move is not legal in current position");
            SessionError::IllegalMove {
                token: token.to_string(),
                legal_moves: self.legal_move_strings(),
            }
        })?;

        // castling may be given king-takes-rook; store the king-two-squares form
        let canonical = canonical_token(&mv).unwrap_or_else(|| token.clone());
        Ok(ValidatedMove { token: canonical, mv })
    }

    /// Plays a validated move and returns its notation.
    #[instrument(skip(self, validated), fields(token = %validated.token))]
    pub fn apply(&mut self, validated: ValidatedMove) -> AppliedMove {
        let san = San::from_move(&self.chess, &validated.mv).to_string();
        self.chess.play_unchecked(&validated.mv);

        let suffix = if self.chess.is_checkmate() {
            "#"
        } else if self.chess.is_check() {
            "+"
        } else {
            ""
        };

        let applied = AppliedMove {
            token: validated.token,
            san: format!("{}{}", san, suffix),
        };
        self.repetition_keys.push(repetition_key(&self.chess));
        self.played.push(applied.clone());
        debug!(san = %applied.san, ply = self.played.len(), "Move applied");
        applied
    }

    /// Takes back the most recent move.
    #[instrument(skip(self))]
    pub fn undo_last(&mut self) -> Option<AppliedMove> {
        let last = self.played.last().cloned()?;
        let remaining: Vec<MoveToken> = self.played[..self.played.len() - 1]
            .iter()
            .map(|m| m.token.clone())
            .collect();

        match Self::replay(remaining.iter()) {
            Ok(rebuilt) => {
                *self = rebuilt;
                Some(last)
            }
            Err(e) => {
                // every stored token was legal when played, so replay cannot fail
                warn!(error = %e, "Replay failed while taking back a move");
                None
            }
        }
    }

    /// Check and draw flags.
    pub fn status(&self) -> PositionStatus {
        PositionStatus {
            check: self.chess.is_check(),
            checkmate: self.chess.is_checkmate(),
            stalemate: self.chess.is_stalemate(),
            insufficient_material: self.chess.is_insufficient_material(),
            fifty_move_rule: self.chess.halfmoves() >= 100,
            threefold_repetition: self.repetitions() >= 3,
        }
    }

    /// How the game ended, if the position is terminal.
    ///
    /// Fifty-move and threefold repetition are claimable only and do not end
    /// the game; their seventy-five-move and fivefold forms do.
    pub fn terminal_outcome(&self) -> Option<GameOutcome> {
        let draw = |termination| GameOutcome {
            result: GameResult::Draw,
            termination,
        };

        if self.chess.is_checkmate() {
            Some(GameOutcome {
                result: GameResult::won_by(self.chess.turn().other()),
                termination: Termination::Checkmate,
            })
        } else if self.chess.is_stalemate() {
            Some(draw(Termination::Stalemate))
        } else if self.chess.is_insufficient_material() {
            Some(draw(Termination::InsufficientMaterial))
        } else if self.chess.halfmoves() >= 150 {
            Some(draw(Termination::SeventyfiveMoves))
        } else if self.repetitions() >= 5 {
            Some(draw(Termination::FivefoldRepetition))
        } else {
            None
        }
    }

    /// Forsyth-Edwards notation of the position.
    pub fn fen(&self) -> String {
        Fen::from_position(self.chess.clone(), EnPassantMode::Legal).to_string()
    }

    /// Piece on a square given by file and rank indices (0-7).
    pub fn piece_at(&self, file: u32, rank: u32) -> Option<shakmaty::Piece> {
        self.chess.board().piece_at(Square::new(rank * 8 + file))
    }

    fn repetitions(&self) -> usize {
        match self.repetition_keys.last() {
            Some(current) => self.repetition_keys.iter().filter(|k| *k == current).count(),
            None => 0,
        }
    }
}

fn canonical_token(mv: &Move) -> Option<MoveToken> {
    MoveToken::parse(&mv.to_uci(CastlingMode::Standard).to_string()).ok()
}

/// Placement, side to move, castling rights and a capturable en passant
/// square; the clocks do not count for repetition.
fn repetition_key(chess: &Chess) -> Zobrist64 {
    chess.zobrist_hash(EnPassantMode::Legal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(raw: &str) -> MoveToken {
        MoveToken::parse(raw).expect("Valid token")
    }

    fn play(position: &mut GamePosition, raw: &str) -> AppliedMove {
        let validated = position.validate(&token(raw)).expect("Legal move");
        position.apply(validated)
    }

    #[test]
    fn test_start_position_has_twenty_moves() {
        let position = GamePosition::new();
        assert_eq!(position.legal_moves().len(), 20);
        assert!(position.is_human_to_move());
        assert_eq!(
            position.fen(),
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
    }

    #[test]
    fn test_apply_records_san() {
        let mut position = GamePosition::new();
        let applied = play(&mut position, "g1f3");
        assert_eq!(applied.san, "Nf3");
        assert_eq!(position.ply(), 1);
        assert!(!position.is_human_to_move());
    }

    #[test]
    fn test_fools_mate_is_terminal() {
        let mut position = GamePosition::new();
        play(&mut position, "f2f3");
        play(&mut position, "e7e5");
        play(&mut position, "g2g4");
        let mate = play(&mut position, "d8h4");
        assert_eq!(mate.san, "Qh4#");
        let outcome = position.terminal_outcome().expect("Checkmate");
        assert_eq!(outcome.result, GameResult::BlackWins);
        assert_eq!(outcome.termination, Termination::Checkmate);
        assert!(position.legal_moves().is_empty());
    }

    #[test]
    fn test_illegal_move_reports_legal_set() {
        let position = GamePosition::new();
        match position.validate(&token("e2e5")) {
            Err(SessionError::IllegalMove { legal_moves, .. }) => {
                assert_eq!(legal_moves.len(), 20);
                assert!(legal_moves.contains(&"e2e4".to_string()));
            }
            other => panic!("Expected IllegalMove, got {:?}", other),
        }
    }

    #[test]
    fn test_undo_last_restores_position() {
        let mut position = GamePosition::new();
        play(&mut position, "e2e4");
        let undone = position.undo_last().expect("One move to undo");
        assert_eq!(undone.token.as_str(), "e2e4");
        assert_eq!(position.ply(), 0);
        assert!(position.is_human_to_move());
    }

    #[test]
    fn test_threefold_repetition_flag() {
        let mut position = GamePosition::new();
        for _ in 0..2 {
            play(&mut position, "g1f3");
            play(&mut position, "g8f6");
            play(&mut position, "f3g1");
            play(&mut position, "f6g8");
        }
        assert!(position.status().threefold_repetition);
        assert!(position.terminal_outcome().is_none());
    }

    #[test]
    fn test_fen_lists_only_capturable_en_passant() {
        let mut position = GamePosition::new();
        play(&mut position, "e2e4");
        assert_eq!(
            position.fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );

        play(&mut position, "d7d5");
        play(&mut position, "e4e5");
        play(&mut position, "f7f5");
        assert_eq!(
            position.fen(),
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3"
        );
    }
}
