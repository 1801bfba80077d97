//! External board representation.

use super::position::{GamePosition, GameResult};
use serde::{Deserialize, Serialize};
use shakmaty::{Color, Piece, Role};

/// A piece as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PieceView {
    /// Lowercase piece letter (`p`, `n`, `b`, `r`, `q`, `k`).
    pub kind: char,
    /// `white` or `black`.
    pub color: String,
    /// FEN letter, uppercase for white.
    pub symbol: char,
    /// Chess glyph.
    pub unicode: char,
}

impl From<Piece> for PieceView {
    fn from(piece: Piece) -> Self {
        Self {
            kind: piece.role.char(),
            color: color_name(piece.color).to_string(),
            symbol: piece.char(),
            unicode: glyph(piece),
        }
    }
}

/// One square of the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SquareView {
    /// Square name, e.g. `e4`.
    pub square: String,
    /// Rank number, 1-8.
    pub rank: u8,
    /// File letter, a-h.
    pub file: char,
    /// `light` or `dark`.
    pub shade: String,
    /// Occupant, if any.
    pub piece: Option<PieceView>,
}

/// Full board snapshot for clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardView {
    /// All 64 squares from a8 to h1, rank by rank.
    pub squares: Vec<SquareView>,
    /// Position in Forsyth-Edwards notation.
    pub fen: String,
    /// White is to move.
    pub white_to_move: bool,
    /// Legal move tokens.
    pub legal_moves: Vec<String>,
    /// Side to move is in check.
    pub check: bool,
    /// Side to move is mated.
    pub checkmate: bool,
    /// Any draw condition holds.
    pub draw: bool,
    /// Final score once the game is over.
    pub result: Option<GameResult>,
}

impl BoardView {
    /// Renders a position, with the result set by the owner of the game
    /// (a resignation ends the game without a terminal position).
    pub fn render(position: &GamePosition, result: Option<GameResult>) -> Self {
        let mut squares = Vec::with_capacity(64);
        for rank in (0..8u32).rev() {
            for file in 0..8u32 {
                let file_char = char::from(b'a' + file as u8);
                squares.push(SquareView {
                    square: format!("{}{}", file_char, rank + 1),
                    rank: (rank + 1) as u8,
                    file: file_char,
                    shade: if (rank + file) % 2 == 0 { "dark" } else { "light" }.to_string(),
                    piece: position.piece_at(file, rank).map(PieceView::from),
                });
            }
        }

        let status = position.status();
        let result = result.or_else(|| position.terminal_outcome().map(|o| o.result));

        Self {
            squares,
            fen: position.fen(),
            white_to_move: position.side_to_move() == Color::White,
            legal_moves: if result.is_some() {
                Vec::new()
            } else {
                position.legal_move_strings()
            },
            check: status.check,
            checkmate: status.checkmate,
            draw: status.is_draw(),
            result,
        }
    }

    /// Plain-text diagram, white at the bottom.
    pub fn diagram(&self) -> String {
        let mut out = String::new();
        for (i, row) in self.squares.chunks(8).enumerate() {
            out.push_str(&format!("{} ", 8 - i));
            for square in row {
                let symbol = square.piece.as_ref().map(|p| p.symbol).unwrap_or('.');
                out.push(symbol);
                out.push(' ');
            }
            out.push('\n');
        }
        out.push_str("  a b c d e f g h\n");
        out
    }
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

fn glyph(piece: Piece) -> char {
    match (piece.color, piece.role) {
        (Color::White, Role::King) => '♔',
        (Color::White, Role::Queen) => '♕',
        (Color::White, Role::Rook) => '♖',
        (Color::White, Role::Bishop) => '♗',
        (Color::White, Role::Knight) => '♘',
        (Color::White, Role::Pawn) => '♙',
        (Color::Black, Role::King) => '♚',
        (Color::Black, Role::Queen) => '♛',
        (Color::Black, Role::Rook) => '♜',
        (Color::Black, Role::Bishop) => '♝',
        (Color::Black, Role::Knight) => '♞',
        (Color::Black, Role::Pawn) => '♟',
    }
}
