//! Rules adapter: move tokens, positions and board views.
//!
//! Legality, check and draw detection come from `shakmaty`. The rest of the
//! crate only sees tokens, [`GamePosition`] and [`BoardView`].

mod position;
mod token;
mod view;

pub use position::{
    AppliedMove, GameOutcome, GamePosition, GameResult, HUMAN_COLOR, PositionStatus, Termination,
    ValidatedMove,
};
pub use token::MoveToken;
pub use view::{BoardView, PieceView, SquareView};
