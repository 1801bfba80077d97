//! Coordinate move tokens (`e2e4`, `e7e8q`).

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// A structurally valid move token: origin square, destination square and
/// an optional promotion letter, stored lowercase.
///
/// A token says nothing about legality; see
/// [`GamePosition::validate`](super::GamePosition::validate).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MoveToken(String);

impl MoveToken {
    /// Parses a token, case-insensitively, rejecting anything that is not
    /// `[a-h][1-8][a-h][1-8][qrbn]?`.
    #[instrument]
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let token = raw.trim().to_ascii_lowercase();
        if is_well_formed(token.as_bytes()) {
            Ok(Self(token))
        } else {
            debug!(raw, "Rejected malformed move token");
            Err(SessionError::MalformedMove(raw.trim().to_string()))
        }
    }

    /// The canonical lowercase form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Origin square name.
    pub fn from_square(&self) -> &str {
        &self.0[0..2]
    }

    /// Destination square name.
    pub fn to_square(&self) -> &str {
        &self.0[2..4]
    }

    /// Promotion letter, if any.
    pub fn promotion(&self) -> Option<char> {
        self.0.chars().nth(4)
    }
}

fn is_well_formed(bytes: &[u8]) -> bool {
    let square = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);
    match bytes {
        [f1, r1, f2, r2] => square(*f1, *r1) && square(*f2, *r2),
        [f1, r1, f2, r2, promo] => {
            square(*f1, *r1) && square(*f2, *r2) && matches!(promo, b'q' | b'r' | b'b' | b'n')
        }
        _ => false,
    }
}

impl std::fmt::Display for MoveToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MoveToken {
    type Error = SessionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MoveToken> for String {
    fn from(token: MoveToken) -> Self {
        token.0
    }
}
