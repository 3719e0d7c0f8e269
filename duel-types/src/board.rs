//! Game vocabulary shared by both peers: sides, squares, promotion pieces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::WireError;

const FILES: [char; 8] = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h'];

/// One of the two roles in a game. White moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// First mover.
    White,
    /// Second mover.
    Black,
}

impl Side {
    /// The other side.
    pub fn opposite(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A board square in algebraic coordinates (`a1`..`h8`).
///
/// Serialized as its coordinate string, which is what `start_sq_coords`
/// and `end_sq_coords` carry on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Square {
    file: u8,
    rank: u8,
}

impl Square {
    /// Create a square from zero-based file and rank indices.
    pub fn new(file: u8, rank: u8) -> Result<Self, WireError> {
        if file > 7 || rank > 7 {
            return Err(WireError::InvalidSquare(format!("file={file} rank={rank}")));
        }
        Ok(Self { file, rank })
    }

    /// Zero-based file index (`a` = 0).
    pub fn file(&self) -> u8 {
        self.file
    }

    /// Zero-based rank index (`1` = 0).
    pub fn rank(&self) -> u8 {
        self.rank
    }
}

impl FromStr for Square {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(file_ch), Some(rank_ch), None) = (chars.next(), chars.next(), chars.next())
        else {
            return Err(WireError::InvalidSquare(s.to_string()));
        };

        let file = FILES
            .iter()
            .position(|&f| f == file_ch)
            .ok_or_else(|| WireError::InvalidSquare(s.to_string()))?;
        let rank = rank_ch
            .to_digit(10)
            .filter(|r| (1..=8).contains(r))
            .ok_or_else(|| WireError::InvalidSquare(s.to_string()))?;

        Ok(Self {
            file: file as u8,
            rank: (rank - 1) as u8,
        })
    }
}

impl TryFrom<String> for Square {
    type Error = WireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Square> for String {
    fn from(sq: Square) -> Self {
        sq.to_string()
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", FILES[self.file as usize], self.rank + 1)
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Square({})", self)
    }
}

/// A piece a pawn can be promoted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    /// Queen (the default choice).
    Queen,
    /// Rook.
    Rook,
    /// Bishop.
    Bishop,
    /// Knight.
    Knight,
}

impl FromStr for PieceKind {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queen" => Ok(PieceKind::Queen),
            "Rook" => Ok(PieceKind::Rook),
            "Bishop" => Ok(PieceKind::Bishop),
            "Knight" => Ok(PieceKind::Knight),
            other => Err(WireError::InvalidPiece(other.to_string())),
        }
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The named rule variant a room is played under.
///
/// Both peers must declare the same rule set; a mismatch is fatal to the
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(String);

impl RuleSet {
    /// Create a rule set from its name.
    pub fn new(name: &str) -> Self {
        Self(name.to_string())
    }

    /// The standard chess rule set.
    pub fn standard() -> Self {
        Self::new("standard")
    }

    /// The rule set name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
