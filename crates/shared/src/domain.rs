use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(ConnectionId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    #[serde(rename = "w")]
    White,
    #[serde(rename = "b")]
    Black,
}

impl Color {
    pub fn opponent(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => f.write_str("white"),
            Color::Black => f.write_str("black"),
        }
    }
}

/// What a connection is allowed to be inside a session. Anyone who does not
/// hold a colour is an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Player(Color),
    Observer,
}

impl Role {
    pub fn is_player(self) -> bool {
        matches!(self, Role::Player(_))
    }
}

/// Opaque board state produced by the rules engine. The session only ever
/// compares positions for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub String);

impl Position {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A move as the browser board submits it: algebraic squares plus an optional
/// promotion piece letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveDescriptor {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
}

impl MoveDescriptor {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    pub fn with_promotion(mut self, piece: impl Into<String>) -> Self {
        self.promotion = Some(piece.into());
        self
    }
}

impl fmt::Display for MoveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(piece) = &self.promotion {
            f.write_str(piece)?;
        }
        Ok(())
    }
}

/// One applied ply. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    #[serde(rename = "move")]
    pub mv: MoveDescriptor,
    #[serde(rename = "fen")]
    pub position: Position,
    #[serde(rename = "player")]
    pub mover: ConnectionId,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    ThreefoldRepetition,
    InsufficientMaterial,
    FiftyMoveRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameStatus {
    Ongoing,
    Checkmate { winner: Color },
    Stalemate,
    Draw { reason: DrawReason },
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameStatus::Ongoing)
    }

    /// Text announced in the `gameOver` notice. `None` while the game is on.
    pub fn result_text(self) -> Option<&'static str> {
        match self {
            GameStatus::Ongoing => None,
            GameStatus::Checkmate {
                winner: Color::White,
            } => Some("White wins by checkmate!"),
            GameStatus::Checkmate {
                winner: Color::Black,
            } => Some("Black wins by checkmate!"),
            GameStatus::Stalemate => Some("Game ended in stalemate!"),
            GameStatus::Draw {
                reason: DrawReason::ThreefoldRepetition,
            } => Some("Game drawn by threefold repetition!"),
            GameStatus::Draw {
                reason: DrawReason::InsufficientMaterial,
            } => Some("Game drawn due to insufficient material!"),
            GameStatus::Draw {
                reason: DrawReason::FiftyMoveRule,
            } => Some("Game ended in a draw!"),
        }
    }
}
