use serde::{Deserialize, Serialize};

use crate::{
    domain::{Color, MoveDescriptor, MoveRecord, Position},
    error::ApiError,
};

/// Requests a connected client may send over the session socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientRequest {
    Move(MoveDescriptor),
    UndoMove,
    RedoMove,
    SpectatorMovePrev,
    SpectatorMoveNext,
    SpectatorJumpToLatest,
    ResetGame,
    RequestRole,
}

impl ClientRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ClientRequest::Move(_) => "move",
            ClientRequest::UndoMove => "undoMove",
            ClientRequest::RedoMove => "redoMove",
            ClientRequest::SpectatorMovePrev => "spectatorMovePrev",
            ClientRequest::SpectatorMoveNext => "spectatorMoveNext",
            ClientRequest::SpectatorJumpToLatest => "spectatorJumpToLatest",
            ClientRequest::ResetGame => "resetGame",
            ClientRequest::RequestRole => "requestRole",
        }
    }
}

/// Notices the session sends to clients. Every event is addressed to exactly
/// one connection; broadcasts are expanded before they reach the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerEvent {
    PlayerRole(Color),
    SpectatorRole,
    BoardState(Position),
    SpectatorBoardState(Position),
    SpectatorPosition(usize),
    MoveHistory(Vec<MoveRecord>),
    MoveHistoryLength(usize),
    CanUndo(bool),
    CanRedo(bool),
    Move(MoveDescriptor),
    InvalidMove(MoveDescriptor),
    NotYourTurn(MoveDescriptor),
    MoveUndone,
    MoveRedone,
    UndoFailed(String),
    RedoFailed(String),
    GameOver(String),
    GameReset,
    Error(ApiError),
}
