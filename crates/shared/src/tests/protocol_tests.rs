use chrono::{TimeZone, Utc};
use serde_json::json;

use crate::{
    domain::{Color, ConnectionId, GameStatus, MoveDescriptor, MoveRecord, Position},
    error::{ApiError, ErrorCode},
    protocol::{ClientRequest, ServerEvent},
};

#[test]
fn move_request_decodes_browser_payload() {
    let raw = json!({
        "type": "move",
        "payload": { "from": "e7", "to": "e8", "promotion": "q" }
    });
    let request: ClientRequest = serde_json::from_value(raw).expect("decode");
    assert_eq!(
        request,
        ClientRequest::Move(MoveDescriptor::new("e7", "e8").with_promotion("q"))
    );
}

#[test]
fn unit_requests_decode_without_payload() {
    let request: ClientRequest =
        serde_json::from_value(json!({ "type": "spectatorJumpToLatest" })).expect("decode");
    assert_eq!(request, ClientRequest::SpectatorJumpToLatest);
    assert_eq!(request.name(), "spectatorJumpToLatest");
}

#[test]
fn player_role_uses_single_letter_colours() {
    let value = serde_json::to_value(ServerEvent::PlayerRole(Color::Black)).expect("encode");
    assert_eq!(value, json!({ "type": "playerRole", "payload": "b" }));
}

#[test]
fn move_history_entries_carry_move_fen_and_player() {
    let record = MoveRecord {
        mv: MoveDescriptor::new("e2", "e4"),
        position: Position("after".into()),
        mover: ConnectionId(7),
        played_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    };
    let value = serde_json::to_value(ServerEvent::MoveHistory(vec![record])).expect("encode");
    let entry = &value["payload"][0];
    assert_eq!(entry["move"], json!({ "from": "e2", "to": "e4" }));
    assert_eq!(entry["fen"], json!("after"));
    assert_eq!(entry["player"], json!(7));
    assert!(entry.get("playedAt").is_some());
}

#[test]
fn unknown_request_type_is_rejected() {
    let err = serde_json::from_value::<ClientRequest>(json!({ "type": "castleEverything" }));
    assert!(err.is_err());
}

#[test]
fn result_text_only_for_terminal_statuses() {
    assert_eq!(GameStatus::Ongoing.result_text(), None);
    assert_eq!(
        GameStatus::Checkmate {
            winner: Color::Black
        }
        .result_text(),
        Some("Black wins by checkmate!")
    );
    assert!(GameStatus::Stalemate.is_terminal());
}

#[test]
fn error_event_carries_code_and_message() {
    let event = ServerEvent::Error(ApiError::new(ErrorCode::MalformedRequest, "missing field `to`"));
    let value = serde_json::to_value(event).expect("encode");
    assert_eq!(
        value,
        json!({
            "type": "error",
            "payload": { "code": "malformed_request", "message": "missing field `to`" }
        })
    );
}
