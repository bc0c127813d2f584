use session::{ChessRules, Session, SessionOptions};
use shared::{
    domain::{Color, ConnectionId, MoveDescriptor, Role},
    protocol::{ClientRequest, ServerEvent},
};

const A: ConnectionId = ConnectionId(1);
const B: ConnectionId = ConnectionId(2);
const C: ConnectionId = ConnectionId(3);
const D: ConnectionId = ConnectionId(4);

fn play(from: &str, to: &str) -> ClientRequest {
    ClientRequest::Move(MoveDescriptor::new(from, to))
}

fn new_session() -> Session<ChessRules> {
    Session::new(ChessRules::default(), SessionOptions::default())
}

#[test]
fn three_connections_move_undo_redo_and_browse() {
    let mut session = new_session();
    session.connect(A);
    session.connect(B);
    session.connect(C);
    assert_eq!(session.roles().role_of(A), Role::Player(Color::White));
    assert_eq!(session.roles().role_of(B), Role::Player(Color::Black));
    assert_eq!(session.roles().role_of(C), Role::Observer);
    assert_eq!(session.cursors().get(C), Some(0));

    session.handle(A, play("e2", "e4"));
    assert_eq!(session.ledger().len(), 1);
    assert_eq!(session.permissions().last_mover(), Some(A));
    assert!(session.permissions().may_undo(A, session.ledger()));
    assert!(!session.permissions().may_undo(B, session.ledger()));
    assert_eq!(session.cursors().get(C), Some(1));

    session.handle(A, ClientRequest::UndoMove);
    assert_eq!(session.ledger().len(), 0);
    assert_eq!(session.permissions().redo_holder(), Some(A));
    assert_eq!(session.permissions().last_mover(), None);

    session.handle(A, ClientRequest::RedoMove);
    assert_eq!(session.ledger().len(), 1);
    assert_eq!(session.permissions().last_mover(), Some(A));
    assert_eq!(session.permissions().redo_holder(), None);

    let out = session.handle(C, ClientRequest::SpectatorMovePrev);
    let initial = session.ledger().initial_position().clone();
    assert_eq!(
        out.events_for(C),
        vec![
            &ServerEvent::SpectatorBoardState(initial),
            &ServerEvent::SpectatorPosition(0)
        ]
    );
    let out = session.handle(C, ClientRequest::SpectatorMovePrev);
    assert!(out.is_empty());
    assert_eq!(session.cursors().get(C), Some(0));
}

#[test]
fn black_disconnect_resets_and_white_is_not_retained() {
    let mut session = new_session();
    session.connect(A);
    session.connect(B);
    session.connect(C);
    session.handle(A, play("e2", "e4"));
    session.handle(B, play("e7", "e5"));

    let out = session.disconnect(B);
    let initial = session.ledger().initial_position().clone();
    let a_events = out.events_for(A);
    assert_eq!(a_events[0], &ServerEvent::GameReset);
    assert!(a_events.contains(&&ServerEvent::BoardState(initial)));
    assert!(a_events.contains(&&ServerEvent::MoveHistory(vec![])));
    assert!(a_events.contains(&&ServerEvent::MoveHistoryLength(0)));
    assert!(out.events_for(B).is_empty());

    assert!(session.ledger().is_empty());
    assert_eq!(session.roles().holder(Color::White), None);
    assert_eq!(session.roles().holder(Color::Black), None);
    assert_eq!(session.roles().role_of(A), Role::Observer);

    // D joins before A does anything and takes white first-come-first-served.
    session.connect(D);
    assert_eq!(session.roles().role_of(D), Role::Player(Color::White));
    session.handle(A, ClientRequest::RequestRole);
    assert_eq!(session.roles().role_of(A), Role::Player(Color::Black));
}

#[test]
fn white_disconnect_resets_every_observer_cursor_to_zero() {
    let mut session = new_session();
    for conn in [A, B, C, D] {
        session.connect(conn);
    }
    session.handle(A, play("e2", "e4"));
    session.handle(B, play("e7", "e5"));
    session.handle(C, ClientRequest::SpectatorMovePrev);

    session.disconnect(A);
    assert!(session.ledger().is_empty());
    assert_eq!(session.roles().holder(Color::White), None);
    assert_eq!(session.roles().holder(Color::Black), None);
    for conn in [B, C, D] {
        assert_eq!(session.cursors().get(conn), Some(0));
    }
    assert!(session.invariants_hold());
}

#[test]
fn live_ply_matches_current_position_through_a_game() {
    let mut session = new_session();
    session.connect(A);
    session.connect(B);
    let line = [
        (A, "e2", "e4"),
        (B, "c7", "c5"),
        (A, "g1", "f3"),
        (B, "d7", "d6"),
        (A, "d2", "d4"),
        (B, "c5", "d4"),
    ];
    for (conn, from, to) in line {
        session.handle(conn, play(from, to));
        let ledger = session.ledger();
        assert_eq!(
            ledger.position_at_ply(ledger.len()).expect("live ply"),
            ledger.current_position()
        );
    }
    assert_eq!(session.ledger().len(), line.len());
}

#[test]
fn undo_then_redo_restores_position_at_every_depth() {
    let mut session = new_session();
    session.connect(A);
    session.connect(B);
    let line = [(A, "d2", "d4"), (B, "d7", "d5"), (A, "c2", "c4"), (B, "e7", "e6")];
    for (conn, from, to) in line {
        session.handle(conn, play(from, to));
        let before = session.ledger().current_position().clone();
        let len = session.ledger().len();

        session.handle(conn, ClientRequest::UndoMove);
        assert_eq!(session.ledger().len(), len - 1);
        session.handle(conn, ClientRequest::RedoMove);
        assert_eq!(session.ledger().len(), len);
        assert_eq!(session.ledger().current_position(), &before);
    }
}

#[test]
fn at_most_one_connection_may_undo_or_redo() {
    let mut session = new_session();
    for conn in [A, B, C] {
        session.connect(conn);
    }
    let steps = [
        (A, play("e2", "e4")),
        (B, play("e7", "e5")),
        (B, ClientRequest::UndoMove),
        (A, ClientRequest::UndoMove),
        (A, ClientRequest::RedoMove),
        (B, play("c7", "c5")),
        (A, play("g1", "f3")),
        (A, ClientRequest::UndoMove),
    ];
    for (conn, request) in steps {
        session.handle(conn, request);
        let ledger = session.ledger();
        let perms = session.permissions();
        let undoers = [A, B, C].iter().filter(|c| perms.may_undo(**c, ledger)).count();
        let redoers = [A, B, C].iter().filter(|c| perms.may_redo(**c, ledger)).count();
        assert!(undoers <= 1);
        assert!(redoers <= 1);
        assert!(session.invariants_hold());
    }
}

#[test]
fn redo_branch_dies_when_the_other_player_diverges() {
    let mut session = new_session();
    session.connect(A);
    session.connect(B);
    session.handle(A, play("e2", "e4"));
    session.handle(B, play("e7", "e5"));
    session.handle(B, ClientRequest::UndoMove);
    assert_eq!(session.permissions().redo_holder(), Some(B));

    session.handle(B, play("c7", "c5"));
    let out = session.handle(B, ClientRequest::RedoMove);
    assert_eq!(
        out.events_for(B),
        vec![&ServerEvent::RedoFailed("No moves to redo".into())]
    );
    assert_eq!(session.permissions().redo_holder(), None);
}

#[test]
fn observer_navigation_never_touches_history() {
    let mut session = new_session();
    for conn in [A, B, C, D] {
        session.connect(conn);
    }
    session.handle(A, play("e2", "e4"));
    session.handle(B, play("e7", "e5"));
    session.handle(B, ClientRequest::UndoMove);
    let len = session.ledger().len();
    let redo_depth = session.ledger().redo_depth();

    for request in [
        ClientRequest::SpectatorMovePrev,
        ClientRequest::SpectatorMovePrev,
        ClientRequest::SpectatorMoveNext,
        ClientRequest::SpectatorJumpToLatest,
        ClientRequest::SpectatorMovePrev,
    ] {
        session.handle(C, request);
        assert_eq!(session.ledger().len(), len);
        assert_eq!(session.ledger().redo_depth(), redo_depth);
        assert_eq!(session.cursors().get(D), Some(len));
    }
    assert_eq!(session.cursors().get(C), Some(len - 1));
}
