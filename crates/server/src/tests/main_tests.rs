use super::*;
use axum::{body, body::Body, http::Request};
use session::SessionHandle;
use shared::domain::MoveDescriptor;
use tower::ServiceExt;

fn test_app() -> (Router, SessionHandle) {
    let (session, _task) = spawn_session(
        Session::new(ChessRules::default(), SessionOptions::default()),
        32,
    );
    let app = build_router(Arc::new(AppState {
        session: session.clone(),
    }));
    (app, session)
}

async fn snapshot_json(app: Router) -> serde_json::Value {
    let request = Request::get("/session")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&body).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok() {
    let (app, _session) = test_app();
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test]
async fn session_route_starts_empty() {
    let (app, _session) = test_app();
    let snapshot = snapshot_json(app).await;
    assert_eq!(snapshot["phase"], "active");
    assert_eq!(snapshot["ply"], 0);
    assert_eq!(snapshot["connections"], 0);
    assert!(snapshot["white"].is_null());
}

#[tokio::test]
async fn session_route_reflects_moves_made_through_the_handle() {
    let (app, session) = test_app();
    let (white_tx, _white_rx) = mpsc::unbounded_channel();
    let (black_tx, _black_rx) = mpsc::unbounded_channel();
    let white = session.connect(white_tx).await.expect("connect");
    let black = session.connect(black_tx).await.expect("connect");
    session
        .request(white, ClientRequest::Move(MoveDescriptor::new("e2", "e4")))
        .await
        .expect("move");

    let snapshot = snapshot_json(app).await;
    assert_eq!(snapshot["ply"], 1);
    assert_eq!(snapshot["white"], white.0);
    assert_eq!(snapshot["black"], black.0);
    assert_eq!(snapshot["status"]["kind"], "ongoing");
}

#[tokio::test]
async fn ws_route_requires_an_upgrade() {
    let (app, _session) = test_app();
    let request = Request::get("/ws").body(Body::empty()).expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert!(response.status().is_client_error());
}

#[test]
fn decode_request_accepts_client_frames() {
    let request = decode_request(r#"{"type":"undoMove"}"#).expect("decode");
    assert_eq!(request, ClientRequest::UndoMove);
}

#[test]
fn decode_request_flags_malformed_frames() {
    let err = decode_request("{not json").expect_err("should fail");
    assert_eq!(err.code, ErrorCode::MalformedRequest);

    let err = decode_request(r#"{"type":"move","payload":{"from":"e2"}}"#)
        .expect_err("missing destination");
    assert_eq!(err.code, ErrorCode::MalformedRequest);
}

#[test]
fn cli_accepts_overrides() {
    let cli = Cli::try_parse_from([
        "session-server",
        "--bind",
        "0.0.0.0:9090",
        "--announce-out-of-turn",
    ])
    .expect("parse");
    assert_eq!(cli.bind.as_deref(), Some("0.0.0.0:9090"));
    assert!(cli.announce_out_of_turn);
    assert!(cli.config.is_none());
}
