use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use session::{spawn_session, ChessRules, Session, SessionOptions, SessionSnapshot};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{ClientRequest, ServerEvent},
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "session-server", about = "Shared two-player game session over WebSocket")]
struct Cli {
    /// Settings file (defaults to ./server.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address to listen on, overriding the settings file
    #[arg(long)]
    bind: Option<String>,
    /// Tell players when they move out of turn instead of ignoring them
    #[arg(long)]
    announce_out_of_turn: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        settings.server_bind = bind;
    }
    if cli.announce_out_of_turn {
        settings.announce_out_of_turn = true;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let rules = ChessRules::from_fen(&settings.initial_fen).map_err(anyhow::Error::msg)?;
    let options = SessionOptions {
        announce_out_of_turn: settings.announce_out_of_turn,
    };
    let (session, _session_task) =
        spawn_session(Session::new(rules, options), settings.mailbox_capacity);

    let app = build_router(Arc::new(AppState { session }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/session", get(session_snapshot))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn session_snapshot(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionSnapshot>, (StatusCode, Json<ApiError>)> {
    let snapshot = state.session.snapshot().await.map_err(|e| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok(Json(snapshot))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<ServerEvent>();

    let conn = match state.session.connect(events_tx.clone()).await {
        Ok(conn) => conn,
        Err(error) => {
            error!(%error, "could not register connection");
            return;
        }
    };

    let send_task = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        match decode_request(&text) {
            Ok(request) => {
                if state.session.request(conn, request).await.is_err() {
                    break;
                }
            }
            Err(api_error) => {
                warn!(conn = %conn, message = %api_error.message, "undecodable frame");
                let _ = events_tx.send(ServerEvent::Error(api_error));
            }
        }
    }

    if let Err(error) = state.session.disconnect(conn).await {
        warn!(conn = %conn, %error, "disconnect not delivered");
    }
    send_task.abort();
}

fn decode_request(text: &str) -> Result<ClientRequest, ApiError> {
    serde_json::from_str(text)
        .map_err(|e| ApiError::new(ErrorCode::MalformedRequest, e.to_string()))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
