//! Mailbox around a single [`Session`].
//!
//! One task owns the session and drains a bounded command channel, so events
//! are processed strictly one at a time. Deliveries for an event are pushed to
//! the per-connection senders before the next command is read. Each session
//! gets its own task; nothing is shared between sessions.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::{
    domain::ConnectionId,
    protocol::{ClientRequest, ServerEvent},
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    coordinator::{Delivery, Outbox, Session, SessionSnapshot},
    rules::RulesEngine,
};

pub type OutboundSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session actor has stopped")]
pub struct SessionClosed;

enum SessionCommand {
    Connect {
        conn: ConnectionId,
        outbound: OutboundSender,
    },
    Disconnect {
        conn: ConnectionId,
    },
    Request {
        conn: ConnectionId,
        request: ClientRequest,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    next_conn: Arc<AtomicU64>,
}

impl SessionHandle {
    /// Registers a new connection whose events will be pushed to `outbound`.
    pub async fn connect(&self, outbound: OutboundSender) -> Result<ConnectionId, SessionClosed> {
        let conn = ConnectionId(self.next_conn.fetch_add(1, Ordering::Relaxed));
        self.submit(SessionCommand::Connect { conn, outbound })
            .await?;
        Ok(conn)
    }

    pub async fn disconnect(&self, conn: ConnectionId) -> Result<(), SessionClosed> {
        self.submit(SessionCommand::Disconnect { conn }).await
    }

    pub async fn request(
        &self,
        conn: ConnectionId,
        request: ClientRequest,
    ) -> Result<(), SessionClosed> {
        self.submit(SessionCommand::Request { conn, request }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.submit(SessionCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| SessionClosed)
    }

    async fn submit(&self, command: SessionCommand) -> Result<(), SessionClosed> {
        self.commands.send(command).await.map_err(|_| SessionClosed)
    }
}

pub fn spawn_session<R: RulesEngine>(
    session: Session<R>,
    mailbox_capacity: usize,
) -> (SessionHandle, JoinHandle<()>) {
    let (commands, rx) = mpsc::channel(mailbox_capacity.max(1));
    let task = tokio::spawn(run(session, rx));
    let handle = SessionHandle {
        commands,
        next_conn: Arc::new(AtomicU64::new(1)),
    };
    (handle, task)
}

async fn run<R: RulesEngine>(mut session: Session<R>, mut rx: mpsc::Receiver<SessionCommand>) {
    let mut outbound: HashMap<ConnectionId, OutboundSender> = HashMap::new();

    while let Some(command) = rx.recv().await {
        let out = match command {
            SessionCommand::Connect { conn, outbound: tx } => {
                outbound.insert(conn, tx);
                session.connect(conn)
            }
            SessionCommand::Disconnect { conn } => {
                outbound.remove(&conn);
                session.disconnect(conn)
            }
            SessionCommand::Request { conn, request } => session.handle(conn, request),
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(session.snapshot());
                continue;
            }
        };
        route(&outbound, out);
    }

    info!("session mailbox closed");
}

fn route(outbound: &HashMap<ConnectionId, OutboundSender>, out: Outbox) {
    for Delivery { to, event } in out.into_deliveries() {
        let Some(tx) = outbound.get(&to) else {
            continue;
        };
        if tx.send(event).is_err() {
            debug!(conn = %to, "outbound channel already closed");
        }
    }
}

#[cfg(test)]
#[path = "tests/actor_tests.rs"]
mod tests;
