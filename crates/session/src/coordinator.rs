//! The session state machine.
//!
//! `Session` is the only thing that mutates session state. Every inbound
//! event is handled to completion and yields an [`Outbox`] of per-connection
//! deliveries; broadcasts are expanded here so that permission flags are
//! computed once per recipient instead of broadcast-then-overridden.

use std::{
    collections::BTreeSet,
    panic::{self, AssertUnwindSafe},
};

use chrono::Utc;
use serde::Serialize;
use shared::{
    domain::{Color, ConnectionId, GameStatus, MoveDescriptor, MoveRecord, Role},
    protocol::{ClientRequest, ServerEvent},
};
use tracing::{debug, error, info, warn};

use crate::{
    arbiter::Permissions,
    cursors::SpectatorCursors,
    ledger::{HistoryError, HistoryLedger},
    roles::RoleRegistry,
    rules::{MoveOutcome, RulesEngine},
};

const UNDO_NOT_YOURS: &str = "You can only undo your own move";
const REDO_NOT_YOURS: &str = "You cannot redo at this moment";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Answer out-of-turn moves with `notYourTurn` instead of dropping them.
    pub announce_out_of_turn: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub event: ServerEvent,
}

#[derive(Debug, Default)]
pub struct Outbox {
    deliveries: Vec<Delivery>,
}

impl Outbox {
    fn send(&mut self, to: ConnectionId, event: ServerEvent) {
        self.deliveries.push(Delivery { to, event });
    }

    fn broadcast<'a>(
        &mut self,
        members: impl IntoIterator<Item = &'a ConnectionId>,
        event: ServerEvent,
    ) {
        for to in members {
            self.send(*to, event.clone());
        }
    }

    pub fn events_for(&self, conn: ConnectionId) -> Vec<&ServerEvent> {
        self.deliveries
            .iter()
            .filter(|d| d.to == conn)
            .map(|d| &d.event)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn into_deliveries(self) -> Vec<Delivery> {
        self.deliveries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Active,
    Concluded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub status: GameStatus,
    pub ply: usize,
    pub redo_depth: usize,
    pub white: Option<ConnectionId>,
    pub black: Option<ConnectionId>,
    pub observers: usize,
    pub connections: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Back,
    Forward,
    Live,
}

pub struct Session<R: RulesEngine> {
    rules: R,
    options: SessionOptions,
    ledger: HistoryLedger,
    roles: RoleRegistry,
    permissions: Permissions,
    cursors: SpectatorCursors,
    members: BTreeSet<ConnectionId>,
    // Connections whose seat was wiped by a reset; they are seated again on
    // their next request.
    unseated: BTreeSet<ConnectionId>,
    status: GameStatus,
}

impl<R: RulesEngine> Session<R> {
    pub fn new(rules: R, options: SessionOptions) -> Self {
        let ledger = HistoryLedger::new(rules.initial_position());
        Self {
            rules,
            options,
            ledger,
            roles: RoleRegistry::default(),
            permissions: Permissions::default(),
            cursors: SpectatorCursors::default(),
            members: BTreeSet::new(),
            unseated: BTreeSet::new(),
            status: GameStatus::Ongoing,
        }
    }

    pub fn connect(&mut self, conn: ConnectionId) -> Outbox {
        let mut out = Outbox::default();
        if !self.members.insert(conn) {
            debug!(conn = %conn, "duplicate connect ignored");
            return out;
        }
        info!(conn = %conn, "connection joined");
        self.seat(conn, &mut out);
        debug_assert!(self.invariants_hold());
        out
    }

    pub fn disconnect(&mut self, conn: ConnectionId) -> Outbox {
        let mut out = Outbox::default();
        if !self.members.remove(&conn) {
            return out;
        }
        self.unseated.remove(&conn);
        self.cursors.remove(conn);

        if self.roles.release(conn) {
            info!(conn = %conn, "player left, resetting session");
            self.reset(&mut out);
        } else {
            info!(conn = %conn, "observer left");
        }
        debug_assert!(self.invariants_hold());
        out
    }

    pub fn handle(&mut self, conn: ConnectionId, request: ClientRequest) -> Outbox {
        let mut out = Outbox::default();
        if !self.members.contains(&conn) {
            debug!(conn = %conn, request = request.name(), "request from unknown connection");
            return out;
        }

        if self.unseated.remove(&conn) {
            self.cursors.remove(conn);
            self.seat(conn, &mut out);
            if request == ClientRequest::RequestRole {
                return out;
            }
        }

        match request {
            ClientRequest::Move(mv) => self.submit_move(conn, mv, &mut out),
            ClientRequest::UndoMove => self.undo(conn, &mut out),
            ClientRequest::RedoMove => self.redo(conn, &mut out),
            ClientRequest::SpectatorMovePrev => self.navigate(conn, Step::Back, &mut out),
            ClientRequest::SpectatorMoveNext => self.navigate(conn, Step::Forward, &mut out),
            ClientRequest::SpectatorJumpToLatest => self.navigate(conn, Step::Live, &mut out),
            ClientRequest::ResetGame => self.request_reset(conn, &mut out),
            ClientRequest::RequestRole => self.announce_role(conn, &mut out),
        }
        debug_assert!(self.invariants_hold());
        out
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    pub fn cursors(&self) -> &SpectatorCursors {
        &self.cursors
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn phase(&self) -> Phase {
        if self.status.is_terminal() {
            Phase::Concluded
        } else {
            Phase::Active
        }
    }

    pub fn is_unseated(&self, conn: ConnectionId) -> bool {
        self.unseated.contains(&conn)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            status: self.status,
            ply: self.ledger.len(),
            redo_depth: self.ledger.redo_depth(),
            white: self.roles.holder(Color::White),
            black: self.roles.holder(Color::Black),
            observers: self.cursors.len(),
            connections: self.members.len(),
        }
    }

    /// Cross-component invariants that must hold between events.
    pub fn invariants_hold(&self) -> bool {
        let live = self.ledger.len();
        let seats_distinct = match (
            self.roles.holder(Color::White),
            self.roles.holder(Color::Black),
        ) {
            (Some(white), Some(black)) => white != black,
            _ => true,
        };
        let cursors_valid = self.cursors.observers().all(|(conn, ply)| {
            ply <= live && self.members.contains(&conn) && !self.roles.role_of(conn).is_player()
        });
        self.permissions.consistent_with(&self.ledger)
            && seats_distinct
            && cursors_valid
            && self.unseated.is_subset(&self.members)
    }

    fn seat(&mut self, conn: ConnectionId, out: &mut Outbox) {
        let live = self.ledger.len();
        match self.roles.assign_role(conn) {
            Role::Player(color) => {
                info!(conn = %conn, %color, "seated as player");
                out.send(conn, ServerEvent::PlayerRole(color));
            }
            Role::Observer => {
                info!(conn = %conn, ply = live, "seated as observer");
                self.cursors.insert(conn, live);
                out.send(conn, ServerEvent::SpectatorRole);
                out.send(conn, ServerEvent::SpectatorPosition(live));
            }
        }

        out.send(
            conn,
            ServerEvent::BoardState(self.ledger.current_position().clone()),
        );
        out.send(conn, ServerEvent::MoveHistory(self.ledger.applied().to_vec()));
        out.send(conn, ServerEvent::MoveHistoryLength(live));
        let view = self.permissions.view_for(conn, &self.ledger);
        out.send(conn, ServerEvent::CanUndo(view.can_undo));
        out.send(conn, ServerEvent::CanRedo(view.can_redo));
        if let Some(text) = self.status.result_text() {
            out.send(conn, ServerEvent::GameOver(text.to_string()));
        }
    }

    fn announce_role(&self, conn: ConnectionId, out: &mut Outbox) {
        match self.roles.role_of(conn) {
            Role::Player(color) => out.send(conn, ServerEvent::PlayerRole(color)),
            Role::Observer => {
                out.send(conn, ServerEvent::SpectatorRole);
                if let Some(ply) = self.cursors.get(conn) {
                    out.send(conn, ServerEvent::SpectatorPosition(ply));
                }
            }
        }
    }

    fn submit_move(&mut self, conn: ConnectionId, mv: MoveDescriptor, out: &mut Outbox) {
        let to_move = self.rules.side_to_move(self.ledger.current_position());
        if !self.permissions.may_move(conn, &self.roles, to_move) {
            debug!(conn = %conn, mv = %mv, "move out of turn");
            if self.options.announce_out_of_turn {
                out.send(conn, ServerEvent::NotYourTurn(mv));
            }
            return;
        }

        let current = self.ledger.current_position().clone();
        let rules = &self.rules;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| rules.apply(&current, &mv)));
        let position = match outcome {
            Ok(MoveOutcome::Accepted(position)) => position,
            Ok(MoveOutcome::Rejected(reason)) => {
                warn!(conn = %conn, mv = %mv, %reason, "invalid move");
                out.send(conn, ServerEvent::InvalidMove(mv));
                return;
            }
            Err(_) => {
                error!(conn = %conn, mv = %mv, "rules engine panicked on move");
                out.send(conn, ServerEvent::InvalidMove(mv));
                return;
            }
        };

        self.ledger.append(MoveRecord {
            mv: mv.clone(),
            position,
            mover: conn,
            played_at: Utc::now(),
        });
        self.permissions.record_move(conn);
        self.cursors.move_all(self.ledger.len());
        self.refresh_status();
        info!(conn = %conn, mv = %mv, ply = self.ledger.len(), "move applied");

        out.broadcast(&self.members, ServerEvent::Move(mv));
        self.broadcast_state(out);
        self.broadcast_permissions(out);
        self.broadcast_cursors(out);

        if let Some(text) = self.status.result_text() {
            info!(result = text, "game over");
            out.broadcast(&self.members, ServerEvent::GameOver(text.to_string()));
        }
    }

    fn undo(&mut self, conn: ConnectionId, out: &mut Outbox) {
        if !self.permissions.may_undo(conn, &self.ledger) {
            let reason = if self.ledger.is_empty() {
                HistoryError::EmptyHistory.to_string()
            } else {
                UNDO_NOT_YOURS.to_string()
            };
            debug!(conn = %conn, %reason, "undo refused");
            out.send(conn, ServerEvent::UndoFailed(reason));
            return;
        }

        if let Err(err) = self.ledger.undo_last() {
            out.send(conn, ServerEvent::UndoFailed(err.to_string()));
            return;
        }
        self.permissions.record_undo(conn, &self.ledger);
        self.cursors.move_all(self.ledger.len());
        self.refresh_status();
        info!(conn = %conn, ply = self.ledger.len(), "move undone");

        self.broadcast_state(out);
        out.broadcast(&self.members, ServerEvent::MoveUndone);
        self.broadcast_permissions(out);
        self.broadcast_cursors(out);
    }

    fn redo(&mut self, conn: ConnectionId, out: &mut Outbox) {
        if !self.permissions.may_redo(conn, &self.ledger) {
            let reason = if self.ledger.can_redo() {
                REDO_NOT_YOURS.to_string()
            } else {
                HistoryError::NothingToRedo.to_string()
            };
            debug!(conn = %conn, %reason, "redo refused");
            out.send(conn, ServerEvent::RedoFailed(reason));
            return;
        }

        let record = match self.ledger.redo_last() {
            Ok(record) => record,
            Err(err) => {
                out.send(conn, ServerEvent::RedoFailed(err.to_string()));
                return;
            }
        };
        self.permissions.record_redo(record.mover, &self.ledger);
        self.cursors.move_all(self.ledger.len());
        self.refresh_status();
        info!(conn = %conn, ply = self.ledger.len(), "move redone");

        self.broadcast_state(out);
        out.broadcast(&self.members, ServerEvent::MoveRedone);
        self.broadcast_permissions(out);
        self.broadcast_cursors(out);
    }

    fn navigate(&mut self, conn: ConnectionId, step: Step, out: &mut Outbox) {
        if self.roles.role_of(conn).is_player() {
            debug!(conn = %conn, ?step, "players cannot browse history");
            return;
        }

        let live = self.ledger.len();
        let moved = match step {
            Step::Back => self.cursors.step_back(conn),
            Step::Forward => self.cursors.step_forward(conn, live),
            Step::Live => self.cursors.jump_to_live(conn, live),
        };
        let Some(ply) = moved else {
            return;
        };

        match self.ledger.position_at_ply(ply) {
            Ok(position) => {
                out.send(conn, ServerEvent::SpectatorBoardState(position.clone()));
                out.send(conn, ServerEvent::SpectatorPosition(ply));
            }
            Err(err) => warn!(conn = %conn, %err, "cursor outside history"),
        }
    }

    fn request_reset(&mut self, conn: ConnectionId, out: &mut Outbox) {
        if self.roles.role_of(conn) != Role::Player(Color::White) {
            debug!(conn = %conn, "reset refused, requester is not white");
            return;
        }
        info!(conn = %conn, "reset requested");
        self.reset(out);
    }

    /// Back to the starting position with empty history and no seats. Every
    /// remaining connection waits, as an observer at ply 0, to be seated
    /// again on its next request.
    fn reset(&mut self, out: &mut Outbox) {
        self.ledger.clear();
        self.permissions.clear();
        self.roles.clear();
        self.status = GameStatus::Ongoing;
        for conn in &self.members {
            self.cursors.insert(*conn, 0);
            self.unseated.insert(*conn);
        }

        out.broadcast(&self.members, ServerEvent::GameReset);
        self.broadcast_state(out);
        self.broadcast_permissions(out);
        self.broadcast_cursors(out);
    }

    fn refresh_status(&mut self) {
        let earlier = self.ledger.earlier_positions();
        self.status = self
            .rules
            .status(self.ledger.current_position(), &earlier);
    }

    fn broadcast_state(&self, out: &mut Outbox) {
        out.broadcast(
            &self.members,
            ServerEvent::BoardState(self.ledger.current_position().clone()),
        );
        out.broadcast(
            &self.members,
            ServerEvent::MoveHistory(self.ledger.applied().to_vec()),
        );
        out.broadcast(&self.members, ServerEvent::MoveHistoryLength(self.ledger.len()));
    }

    fn broadcast_permissions(&self, out: &mut Outbox) {
        for conn in &self.members {
            let view = self.permissions.view_for(*conn, &self.ledger);
            out.send(*conn, ServerEvent::CanUndo(view.can_undo));
            out.send(*conn, ServerEvent::CanRedo(view.can_redo));
        }
    }

    fn broadcast_cursors(&self, out: &mut Outbox) {
        for (conn, ply) in self.cursors.observers() {
            out.send(conn, ServerEvent::SpectatorPosition(ply));
        }
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
