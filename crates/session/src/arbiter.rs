//! Who may move, undo and redo right now.
//!
//! Only `last_mover` and `redo_holder` are stored; everything else is derived
//! from the role registry and the ledger. Each transition below pairs with a
//! ledger mutation so the two scalars never outlive the history they refer to.

use shared::domain::{Color, ConnectionId, Role};

use crate::{ledger::HistoryLedger, roles::RoleRegistry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    last_mover: Option<ConnectionId>,
    redo_holder: Option<ConnectionId>,
}

/// The undo/redo flags one connection should display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionView {
    pub can_undo: bool,
    pub can_redo: bool,
}

impl Permissions {
    pub fn last_mover(&self) -> Option<ConnectionId> {
        self.last_mover
    }

    pub fn redo_holder(&self) -> Option<ConnectionId> {
        self.redo_holder
    }

    pub fn may_move(&self, conn: ConnectionId, roles: &RoleRegistry, to_move: Color) -> bool {
        roles.role_of(conn) == Role::Player(to_move)
    }

    pub fn may_undo(&self, conn: ConnectionId, ledger: &HistoryLedger) -> bool {
        !ledger.is_empty() && self.last_mover == Some(conn)
    }

    pub fn may_redo(&self, conn: ConnectionId, ledger: &HistoryLedger) -> bool {
        ledger.can_redo() && self.redo_holder == Some(conn)
    }

    pub fn view_for(&self, conn: ConnectionId, ledger: &HistoryLedger) -> PermissionView {
        PermissionView {
            can_undo: self.may_undo(conn, ledger),
            can_redo: self.may_redo(conn, ledger),
        }
    }

    /// A new move was appended by `mover`; the redo branch is gone.
    pub fn record_move(&mut self, mover: ConnectionId) {
        self.last_mover = Some(mover);
        self.redo_holder = None;
    }

    /// `requester` undid a ply. Undo passes to whoever made the new tail.
    pub fn record_undo(&mut self, requester: ConnectionId, ledger: &HistoryLedger) {
        self.redo_holder = Some(requester);
        self.last_mover = ledger.last_applied().map(|record| record.mover);
    }

    /// A ply made by `mover` was redone.
    pub fn record_redo(&mut self, mover: ConnectionId, ledger: &HistoryLedger) {
        self.last_mover = Some(mover);
        if !ledger.can_redo() {
            self.redo_holder = None;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// `redo_holder` needs a redo branch and `last_mover` needs an applied ply.
    pub fn consistent_with(&self, ledger: &HistoryLedger) -> bool {
        (self.redo_holder.is_none() || ledger.can_redo())
            && (self.last_mover.is_none() || !ledger.is_empty())
    }
}

#[cfg(test)]
#[path = "tests/arbiter_tests.rs"]
mod tests;
