use std::collections::HashMap;

use shared::domain::ConnectionId;

/// Per-observer ply index into the ledger. Cursors move independently of
/// each other and of the live position.
#[derive(Debug, Clone, Default)]
pub struct SpectatorCursors {
    cursors: HashMap<ConnectionId, usize>,
}

impl SpectatorCursors {
    pub fn insert(&mut self, conn: ConnectionId, ply: usize) {
        self.cursors.insert(conn, ply);
    }

    pub fn remove(&mut self, conn: ConnectionId) -> Option<usize> {
        self.cursors.remove(&conn)
    }

    pub fn get(&self, conn: ConnectionId) -> Option<usize> {
        self.cursors.get(&conn).copied()
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.cursors.contains_key(&conn)
    }

    /// Returns the new ply, or `None` when already at 0 or not tracked.
    pub fn step_back(&mut self, conn: ConnectionId) -> Option<usize> {
        let ply = self.cursors.get_mut(&conn)?;
        if *ply == 0 {
            return None;
        }
        *ply -= 1;
        Some(*ply)
    }

    /// Returns the new ply, or `None` when already at `live` or not tracked.
    pub fn step_forward(&mut self, conn: ConnectionId, live: usize) -> Option<usize> {
        let ply = self.cursors.get_mut(&conn)?;
        if *ply >= live {
            *ply = live;
            return None;
        }
        *ply += 1;
        Some(*ply)
    }

    pub fn jump_to_live(&mut self, conn: ConnectionId, live: usize) -> Option<usize> {
        let ply = self.cursors.get_mut(&conn)?;
        *ply = live;
        Some(live)
    }

    /// Moves every cursor to `ply`.
    pub fn move_all(&mut self, ply: usize) {
        for cursor in self.cursors.values_mut() {
            *cursor = ply;
        }
    }

    pub fn observers(&self) -> impl Iterator<Item = (ConnectionId, usize)> + '_ {
        self.cursors.iter().map(|(conn, ply)| (*conn, *ply))
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/cursors_tests.rs"]
mod tests;
