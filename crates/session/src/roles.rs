use shared::domain::{Color, ConnectionId, Role};

/// The two player seats. Whoever is not seated is an observer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRegistry {
    white: Option<ConnectionId>,
    black: Option<ConnectionId>,
}

impl RoleRegistry {
    /// First come, first served: white, then black, then observer. A
    /// connection that already holds a seat keeps it.
    pub fn assign_role(&mut self, conn: ConnectionId) -> Role {
        if let Role::Player(color) = self.role_of(conn) {
            return Role::Player(color);
        }
        if self.white.is_none() {
            self.white = Some(conn);
            Role::Player(Color::White)
        } else if self.black.is_none() {
            self.black = Some(conn);
            Role::Player(Color::Black)
        } else {
            Role::Observer
        }
    }

    /// Vacates whatever seat `conn` holds. Returns whether a seat was freed.
    pub fn release(&mut self, conn: ConnectionId) -> bool {
        if self.white == Some(conn) {
            self.white = None;
            true
        } else if self.black == Some(conn) {
            self.black = None;
            true
        } else {
            false
        }
    }

    pub fn role_of(&self, conn: ConnectionId) -> Role {
        if self.white == Some(conn) {
            Role::Player(Color::White)
        } else if self.black == Some(conn) {
            Role::Player(Color::Black)
        } else {
            Role::Observer
        }
    }

    pub fn holder(&self, color: Color) -> Option<ConnectionId> {
        match color {
            Color::White => self.white,
            Color::Black => self.black,
        }
    }

    pub fn clear(&mut self) {
        self.white = None;
        self.black = None;
    }
}
