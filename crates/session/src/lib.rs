//! Coordination core for one shared two-player game with observers.
//!
//! - `rules`: adapter trait over the game rules, with a chess implementation.
//! - `ledger`: applied moves and the redo branch.
//! - `roles`: the two player seats.
//! - `arbiter`: who may move, undo and redo.
//! - `cursors`: independent history cursors for observers.
//! - `coordinator`: the state machine that ties the above together.
//! - `actor`: a mailbox task that owns one `Session`.

pub mod actor;
pub mod arbiter;
pub mod coordinator;
pub mod cursors;
pub mod ledger;
pub mod roles;
pub mod rules;

pub use actor::{spawn_session, SessionClosed, SessionHandle};
pub use coordinator::{Delivery, Outbox, Phase, Session, SessionOptions, SessionSnapshot};
pub use rules::{ChessRules, MoveOutcome, RulesEngine};
