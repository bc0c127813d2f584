//! Applied moves plus the redo branch left behind by undo.
//!
//! `applied` and `undone` behave as two stacks: undo moves the tail of
//! `applied` onto `undone`, redo moves it back. A fresh `append` discards the
//! whole `undone` stack; a redo branch never survives divergence.

use shared::domain::{MoveRecord, Position};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("No moves to undo")]
    EmptyHistory,
    #[error("No moves to redo")]
    NothingToRedo,
    #[error("ply {ply} is outside 0..={len}")]
    OutOfRange { ply: usize, len: usize },
}

#[derive(Debug, Clone)]
pub struct HistoryLedger {
    initial: Position,
    applied: Vec<MoveRecord>,
    undone: Vec<MoveRecord>,
}

impl HistoryLedger {
    pub fn new(initial: Position) -> Self {
        Self {
            initial,
            applied: Vec::new(),
            undone: Vec::new(),
        }
    }

    pub fn append(&mut self, record: MoveRecord) {
        self.applied.push(record);
        self.undone.clear();
    }

    pub fn undo_last(&mut self) -> Result<MoveRecord, HistoryError> {
        let record = self.applied.pop().ok_or(HistoryError::EmptyHistory)?;
        self.undone.push(record.clone());
        Ok(record)
    }

    pub fn redo_last(&mut self) -> Result<MoveRecord, HistoryError> {
        let record = self.undone.pop().ok_or(HistoryError::NothingToRedo)?;
        self.applied.push(record.clone());
        Ok(record)
    }

    pub fn current_position(&self) -> &Position {
        self.applied
            .last()
            .map(|record| &record.position)
            .unwrap_or(&self.initial)
    }

    pub fn position_at_ply(&self, ply: usize) -> Result<&Position, HistoryError> {
        match ply {
            0 => Ok(&self.initial),
            n if n <= self.applied.len() => Ok(&self.applied[n - 1].position),
            _ => Err(HistoryError::OutOfRange {
                ply,
                len: self.applied.len(),
            }),
        }
    }

    /// Every position of the live line before the current one, starting
    /// position first.
    pub fn earlier_positions(&self) -> Vec<Position> {
        std::iter::once(&self.initial)
            .chain(self.applied.iter().map(|record| &record.position))
            .take(self.applied.len())
            .cloned()
            .collect()
    }

    pub fn initial_position(&self) -> &Position {
        &self.initial
    }

    pub fn applied(&self) -> &[MoveRecord] {
        &self.applied
    }

    pub fn last_applied(&self) -> Option<&MoveRecord> {
        self.applied.last()
    }

    /// Current ply count.
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn redo_depth(&self) -> usize {
        self.undone.len()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    pub fn clear(&mut self) {
        self.applied.clear();
        self.undone.clear();
    }
}

#[cfg(test)]
#[path = "tests/ledger_tests.rs"]
mod tests;
