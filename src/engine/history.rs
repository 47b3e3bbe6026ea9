//! engine::history
//!
//! Linear undo history.
//!
//! Every mutating builder operation pushes a snapshot of the complete
//! [`LatticeState`] before it changes anything. Undo pops the newest snapshot
//! and restores it verbatim; the table is restored as captured, not rebuilt.
//!
//! # Invariants
//!
//! - Snapshots are last-in, first-out
//! - A snapshot never shares mutable data with the live state
//! - Undo does not push a snapshot, so it cannot itself be undone
//!
//! The stack is unbounded.

use super::state::LatticeState;

/// Result of an undo attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoOutcome {
    /// A snapshot was restored; `remaining` snapshots are left.
    Restored { remaining: usize },
    /// There was nothing to undo.
    EmptyHistory,
}

impl UndoOutcome {
    /// Whether a snapshot was restored.
    pub fn is_restored(&self) -> bool {
        matches!(self, UndoOutcome::Restored { .. })
    }
}

/// Stack of prior builder states.
#[derive(Debug, Clone, Default)]
pub struct History {
    snapshots: Vec<LatticeState>,
}

impl History {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a snapshot.
    pub fn push(&mut self, state: LatticeState) {
        self.snapshots.push(state);
    }

    /// Pop the newest snapshot.
    pub fn pop(&mut self) -> Option<LatticeState> {
        self.snapshots.pop()
    }

    /// The newest snapshot, without removing it.
    pub fn peek(&self) -> Option<&LatticeState> {
        self.snapshots.last()
    }

    /// Number of snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether there is nothing to undo.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
