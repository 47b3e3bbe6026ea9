//! engine::builder
//!
//! The lattice builder: definitions, slot edits, table rebuild and undo.
//!
//! # Operation lifecycle
//!
//! Every mutating operation follows the same steps:
//!
//! ```text
//! Validate -> Snapshot -> Apply -> Rebuild
//! ```
//!
//! Validation happens first, so an operation that fails leaves neither the
//! state nor the history changed. The rebuild step never fails: if the
//! lattice references undefined elements the previous table is kept and the
//! undefined names are returned in a [`RebuildOutcome::Skipped`].
//!
//! # Indexing
//!
//! Slot indices are zero-based and refer to the lattice before the edit.
//! Ranges are inclusive on both ends.

use std::sync::Arc;

use thiserror::Error;

use super::history::{History, UndoOutcome};
use super::rebuild::{build_table, RebuildOutcome};
use super::state::LatticeState;
use crate::core::config::Config;
use crate::core::definitions::{DefinitionBatch, DefinitionError, DefinitionStore, ElementDefinition};
use crate::core::positions::Positions;
use crate::core::table::LatticeTable;
use crate::parse::{LatticeParser, TextParser};

/// Errors from structural edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("element '{name}' is not in the lattice")]
    NotInLattice { name: String },

    #[error("index {index} is out of range for a lattice of {len} slots")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("range {start}..={end} is invalid for a lattice of {len} slots")]
    InvalidRange { start: usize, end: usize, len: usize },
}

/// One or more slot references.
///
/// A single name is treated as a one-element sequence.
pub trait IntoRefs {
    /// Convert into an ordered list of references.
    fn into_refs(self) -> Vec<String>;
}

impl IntoRefs for &str {
    fn into_refs(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoRefs for String {
    fn into_refs(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoRefs for &String {
    fn into_refs(self) -> Vec<String> {
        vec![self.clone()]
    }
}

impl IntoRefs for Vec<String> {
    fn into_refs(self) -> Vec<String> {
        self
    }
}

impl IntoRefs for Vec<&str> {
    fn into_refs(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoRefs for &[&str] {
    fn into_refs(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl IntoRefs for &[String] {
    fn into_refs(self) -> Vec<String> {
        self.to_vec()
    }
}

impl<const N: usize> IntoRefs for [&str; N] {
    fn into_refs(self) -> Vec<String> {
        self.iter().map(|s| s.to_string()).collect()
    }
}

impl<const N: usize> IntoRefs for [String; N] {
    fn into_refs(self) -> Vec<String> {
        self.into_iter().collect()
    }
}

/// Builds and edits a lattice and its derived table.
///
/// A builder exclusively owns its definitions, lattice, table and history.
/// It is not meant to be shared between threads; callers serialize access.
///
/// # Example
///
/// ```
/// use latticeconstructor::core::definitions::ElementDefinition;
/// use latticeconstructor::engine::{LatticeBuilder, UndoOutcome};
///
/// let mut builder = LatticeBuilder::new();
/// builder
///     .add_def([
///         ("QF", ElementDefinition::new("KQUAD").with_length(0.342)),
///         ("D", ElementDefinition::new("DRIF").with_length(3.5805)),
///     ])
///     .unwrap();
/// builder.add_element(["QF", "D"]);
/// builder.insert_element_after("QF", 1).unwrap();
/// assert_eq!(builder.lattice(), ["QF", "D", "QF"]);
///
/// assert!(builder.undo().is_restored());
/// assert_eq!(builder.lattice(), ["QF", "D"]);
/// ```
#[derive(Debug)]
pub struct LatticeBuilder {
    pub(crate) state: LatticeState,
    history: History,
    pub(crate) config: Config,
    pub(crate) parser: Box<dyn LatticeParser>,
}

impl Default for LatticeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LatticeBuilder {
    /// Create an empty builder with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create an empty builder using `config`.
    ///
    /// The definition store normalizes families with the configured table.
    pub fn with_config(config: Config) -> Self {
        Self {
            state: LatticeState::new(config.family_table()),
            history: History::new(),
            config,
            parser: Box::new(TextParser),
        }
    }

    /// Replace the parser used by the load operations.
    pub fn with_parser(mut self, parser: impl LatticeParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The complete current state.
    pub fn state(&self) -> &LatticeState {
        &self.state
    }

    /// Element definitions.
    pub fn definitions(&self) -> &DefinitionStore {
        &self.state.definitions
    }

    /// Slot references in beamline order.
    pub fn lattice(&self) -> &[String] {
        &self.state.lattice
    }

    /// The current table, if one has been built.
    pub fn table(&self) -> Option<&LatticeTable> {
        self.state.table()
    }

    /// Explicit positions from the last load, if any.
    pub fn positions(&self) -> Option<&Positions> {
        self.state.positions()
    }

    /// The lattice name from the last load that supplied one.
    pub fn name(&self) -> Option<&str> {
        self.state.name()
    }

    /// Number of operations that can be undone.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// The configuration this builder was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Definitions
    // =========================================================================

    /// Merge element definitions into the store.
    ///
    /// Existing definitions with the same name are overwritten, unnamed
    /// definitions take their key as name, and all stored families are
    /// normalized. If a table already exists it is rebuilt.
    ///
    /// # Errors
    ///
    /// Returns a `DefinitionError` if the batch is empty or any entry lacks a
    /// valid length. Nothing is changed and no snapshot is pushed.
    pub fn add_def<I, K>(&mut self, definitions: I) -> Result<RebuildOutcome, DefinitionError>
    where
        I: IntoIterator<Item = (K, ElementDefinition)>,
        K: Into<String>,
    {
        let batch = DefinitionBatch::new(definitions)?;

        self.snapshot("add_def");
        self.state.definitions.merge(batch);

        if self.state.table.is_some() {
            Ok(self.update_table())
        } else {
            Ok(RebuildOutcome::NotAttempted)
        }
    }

    // =========================================================================
    // Structural edits
    // =========================================================================

    /// Append references to the end of the lattice.
    pub fn add_element(&mut self, refs: impl IntoRefs) -> RebuildOutcome {
        let refs = refs.into_refs();

        self.snapshot("add_element");
        self.state.lattice.extend(refs);
        self.update_table()
    }

    /// Replace one slot.
    ///
    /// With `idx`, the slot at that index is replaced whatever it holds.
    /// Without, the first slot referencing `old` is replaced.
    ///
    /// # Errors
    ///
    /// - `EditError::IndexOutOfRange` if `idx` is past the end
    /// - `EditError::NotInLattice` if `old` is not referenced by any slot
    pub fn replace_element(
        &mut self,
        old: &str,
        new: impl IntoRefs,
        idx: Option<usize>,
    ) -> Result<RebuildOutcome, EditError> {
        let index = match idx {
            Some(index) => self.check_index(index)?,
            None => self
                .state
                .lattice
                .iter()
                .position(|slot| slot == old)
                .ok_or_else(|| EditError::NotInLattice {
                    name: old.to_string(),
                })?,
        };

        self.snapshot("replace_element");
        self.splice(index, index, new.into_refs());
        Ok(self.update_table())
    }

    /// Replace the inclusive slot range `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns `EditError::InvalidRange` unless `start <= end < len`.
    pub fn replace_list(
        &mut self,
        start: usize,
        end: usize,
        new: impl IntoRefs,
    ) -> Result<RebuildOutcome, EditError> {
        self.check_range(start, end)?;

        self.snapshot("replace_list");
        self.splice(start, end, new.into_refs());
        Ok(self.update_table())
    }

    /// Insert references immediately before slot `idx`.
    ///
    /// `idx == len` appends.
    ///
    /// # Errors
    ///
    /// Returns `EditError::IndexOutOfRange` if `idx > len`.
    pub fn insert_element_before(
        &mut self,
        refs: impl IntoRefs,
        idx: usize,
    ) -> Result<RebuildOutcome, EditError> {
        let len = self.state.lattice.len();
        if idx > len {
            return Err(EditError::IndexOutOfRange { index: idx, len });
        }

        self.snapshot("insert_element_before");
        self.insert_at(idx, refs.into_refs());
        Ok(self.update_table())
    }

    /// Insert references immediately after slot `idx`.
    ///
    /// # Errors
    ///
    /// Returns `EditError::IndexOutOfRange` if `idx >= len`.
    pub fn insert_element_after(
        &mut self,
        refs: impl IntoRefs,
        idx: usize,
    ) -> Result<RebuildOutcome, EditError> {
        let index = self.check_index(idx)?;

        self.snapshot("insert_element_after");
        self.insert_at(index + 1, refs.into_refs());
        Ok(self.update_table())
    }

    /// Remove slot `idx`.
    ///
    /// # Errors
    ///
    /// Returns `EditError::IndexOutOfRange` if `idx >= len`.
    pub fn remove_element(&mut self, idx: usize) -> Result<RebuildOutcome, EditError> {
        let index = self.check_index(idx)?;

        self.snapshot("remove_element");
        self.state.lattice.remove(index);
        Ok(self.update_table())
    }

    /// Remove the inclusive slot range `start..=end`.
    ///
    /// # Errors
    ///
    /// Returns `EditError::InvalidRange` unless `start <= end < len`.
    pub fn remove_from_to(&mut self, start: usize, end: usize) -> Result<RebuildOutcome, EditError> {
        self.check_range(start, end)?;

        self.snapshot("remove_from_to");
        self.state.lattice.drain(start..=end);
        Ok(self.update_table())
    }

    /// All slot indices referencing `name`, ascending.
    pub fn get_idx(&self, name: &str) -> Vec<usize> {
        self.state
            .lattice
            .iter()
            .enumerate()
            .filter(|(_, slot)| *slot == name)
            .map(|(i, _)| i)
            .collect()
    }

    // =========================================================================
    // Table and history
    // =========================================================================

    /// Rebuild the table on demand.
    ///
    /// Pushes a snapshot like any other mutating operation.
    pub fn build_table(&mut self) -> RebuildOutcome {
        self.snapshot("build_table");
        self.update_table()
    }

    /// Restore the state before the most recent mutating operation.
    ///
    /// The table is restored as it was captured, not recomputed.
    pub fn undo(&mut self) -> UndoOutcome {
        match self.history.pop() {
            Some(previous) => {
                self.state = previous;
                let remaining = self.history.len();
                tracing::debug!(remaining, "restored previous state");
                UndoOutcome::Restored { remaining }
            }
            None => {
                tracing::warn!("no previous states available");
                UndoOutcome::EmptyHistory
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    pub(crate) fn snapshot(&mut self, operation: &'static str) {
        self.history.push(self.state.clone());
        tracing::debug!(operation, depth = self.history.len(), "pushed history snapshot");
    }

    /// Rebuild the table if every slot is defined; keep the old one otherwise.
    pub(crate) fn update_table(&mut self) -> RebuildOutcome {
        let state = &self.state;
        match build_table(&state.definitions, &state.lattice, state.positions.as_ref()) {
            Ok(table) => {
                let rows = table.len();
                self.state.table = Some(Arc::new(table));
                tracing::debug!(rows, "rebuilt lattice table");
                RebuildOutcome::Rebuilt { rows }
            }
            Err(undefined) => {
                tracing::warn!(%undefined, "table not updated");
                RebuildOutcome::Skipped {
                    undefined: undefined.0,
                }
            }
        }
    }

    fn check_index(&self, index: usize) -> Result<usize, EditError> {
        let len = self.state.lattice.len();
        if index < len {
            Ok(index)
        } else {
            Err(EditError::IndexOutOfRange { index, len })
        }
    }

    fn check_range(&self, start: usize, end: usize) -> Result<(), EditError> {
        let len = self.state.lattice.len();
        if start <= end && end < len {
            Ok(())
        } else {
            Err(EditError::InvalidRange { start, end, len })
        }
    }

    fn splice(&mut self, start: usize, end: usize, refs: Vec<String>) {
        let _replaced: Vec<String> = self.state.lattice.splice(start..=end, refs).collect();
    }

    fn insert_at(&mut self, index: usize, refs: Vec<String>) {
        let _shifted: Vec<String> = self.state.lattice.splice(index..index, refs).collect();
    }
}
