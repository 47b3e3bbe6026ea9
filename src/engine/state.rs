//! engine::state
//!
//! The complete mutable state of a lattice builder.
//!
//! A [`LatticeState`] is what the undo history stores: definitions, the
//! ordered slot references, explicit positions, the derived table and the
//! lattice name. Cloning is cheap for the parts that are shared (definition
//! bodies and the table sit behind `Arc`), and a clone never aliases mutable
//! data of the original.

use std::sync::Arc;

use crate::core::definitions::DefinitionStore;
use crate::core::families::FamilyTable;
use crate::core::positions::Positions;
use crate::core::table::LatticeTable;

/// Builder state captured by each history snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LatticeState {
    pub(crate) definitions: DefinitionStore,
    pub(crate) lattice: Vec<String>,
    pub(crate) positions: Option<Positions>,
    pub(crate) table: Option<Arc<LatticeTable>>,
    pub(crate) name: Option<String>,
}

impl LatticeState {
    /// An empty state whose definition store uses `families`.
    pub fn new(families: FamilyTable) -> Self {
        Self {
            definitions: DefinitionStore::new(families),
            ..Default::default()
        }
    }

    /// Element definitions.
    pub fn definitions(&self) -> &DefinitionStore {
        &self.definitions
    }

    /// Slot references in beamline order.
    pub fn lattice(&self) -> &[String] {
        &self.lattice
    }

    /// Explicit positions, if a source supplied them.
    pub fn positions(&self) -> Option<&Positions> {
        self.positions.as_ref()
    }

    /// The derived table, if one has been built.
    pub fn table(&self) -> Option<&LatticeTable> {
        self.table.as_deref()
    }

    /// The lattice name, if a source supplied one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}
