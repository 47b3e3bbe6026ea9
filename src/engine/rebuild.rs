//! engine::rebuild
//!
//! Derivation of the lattice table.
//!
//! # Algorithm
//!
//! 1. Every slot reference must name a stored definition. Otherwise nothing
//!    is built and the undefined names are reported.
//! 2. One row per slot: the definition's family and attributes, with the
//!    slot reference as `name`.
//! 3. Null lengths are coerced to `0.0`, so zero-length markers need no `L`.
//! 4. `at` comes from explicit positions when they match the lattice slot for
//!    slot; otherwise it is the element centroid with elements abutting end to
//!    end: `sum(L[0..=i]) - L[i] / 2`.
//!
//! The table is always built from scratch; nothing is patched in place.

use std::collections::BTreeSet;
use std::fmt;

use crate::core::definitions::{DefinitionStore, ElementDefinition};
use crate::core::positions::Positions;
use crate::core::table::{LatticeTable, Row};
use crate::core::types::{AttrValue, AT_COLUMN, FAMILY_COLUMN, LENGTH_KEY, NAME_COLUMN};

/// Slot references that have no definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndefinedReferences(pub BTreeSet<String>);

impl fmt::Display for UndefinedReferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(String::as_str).collect();
        write!(f, "lattice references undefined elements: {}", names.join(", "))
    }
}

impl std::error::Error for UndefinedReferences {}

impl UndefinedReferences {
    /// Collect every reference in `lattice` missing from `store`.
    pub fn find<S: AsRef<str>>(store: &DefinitionStore, lattice: &[S]) -> Self {
        Self(
            lattice
                .iter()
                .map(|slot| slot.as_ref())
                .filter(|name| !store.contains(name))
                .map(str::to_string)
                .collect(),
        )
    }

    /// Whether there are no undefined references.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What happened to the table after an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// The table was rebuilt with this many rows.
    Rebuilt { rows: usize },
    /// The lattice references undefined elements; the previous table was kept.
    Skipped { undefined: BTreeSet<String> },
    /// No rebuild was attempted.
    NotAttempted,
}

impl RebuildOutcome {
    /// Whether the table was rebuilt.
    pub fn is_rebuilt(&self) -> bool {
        matches!(self, RebuildOutcome::Rebuilt { .. })
    }

    /// The undefined references, if the rebuild was skipped.
    pub fn undefined(&self) -> Option<&BTreeSet<String>> {
        match self {
            RebuildOutcome::Skipped { undefined } => Some(undefined),
            _ => None,
        }
    }
}

/// Build the lattice table.
///
/// Explicit `positions` are used only when they are aligned with `lattice`.
///
/// # Errors
///
/// Returns the set of undefined references if any slot names a missing
/// definition. This is an expected state while a lattice is assembled
/// definition by definition.
///
/// # Example
///
/// ```
/// use latticeconstructor::core::definitions::{DefinitionBatch, DefinitionStore, ElementDefinition};
/// use latticeconstructor::engine::rebuild::build_table;
///
/// let mut store = DefinitionStore::default();
/// store.merge(DefinitionBatch::new([("D", ElementDefinition::new("DRIF").with_length(2.0))]).unwrap());
///
/// let table = build_table(&store, &["D", "D"], None).unwrap();
/// assert_eq!(table.number_column("at").unwrap(), vec![Some(1.0), Some(3.0)]);
///
/// let err = build_table(&store, &["D", "Q"], None).unwrap_err();
/// assert!(err.0.contains("Q"));
/// ```
pub fn build_table<S: AsRef<str>>(
    store: &DefinitionStore,
    lattice: &[S],
    positions: Option<&Positions>,
) -> Result<LatticeTable, UndefinedReferences> {
    let Some(definitions) = lattice
        .iter()
        .map(|slot| store.get(slot.as_ref()))
        .collect::<Option<Vec<_>>>()
    else {
        return Err(UndefinedReferences::find(store, lattice));
    };

    let rows = lattice
        .iter()
        .zip(definitions)
        .map(|(slot, def)| slot_row(slot.as_ref(), def));
    let mut table = LatticeTable::from_rows(rows);

    let coerced = table.fill_non_numeric(LENGTH_KEY, AttrValue::Number(0.0));
    if coerced > 0 {
        tracing::debug!(coerced, "treated missing or non-numeric lengths as zero");
    }

    match positions {
        Some(positions) if positions.aligned_with(lattice) => {
            let at = positions.at_values();
            table.derive_column(AT_COLUMN, |i| Some(AttrValue::Number(at[i])));
        }
        other => {
            if other.is_some() {
                tracing::debug!("explicit positions do not match the lattice, accumulating lengths");
            }
            let ends = table.cumsum(LENGTH_KEY);
            let lengths = table
                .number_column(LENGTH_KEY)
                .unwrap_or_else(|| vec![None; table.len()]);
            table.derive_column(AT_COLUMN, |i| match (ends[i], lengths[i]) {
                (Some(end), Some(length)) => Some(AttrValue::Number(end - length / 2.0)),
                _ => None,
            });
        }
    }

    Ok(table)
}

/// One table row for a slot. The slot reference overrides the definition name.
fn slot_row(slot: &str, def: &ElementDefinition) -> Row {
    let mut row = Row::with_capacity(def.attributes().len() + 2);
    row.insert(NAME_COLUMN.to_string(), AttrValue::from(slot));
    row.insert(
        FAMILY_COLUMN.to_string(),
        AttrValue::from(def.family().to_string()),
    );
    for (key, value) in def.attributes() {
        row.insert(key.clone(), value.clone());
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DefinitionStore {
        let mut store = DefinitionStore::default();
        store.replace_all([
            ("Q", ElementDefinition::new("KQUAD").with_length(1.0).with_attr("K1", 0.5)),
            ("D", ElementDefinition::new("DRIF").with_length(2.0)),
            ("M", ElementDefinition::new("MARK")),
        ]);
        store
    }

    fn at(table: &LatticeTable) -> Vec<f64> {
        table
            .number_column(AT_COLUMN)
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    #[test]
    fn centroids_of_abutting_elements() {
        let table = build_table(&store(), &["Q", "D", "Q"], None).unwrap();
        assert_eq!(at(&table), vec![0.5, 2.0, 3.5]);
    }

    #[test]
    fn missing_length_is_zero() {
        let table = build_table(&store(), &["M", "Q", "M", "D"], None).unwrap();
        assert_eq!(at(&table), vec![0.0, 0.5, 1.0, 2.0]);
        assert_eq!(table.value(0, LENGTH_KEY), Some(&AttrValue::Number(0.0)));
        assert!(!table.has_nulls(LENGTH_KEY));
    }

    #[test]
    fn non_numeric_length_is_zero() {
        let mut store = store();
        store.replace_all([
            ("Q", ElementDefinition::new("KQUAD").with_length(1.0)),
            ("D", ElementDefinition::new("DRIF").with_attr(LENGTH_KEY, "abc")),
        ]);
        let table = build_table(&store, &["Q", "D", "Q"], None).unwrap();
        assert_eq!(at(&table), vec![0.5, 1.0, 1.5]);
        assert_eq!(table.value(1, LENGTH_KEY), Some(&AttrValue::Number(0.0)));
        assert!(!table.has_nulls(AT_COLUMN));
    }

    #[test]
    fn slot_reference_becomes_row_name() {
        let table = build_table(&store(), &["Q", "D"], None).unwrap();
        assert_eq!(table.value(0, NAME_COLUMN), Some(&AttrValue::from("Q")));
        assert_eq!(
            table.value(0, FAMILY_COLUMN),
            Some(&AttrValue::from("QUADRUPOLE"))
        );
        assert_eq!(table.value(1, "K1"), None);
    }

    #[test]
    fn undefined_references_are_reported() {
        let err = build_table(&store(), &["Q", "X", "Y", "X"], None).unwrap_err();
        let expected: BTreeSet<String> = ["X", "Y"].into_iter().map(String::from).collect();
        assert_eq!(err.0, expected);
        assert!(err.to_string().contains("X, Y"));
    }

    #[test]
    fn aligned_positions_are_used() {
        let positions: Positions = [("Q", 10.0), ("D", 20.0)].into_iter().collect();
        let table = build_table(&store(), &["Q", "D"], Some(&positions)).unwrap();
        assert_eq!(at(&table), vec![10.0, 20.0]);
    }

    #[test]
    fn misaligned_positions_fall_back_to_accumulation() {
        let positions: Positions = [("Q", 10.0)].into_iter().collect();
        let table = build_table(&store(), &["Q", "D"], Some(&positions)).unwrap();
        assert_eq!(at(&table), vec![0.5, 2.0]);
    }

    #[test]
    fn empty_lattice_builds_empty_table() {
        let table = build_table::<&str>(&store(), &[], None).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn outcome_accessors() {
        assert!(RebuildOutcome::Rebuilt { rows: 1 }.is_rebuilt());
        assert!(RebuildOutcome::NotAttempted.undefined().is_none());
        let skipped = RebuildOutcome::Skipped {
            undefined: BTreeSet::from(["A".to_string()]),
        };
        assert!(!skipped.is_rebuilt());
        assert_eq!(skipped.undefined().unwrap().len(), 1);
    }
}
