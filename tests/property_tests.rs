//! Property-based tests for the builder.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated lattices and edit sequences.

use proptest::prelude::*;

use latticeconstructor::core::definitions::{DefinitionStore, ElementDefinition};
use latticeconstructor::core::positions::Positions;
use latticeconstructor::core::types::AT_COLUMN;
use latticeconstructor::engine::{build_table, LatticeBuilder};

const NAMES: [&str; 5] = ["QF", "QD", "D", "B", "M"];

/// Strategy for a slot reference, sometimes undefined.
fn slot_ref() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => prop::sample::select(NAMES.to_vec()).prop_map(str::to_string),
        1 => Just("UNDEFINED".to_string()),
    ]
}

/// Strategy for a slot reference that is always defined.
fn defined_ref() -> impl Strategy<Value = String> {
    prop::sample::select(NAMES.to_vec()).prop_map(str::to_string)
}

/// Strategy for element lengths, including zero.
fn length() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.0), 0.0f64..10.0]
}

fn builder_with(lengths: &[f64]) -> LatticeBuilder {
    let mut builder = LatticeBuilder::new();
    builder
        .add_def(
            NAMES
                .iter()
                .zip(lengths)
                .map(|(name, l)| (*name, ElementDefinition::new("DRIF").with_length(*l))),
        )
        .expect("valid definitions");
    builder
}

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<String>),
    InsertBefore(Vec<String>, usize),
    InsertAfter(Vec<String>, usize),
    Replace(usize, Vec<String>),
    ReplaceList(usize, usize, Vec<String>),
    Remove(usize),
    RemoveRange(usize, usize),
    Define(String, f64),
    Build,
}

fn refs() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(slot_ref(), 0..4)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        refs().prop_map(Op::Add),
        (refs(), 0usize..12).prop_map(|(r, i)| Op::InsertBefore(r, i)),
        (refs(), 0usize..12).prop_map(|(r, i)| Op::InsertAfter(r, i)),
        (0usize..12, refs()).prop_map(|(i, r)| Op::Replace(i, r)),
        (0usize..12, 0usize..12, refs()).prop_map(|(s, e, r)| Op::ReplaceList(s, e, r)),
        (0usize..12).prop_map(Op::Remove),
        (0usize..12, 0usize..12).prop_map(|(s, e)| Op::RemoveRange(s, e)),
        (prop::sample::select(vec!["UNDEFINED", "QF", "X"]), length())
            .prop_map(|(n, l)| Op::Define(n.to_string(), l)),
        Just(Op::Build),
    ]
}

/// Apply an operation; returns whether it succeeded.
fn apply(builder: &mut LatticeBuilder, op: &Op) -> bool {
    match op {
        Op::Add(r) => {
            builder.add_element(r.clone());
            true
        }
        Op::InsertBefore(r, i) => builder.insert_element_before(r.clone(), *i).is_ok(),
        Op::InsertAfter(r, i) => builder.insert_element_after(r.clone(), *i).is_ok(),
        Op::Replace(i, r) => builder.replace_element("", r.clone(), Some(*i)).is_ok(),
        Op::ReplaceList(s, e, r) => builder.replace_list(*s, *e, r.clone()).is_ok(),
        Op::Remove(i) => builder.remove_element(*i).is_ok(),
        Op::RemoveRange(s, e) => builder.remove_from_to(*s, *e).is_ok(),
        Op::Define(n, l) => builder
            .add_def([(n.clone(), ElementDefinition::new("KQUAD").with_length(*l))])
            .is_ok(),
        Op::Build => {
            builder.build_table();
            true
        }
    }
}

proptest! {
    /// Without explicit positions, `at` is the running length minus half
    /// the slot's own length.
    #[test]
    fn at_is_centroid_of_accumulated_length(
        lengths in prop::collection::vec(length(), NAMES.len()),
        lattice in prop::collection::vec(defined_ref(), 0..30),
    ) {
        let mut builder = builder_with(&lengths);
        builder.add_element(lattice.clone());
        let table = builder.table().expect("every slot is defined");

        let at = table.number_column(AT_COLUMN).expect("at column");
        let l = table.number_column("L").expect("L column");
        prop_assert_eq!(at.len(), lattice.len());

        let mut running = 0.0;
        for (at, l) in at.iter().zip(&l) {
            let (at, l) = (at.expect("at"), l.expect("L"));
            running += l;
            prop_assert!((at - (running - l / 2.0)).abs() < 1e-9);
        }
    }

    /// Missing lengths are read as zero and never leave nulls behind.
    #[test]
    fn missing_lengths_are_zero(
        with_length in prop::collection::vec(any::<bool>(), NAMES.len()),
        lattice in prop::collection::vec(defined_ref(), 1..20),
    ) {
        let mut store = DefinitionStore::default();
        store.replace_all(NAMES.iter().zip(&with_length).map(|(name, has)| {
            let def = ElementDefinition::new("MARK");
            (*name, if *has { def.with_length(1.0) } else { def })
        }));

        let table = build_table(&store, &lattice[..], None).expect("all defined");
        prop_assert!(!table.has_nulls("L"));
        for (slot, l) in lattice.iter().zip(table.number_column("L").expect("L")) {
            let index = NAMES.iter().position(|n| *n == slot.as_str()).expect("known name");
            let expected = if with_length[index] { 1.0 } else { 0.0 };
            prop_assert_eq!(l, Some(expected));
        }
    }

    /// The table is replaced only when every reference is defined.
    #[test]
    fn table_only_changes_when_fully_defined(
        first in prop::collection::vec(defined_ref(), 1..10),
        more in prop::collection::vec(slot_ref(), 1..10),
    ) {
        let mut builder = builder_with(&[1.0; NAMES.len()]);
        builder.add_element(first);
        let before = builder.table().cloned();

        let outcome = builder.add_element(more.clone());
        let has_undefined = more.iter().any(|r| r == "UNDEFINED");

        prop_assert_eq!(outcome.is_rebuilt(), !has_undefined);
        if has_undefined {
            prop_assert_eq!(builder.table().cloned(), before);
        } else {
            prop_assert_eq!(builder.table().map(|t| t.len()), Some(builder.lattice().len()));
        }
    }

    /// Every successful operation pushes exactly one snapshot, failed ones
    /// none, and undoing all of them restores the starting state.
    #[test]
    fn undo_reverses_any_edit_sequence(ops in prop::collection::vec(op(), 0..25)) {
        let mut builder = builder_with(&[0.5, 1.0, 1.5, 2.0, 0.0]);
        let start = builder.state().clone();
        let base = builder.history_len();

        let mut succeeded = 0;
        for op in &ops {
            let state = builder.state().clone();
            if apply(&mut builder, op) {
                succeeded += 1;
            } else {
                prop_assert_eq!(builder.state(), &state);
            }
            prop_assert_eq!(builder.history_len(), base + succeeded);
        }

        for _ in 0..succeeded {
            prop_assert!(builder.undo().is_restored());
        }
        prop_assert_eq!(builder.state(), &start);
    }

    /// Explicit positions are used exactly when they line up with the lattice.
    #[test]
    fn aligned_positions_override_accumulation(
        lattice in prop::collection::vec(defined_ref(), 1..15),
        offsets in prop::collection::vec(0.0f64..5.0, 15),
    ) {
        let store = {
            let mut store = DefinitionStore::default();
            store.replace_all(NAMES.iter().map(|n| (*n, ElementDefinition::new("DRIF").with_length(1.0))));
            store
        };

        let mut running = 0.0;
        let positions: Positions = lattice
            .iter()
            .zip(&offsets)
            .map(|(slot, offset)| {
                running += offset;
                (slot.clone(), running)
            })
            .collect();

        let table = build_table(&store, &lattice[..], Some(&positions)).expect("all defined");
        let at: Vec<f64> = table
            .number_column(AT_COLUMN)
            .expect("at")
            .into_iter()
            .map(|v| v.expect("at"))
            .collect();
        prop_assert_eq!(at, positions.at_values());

        let shorter = &lattice[..lattice.len() - 1];
        let table = build_table(&store, shorter, Some(&positions)).expect("all defined");
        let expected: Vec<Option<f64>> = (0..shorter.len()).map(|i| Some(i as f64 + 0.5)).collect();
        prop_assert_eq!(table.number_column(AT_COLUMN).expect("at"), expected);
    }
}
