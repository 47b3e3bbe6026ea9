//! Integration tests for loading lattice files.
//!
//! These tests write lte and madx sources into temporary directories and
//! load them through the builder, checking the resulting tables.

use assert_fs::prelude::*;
use assert_fs::TempDir;

use latticeconstructor::core::config::{Config, PROJECT_FILE};
use latticeconstructor::core::table::LatticeTable;
use latticeconstructor::core::types::{AttrValue, Dialect, AT_COLUMN, FAMILY_COLUMN};
use latticeconstructor::engine::{LatticeBuilder, LoadError, RebuildOutcome};
use latticeconstructor::parse::parse_str;
use latticeconstructor::LatticeError;

// =============================================================================
// Test Helpers
// =============================================================================

const FODO_LTE: &str = "\
! FODO cell with a watch point
W1: WATCH, L=0, FILENAME=\"%s-%03ld.w1\", MODE=\"coordinates\"
QF: KQUAD, L=0.342, K1=0.4900, N_KICKS=16
QD: KQUAD, L=0.668, K1=-0.4999, &
    N_KICKS=16
D:  DRIF, L=3.5805
FODO: LINE=(W1, QF, D, QD, D, QF)
USE, FODO
RETURN
";

const RING_MADX: &str = "\
// two quadrupoles placed explicitly
lq = 1.0;
qf: QUADRUPOLE, L=lq, K1=0.25;
qd: QUADRUPOLE, L=lq, K1=-0.25;
ring: SEQUENCE, L=10, REFER=CENTRE;
  qf, AT=2;
  qd, AT=7;
ENDSEQUENCE;
USE, SEQUENCE=ring;
";

fn at_values(table: &LatticeTable) -> Vec<f64> {
    table
        .number_column(AT_COLUMN)
        .expect("at column")
        .into_iter()
        .map(|v| v.expect("at is never null"))
        .collect()
}

fn assert_all_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-9, "{:?} vs {:?}", actual, expected);
    }
}

// =============================================================================
// lte
// =============================================================================

#[test]
fn lte_file_loads_and_builds() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("fodo.lte");
    file.write_str(FODO_LTE).unwrap();

    let mut builder = LatticeBuilder::new();
    let outcome = builder.load_from_file(file.path(), "lte").unwrap();
    assert_eq!(outcome, RebuildOutcome::NotAttempted);
    assert!(builder.table().is_none());
    assert_eq!(builder.name(), Some("FODO"));
    assert_eq!(builder.lattice(), ["W1", "QF", "D", "QD", "D", "QF"]);

    assert!(builder.build_table().is_rebuilt());
    let table = builder.table().unwrap();
    assert_all_close(
        &at_values(table),
        &[0.0, 0.171, 2.13225, 4.2565, 6.38075, 8.342],
    );
    assert_eq!(
        table.value(0, FAMILY_COLUMN),
        Some(&AttrValue::Text("MARKER".into()))
    );
    assert_eq!(
        table.value(0, "MODE"),
        Some(&AttrValue::Text("coordinates".into()))
    );
    assert_eq!(table.value(3, "N_KICKS"), Some(&AttrValue::Number(16.0)));
}

#[test]
fn lte_parse_error_names_file_and_line() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("broken.lte");
    file.write_str("D: DRIF, L=1\nQ: KQUAD, L=0.5 *\n").unwrap();

    let mut builder = LatticeBuilder::new();
    builder.add_element("X");
    let before = builder.state().clone();

    let err = builder.load_from_file(file.path(), "lte").unwrap_err();
    match &err {
        LoadError::ParseFile { path, source } => {
            assert_eq!(path, file.path());
            assert_eq!(source.line, 2);
        }
        other => panic!("expected ParseFile, got {:?}", other),
    }
    assert!(err.to_string().contains("broken.lte"));
    assert_eq!(builder.state(), &before);
    assert_eq!(builder.history_len(), 1);
}

#[test]
fn edits_after_load_rebuild_and_undo_back_to_load() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("fodo.lte");
    file.write_str(FODO_LTE).unwrap();

    let mut builder = LatticeBuilder::new();
    builder.load_from_file(file.path(), "LTE").unwrap();
    let loaded = builder.state().clone();

    builder.remove_element(0).unwrap();
    assert_eq!(builder.table().map(LatticeTable::len), Some(5));

    builder.undo();
    assert_eq!(builder.state(), &loaded);
    builder.undo();
    assert!(builder.lattice().is_empty());
    assert_eq!(builder.name(), None);
}

// =============================================================================
// madx
// =============================================================================

#[test]
fn madx_sequence_positions_drive_at() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("ring.madx");
    file.write_str(RING_MADX).unwrap();

    let mut builder = LatticeBuilder::new();
    builder.load_from_file(file.path(), "madx").unwrap();
    assert_eq!(builder.name(), Some("RING"));
    assert_eq!(builder.positions().map(|p| p.at_values()), Some(vec![2.0, 7.0]));

    builder.build_table();
    assert_all_close(&at_values(builder.table().unwrap()), &[2.0, 7.0]);
}

#[test]
fn structural_edit_falls_back_to_accumulated_positions() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("ring.madx");
    file.write_str(RING_MADX).unwrap();

    let mut builder = LatticeBuilder::new();
    builder.load_from_file(file.path(), "madx").unwrap();
    builder.build_table();

    builder.add_element("QF");
    assert_all_close(&at_values(builder.table().unwrap()), &[0.5, 1.5, 2.5]);

    builder.undo();
    assert_all_close(&at_values(builder.table().unwrap()), &[2.0, 7.0]);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn project_config_sets_default_dialect_and_rebuild() {
    let dir = TempDir::new().unwrap();
    dir.child(PROJECT_FILE)
        .write_str("default_dialect = \"madx\"\nrebuild_on_load = true\n\n[families]\nMONITOR = \"INSTRUMENT\"\n")
        .unwrap();
    let file = dir.child("ring.seq");
    file.write_str(
        "bpm: MONITOR;\nd: DRIFT, L=1;\ns: SEQUENCE, L=2;\nd, AT=0.5;\nbpm, AT=1;\nENDSEQUENCE;\n",
    )
    .unwrap();

    let config = Config::default()
        .with_file(dir.child(PROJECT_FILE).path())
        .unwrap();
    assert_eq!(config.loaded_from().len(), 1);

    let mut builder = LatticeBuilder::with_config(config);
    let outcome = builder.load_from_file_default(file.path()).unwrap();
    assert_eq!(outcome, RebuildOutcome::Rebuilt { rows: 2 });
    assert_eq!(
        builder.table().unwrap().value(1, FAMILY_COLUMN),
        Some(&AttrValue::Text("INSTRUMENT".into()))
    );
}

#[test]
fn invalid_project_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = dir.child(PROJECT_FILE);
    file.write_str("default_dialect = \"tfs\"\n").unwrap();

    assert!(Config::default().with_file(file.path()).is_err());
}

#[test]
fn unsupported_dialect_is_rejected_before_reading() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("ring.tfs");
    file.write_str(RING_MADX).unwrap();

    let mut builder = LatticeBuilder::new();
    let err = builder.load_from_file(file.path(), "tfs").unwrap_err();
    assert!(matches!(err, LoadError::UnsupportedDialect(_)));
    assert_eq!(builder.history_len(), 0);
}

#[test]
fn parse_errors_propagate_as_lattice_error() {
    fn slots(source: &str) -> Result<usize, LatticeError> {
        let parsed = parse_str(source, Dialect::Madx)?;
        Ok(parsed.lattice.len())
    }

    assert_eq!(slots(RING_MADX).unwrap(), 2);
    let err = slots("d: DRIFT, L=1 +;\n").unwrap_err();
    assert!(matches!(err, LatticeError::Parse(ref e) if e.line == 1));
}
