//! latticeconstructor - Build and edit particle-accelerator lattice tables
//!
//! A lattice is an ordered sequence of named beamline elements (magnets,
//! drifts, cavities, monitors). This crate keeps the element definitions and
//! the ordering together, derives a positional table (each element's
//! longitudinal centroid `at`), supports incremental editing with a linear
//! undo history, and loads lattices from elegant (`.lte`) and MAD-X files.
//!
//! # Architecture
//!
//! - [`core`] - Domain types, the definition store, the structured table and configuration
//! - [`engine`] - The lattice builder: structural edits, table rebuild, undo history
//! - [`parse`] - Text parsers for the supported lattice dialects
//!
//! # Correctness Invariants
//!
//! 1. The table is always fully recomputed from definitions, lattice and positions
//! 2. A rebuild never happens while the lattice references undefined elements
//! 3. Every mutating operation is undoable; failed operations leave no trace
//!
//! # Example
//!
//! ```
//! use latticeconstructor::core::definitions::ElementDefinition;
//! use latticeconstructor::engine::LatticeBuilder;
//!
//! let mut builder = LatticeBuilder::new();
//! builder
//!     .add_def([
//!         ("QF", ElementDefinition::new("KQUAD").with_length(0.342).with_attr("K1", 0.49)),
//!         ("D", ElementDefinition::new("DRIF").with_length(3.5805)),
//!     ])
//!     .unwrap();
//! builder.add_element(["QF", "D", "QF"]);
//!
//! let table = builder.table().unwrap();
//! assert_eq!(table.len(), 3);
//! assert_eq!(builder.get_idx("QF"), vec![0, 2]);
//! ```

pub mod core;
pub mod engine;
pub mod parse;

use thiserror::Error;

pub use crate::core::config::ConfigError;
pub use crate::core::definitions::DefinitionError;
pub use crate::engine::builder::EditError;
pub use crate::engine::LoadError;
pub use crate::parse::ParseError;

/// Any error produced by this crate.
///
/// Each operation returns its own narrower error type; this enum exists for
/// callers that want a single type to propagate with `?`.
#[derive(Debug, Error)]
pub enum LatticeError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
