//! engine
//!
//! The lattice builder and the machinery behind it.
//!
//! # Architecture
//!
//! The [`LatticeBuilder`] owns the definition store, the ordered slot
//! references, the derived table and the undo history. Every mutating
//! operation runs the same lifecycle:
//!
//! ```text
//! Validate -> Snapshot -> Apply -> Rebuild
//! ```
//!
//! # Modules
//!
//! - [`builder`] - The builder and its structural edit operations
//! - [`rebuild`] - Table derivation and rebuild gating
//! - [`history`] - Snapshot stack backing undo
//! - [`state`] - The state captured by each snapshot
//! - [`load`] - Loading lattices from source text
//!
//! # Invariants
//!
//! - Failed operations change neither the state nor the history
//! - A rebuild is skipped, never partial, when references are undefined
//! - N operations followed by N undos restore the original state exactly

pub mod builder;
pub mod history;
pub mod load;
pub mod rebuild;
pub mod state;

pub use builder::{EditError, IntoRefs, LatticeBuilder};
pub use history::{History, UndoOutcome};
pub use load::LoadError;
pub use rebuild::{build_table, RebuildOutcome, UndefinedReferences};
pub use state::LatticeState;
