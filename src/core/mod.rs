//! core
//!
//! Core domain types, the definition store, the structured table and
//! configuration.
//!
//! # Modules
//!
//! - [`types`] - Attribute values, dialect tags and reserved column names
//! - [`families`] - Element family conversion table
//! - [`definitions`] - Element definitions and the definition store
//! - [`positions`] - Explicit element positions from sequence-style sources
//! - [`table`] - Column-major structured table holding the derived lattice table
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Lookup tables are values, injected where they are used
//! - The table is derived data; nothing here patches it incrementally
//! - All computations are deterministic

pub mod config;
pub mod definitions;
pub mod families;
pub mod positions;
pub mod table;
pub mod types;
