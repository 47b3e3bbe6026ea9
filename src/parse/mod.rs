//! parse
//!
//! Text parsers for lattice description files.
//!
//! # Overview
//!
//! A [`LatticeParser`] turns source text in a given [`Dialect`] into a
//! [`ParsedLattice`]: element definitions, the flattened slot sequence,
//! optional explicit positions and an optional lattice name. The builder
//! only depends on the trait; [`TextParser`] is the built-in implementation.
//!
//! # Dialects
//!
//! - `lte` - elegant lattice files. Element types are mapped to MAD-X
//!   family names; the lattice is the `USE`d line, else the last line.
//! - `madx` - MAD-X sequence files. A `SEQUENCE` block yields explicit
//!   element positions and names the lattice.
//!
//! # Modules
//!
//! - `lexer` - Tokenizer for both dialects
//! - `parser` - Recursive descent over the token stream
//! - `lines` - Beam line expansion
//! - `expr` - Variables, functions and the RPN calculator

mod expr;
mod lexer;
mod lines;
mod parser;

use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::core::definitions::ElementDefinition;
use crate::core::positions::Positions;
use crate::core::types::Dialect;

/// Malformed source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at {line}:{column}: {message}")]
pub struct ParseError {
    /// 1-based line.
    pub line: usize,
    /// 1-based column.
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Everything a parser extracts from one source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedLattice {
    /// Lattice name, when the source names one.
    pub name: Option<String>,
    /// Explicit element centres, parallel to `lattice`.
    pub positions: Option<Positions>,
    /// Definitions keyed by uppercased name, in definition order.
    pub definitions: IndexMap<String, ElementDefinition>,
    /// Flattened slot references.
    pub lattice: Vec<String>,
}

/// Source text to lattice conversion.
pub trait LatticeParser: fmt::Debug {
    /// Parse `source` written in `dialect`.
    fn parse(&self, source: &str, dialect: Dialect) -> Result<ParsedLattice, ParseError>;
}

/// Built-in parser for the lte and madx dialects.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextParser;

impl LatticeParser for TextParser {
    fn parse(&self, source: &str, dialect: Dialect) -> Result<ParsedLattice, ParseError> {
        parser::parse(source, dialect)
    }
}

/// Parse `source` with the built-in parser.
///
/// # Example
///
/// ```
/// use latticeconstructor::core::types::Dialect;
/// use latticeconstructor::parse::parse_str;
///
/// let parsed = parse_str(
///     "QF: QUADRUPOLE, L=0.5, K1=0.2;\n\
///      RING: SEQUENCE, L=4;\n\
///      QF, AT=1;\n\
///      QF, AT=3;\n\
///      ENDSEQUENCE;\n",
///     Dialect::Madx,
/// )
/// .unwrap();
///
/// assert_eq!(parsed.name.as_deref(), Some("RING"));
/// assert_eq!(parsed.lattice, ["QF", "QF"]);
/// assert_eq!(parsed.positions.unwrap().at_values(), [1.0, 3.0]);
/// ```
pub fn parse_str(source: &str, dialect: Dialect) -> Result<ParsedLattice, ParseError> {
    TextParser.parse(source, dialect)
}
