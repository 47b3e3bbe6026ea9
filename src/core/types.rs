//! core::types
//!
//! Small value types shared by the definition store, the table and the parsers.
//!
//! # Types
//!
//! - [`AttrValue`] - A single element attribute (number, text or flag)
//! - [`Dialect`] - One of the supported lattice source formats
//!
//! # Column names
//!
//! Element attributes are keyed by uppercase names, so the lowercase reserved
//! columns [`NAME_COLUMN`], [`FAMILY_COLUMN`] and [`AT_COLUMN`] can never
//! collide with a user attribute. [`LENGTH_KEY`] is the attribute that drives
//! position accumulation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Table column holding the slot's element reference.
pub const NAME_COLUMN: &str = "name";

/// Table column holding the normalized element family.
pub const FAMILY_COLUMN: &str = "family";

/// Table column holding the longitudinal centroid position.
pub const AT_COLUMN: &str = "at";

/// Attribute key for the element length.
pub const LENGTH_KEY: &str = "L";

/// Normalize an attribute key.
///
/// ```
/// use latticeconstructor::core::types::attribute_key;
///
/// assert_eq!(attribute_key(" k1 "), "K1");
/// assert_eq!(attribute_key("n_kicks"), "N_KICKS");
/// ```
pub fn attribute_key(key: &str) -> String {
    key.trim().to_ascii_uppercase()
}

/// A single attribute value of an element definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Real-valued parameter (lengths, strengths, counts).
    Number(f64),
    /// Free-form text (file names, modes).
    Text(String),
    /// Boolean flag.
    Bool(bool),
}

impl AttrValue {
    /// The numeric value, if this is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The text value, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The flag value, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Number(f64::from(v))
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Number(f64::from(v))
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Number(n) => write!(f, "{}", n),
            AttrValue::Text(s) => write!(f, "{}", s),
            AttrValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Error for a dialect tag outside the supported set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported dialect '{0}', expected one of: lte, madx")]
pub struct UnknownDialect(pub String);

/// Supported lattice source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// elegant lattice files (`.lte`).
    #[default]
    Lte,
    /// MAD-X lattice files.
    Madx,
}

impl Dialect {
    /// All supported dialects.
    pub const ALL: [Dialect; 2] = [Dialect::Lte, Dialect::Madx];

    /// The tag used in configuration and on load calls.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Lte => "lte",
            Dialect::Madx => "madx",
        }
    }
}

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lte" => Ok(Dialect::Lte),
            "madx" => Ok(Dialect::Madx),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
