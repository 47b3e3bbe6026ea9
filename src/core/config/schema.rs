//! core::config::schema
//!
//! Configuration schema types.
//!
//! The same schema is used for the user-level file and the project-level
//! file; project values override user values key by key.
//!
//! # Validation
//!
//! Config values are validated after parsing: the dialect must be one of the
//! supported tags and family aliases must name a non-empty family.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::Dialect;

/// Builder configuration file.
///
/// # Example
///
/// ```toml
/// default_dialect = "madx"
/// rebuild_on_load = true
///
/// [families]
/// UNDULATOR = "WIGGLER"
/// KQUAD = "QUADRUPOLE"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BuilderConfig {
    /// Dialect used when loading a file without an explicit dialect
    pub default_dialect: Option<String>,

    /// Rebuild the table right after loading a file
    pub rebuild_on_load: Option<bool>,

    /// Extra raw-to-normalized family aliases
    pub families: Option<BTreeMap<String, String>>,
}

impl BuilderConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dialect) = &self.default_dialect {
            dialect
                .parse::<Dialect>()
                .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        }

        if let Some(families) = &self.families {
            for (raw, normalized) in families {
                if raw.trim().is_empty() {
                    return Err(ConfigError::InvalidValue(
                        "family alias with empty source tag".into(),
                    ));
                }
                if normalized.trim().is_empty() {
                    return Err(ConfigError::InvalidValue(format!(
                        "family alias '{}' maps to an empty family",
                        raw
                    )));
                }
            }
        }

        Ok(())
    }

    /// Layer `other` on top of `self`.
    ///
    /// Scalar values in `other` win; family aliases are merged with `other`
    /// winning on the same source tag.
    pub fn overlay(mut self, other: BuilderConfig) -> BuilderConfig {
        if other.default_dialect.is_some() {
            self.default_dialect = other.default_dialect;
        }
        if other.rebuild_on_load.is_some() {
            self.rebuild_on_load = other.rebuild_on_load;
        }
        if let Some(families) = other.families {
            self.families
                .get_or_insert_with(BTreeMap::new)
                .extend(families);
        }
        self
    }
}
