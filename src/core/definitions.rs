//! core::definitions
//!
//! Element definitions and the store that holds them.
//!
//! # Overview
//!
//! An [`ElementDefinition`] is a named template: a family tag, a length and any
//! number of extra attributes. Lattice slots refer to definitions by name; the
//! same definition may be used by many slots.
//!
//! The [`DefinitionStore`] maps names to definitions. Merging a batch
//! overwrites on name collision, then every stored family is rewritten through
//! the store's injected [`FamilyTable`].
//!
//! # Validation
//!
//! Batches are validated when a [`DefinitionBatch`] is built, so merging can
//! never fail half way. Every entry of a batch must carry a non-negative,
//! finite length.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::families::FamilyTable;
use super::types::{attribute_key, AttrValue, LENGTH_KEY};

/// Errors from definition validation.
#[derive(Debug, Error, PartialEq)]
pub enum DefinitionError {
    #[error("definition batch is empty")]
    EmptyBatch,

    #[error("definition '{name}' has no length (L)")]
    MissingLength { name: String },

    #[error("definition '{name}' has invalid length {value}")]
    InvalidLength { name: String, value: f64 },
}

/// A named element template.
///
/// # Example
///
/// ```
/// use latticeconstructor::core::definitions::ElementDefinition;
/// use latticeconstructor::core::types::AttrValue;
///
/// let qf = ElementDefinition::new("KQUAD")
///     .with_length(0.342)
///     .with_attr("k1", 0.49)
///     .with_attr("n_kicks", 16);
///
/// assert_eq!(qf.family(), "KQUAD");
/// assert_eq!(qf.length(), Some(0.342));
/// assert_eq!(qf.attr("K1"), Some(&AttrValue::Number(0.49)));
/// assert_eq!(qf.name(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    family: String,
    #[serde(default)]
    attributes: IndexMap<String, AttrValue>,
}

impl ElementDefinition {
    /// Create a definition of the given family with no attributes.
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            name: None,
            family: family.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Set the definition's own name.
    ///
    /// Unnamed definitions take their store key when merged.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the length attribute.
    pub fn with_length(self, length: f64) -> Self {
        self.with_attr(LENGTH_KEY, length)
    }

    /// Set an attribute. The key is uppercased.
    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Set an attribute in place. The key is uppercased.
    pub fn set_attr(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.attributes.insert(attribute_key(key), value.into());
    }

    /// The definition's own name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The family tag.
    pub fn family(&self) -> &str {
        &self.family
    }

    /// The length, if present and numeric.
    pub fn length(&self) -> Option<f64> {
        self.attr(LENGTH_KEY).and_then(AttrValue::as_f64)
    }

    /// Look up an attribute by key (case-insensitive).
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(&attribute_key(key))
    }

    /// All attributes in insertion order.
    pub fn attributes(&self) -> &IndexMap<String, AttrValue> {
        &self.attributes
    }

    pub(crate) fn set_family(&mut self, family: String) {
        self.family = family;
    }

    fn with_default_name(mut self, key: &str) -> Self {
        if self.name.is_none() {
            self.name = Some(key.to_string());
        }
        self
    }
}

/// A validated batch of definitions ready to merge.
///
/// # Example
///
/// ```
/// use latticeconstructor::core::definitions::{DefinitionBatch, DefinitionError, ElementDefinition};
///
/// let ok = DefinitionBatch::new([("D", ElementDefinition::new("DRIF").with_length(1.0))]);
/// assert!(ok.is_ok());
///
/// let missing = DefinitionBatch::new([("M", ElementDefinition::new("MARK"))]);
/// assert_eq!(
///     missing.unwrap_err(),
///     DefinitionError::MissingLength { name: "M".into() }
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionBatch {
    entries: IndexMap<String, ElementDefinition>,
}

impl DefinitionBatch {
    /// Validate and collect a batch.
    ///
    /// Later entries with the same key replace earlier ones.
    ///
    /// # Errors
    ///
    /// - `DefinitionError::EmptyBatch` if there are no entries
    /// - `DefinitionError::MissingLength` if any entry has no numeric length
    /// - `DefinitionError::InvalidLength` if any length is negative or not finite
    pub fn new<I, K>(entries: I) -> Result<Self, DefinitionError>
    where
        I: IntoIterator<Item = (K, ElementDefinition)>,
        K: Into<String>,
    {
        let entries: IndexMap<String, ElementDefinition> = entries
            .into_iter()
            .map(|(key, def)| (key.into(), def))
            .collect();

        if entries.is_empty() {
            return Err(DefinitionError::EmptyBatch);
        }

        for (key, def) in &entries {
            match def.length() {
                None => {
                    return Err(DefinitionError::MissingLength { name: key.clone() });
                }
                Some(value) if !value.is_finite() || value < 0.0 => {
                    return Err(DefinitionError::InvalidLength {
                        name: key.clone(),
                        value,
                    });
                }
                Some(_) => {}
            }
        }

        Ok(Self { entries })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; empty batches are rejected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry names in batch order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Name-keyed store of element definitions.
///
/// Definitions are held behind `Arc`, so cloning a store (as the undo history
/// does) shares every definition body until one is modified.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DefinitionStore {
    definitions: IndexMap<String, Arc<ElementDefinition>>,
    families: FamilyTable,
}

impl DefinitionStore {
    /// Create an empty store using the given family table.
    pub fn new(families: FamilyTable) -> Self {
        Self {
            definitions: IndexMap::new(),
            families,
        }
    }

    /// Merge a validated batch.
    ///
    /// Entries overwrite stored definitions with the same key. Unnamed
    /// entries take their key as name. Afterwards every stored family is
    /// passed through the family table.
    pub fn merge(&mut self, batch: DefinitionBatch) {
        for (key, def) in batch.entries {
            let def = def.with_default_name(&key);
            self.definitions.insert(key, Arc::new(def));
        }
        self.normalize_families();
    }

    /// Replace every definition at once.
    ///
    /// No length validation is applied; definitions loaded from files may
    /// omit the length of zero-length elements.
    pub fn replace_all<I, K>(&mut self, definitions: I)
    where
        I: IntoIterator<Item = (K, ElementDefinition)>,
        K: Into<String>,
    {
        self.definitions = definitions
            .into_iter()
            .map(|(key, def)| {
                let key = key.into();
                let def = def.with_default_name(&key);
                (key, Arc::new(def))
            })
            .collect();
        self.normalize_families();
    }

    fn normalize_families(&mut self) {
        let families = &self.families;
        for def in self.definitions.values_mut() {
            let normalized = families.normalize(def.family());
            if normalized != def.family() {
                Arc::make_mut(def).set_family(normalized);
            }
        }
    }

    /// Look up a definition.
    pub fn get(&self, name: &str) -> Option<&ElementDefinition> {
        self.definitions.get(name).map(Arc::as_ref)
    }

    /// Whether a definition with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Stored names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Iterate over `(name, definition)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ElementDefinition)> {
        self.definitions
            .iter()
            .map(|(name, def)| (name.as_str(), def.as_ref()))
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// The family table used for normalization.
    pub fn families(&self) -> &FamilyTable {
        &self.families
    }
}
