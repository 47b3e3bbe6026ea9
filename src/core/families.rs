//! core::families
//!
//! Element family conversion.
//!
//! Source dialects name the same kind of element differently (elegant's
//! `KQUAD` and `DRIF` are MAD-X's `QUADRUPOLE` and `DRIFT`). A [`FamilyTable`]
//! rewrites raw family tags into the normalized MAD-X vocabulary.
//!
//! # Invariants
//!
//! - Tables are immutable once built; extending one produces a new table
//! - Tags without a mapping pass through unchanged
//! - Normalization is idempotent for every table built here

use std::collections::BTreeMap;
use std::sync::Arc;

/// The fixed conversion table used by the definition store.
const STANDARD: [(&str, &str); 10] = [
    ("KQUAD", "QUADRUPOLE"),
    ("KSEXT", "SEXTUPOLE"),
    ("DRIF", "DRIFT"),
    ("RFCA", "RFCAVITY"),
    ("CSBEND", "SBEND"),
    ("MONI", "MONITOR"),
    ("WATCH", "MARKER"),
    ("EVKICK", "VKICKER"),
    ("EHKICK", "HKICKER"),
    ("MARK", "MARKER"),
];

/// Additional elegant element types understood by the lte parser.
const ELEGANT_EXTRA: [(&str, &str); 22] = [
    ("DRIFT", "DRIFT"),
    ("EDRIFT", "DRIFT"),
    ("CSRDRIFT", "DRIFT"),
    ("QUAD", "QUADRUPOLE"),
    ("SEXT", "SEXTUPOLE"),
    ("OCTU", "OCTUPOLE"),
    ("KOCT", "OCTUPOLE"),
    ("SBEN", "SBEND"),
    ("SBEND", "SBEND"),
    ("CSRCSBEND", "SBEND"),
    ("RBEN", "RBEND"),
    ("RBEND", "RBEND"),
    ("CRBEND", "RBEND"),
    ("HKICK", "HKICKER"),
    ("VKICK", "VKICKER"),
    ("EKICKER", "KICKER"),
    ("RFCW", "RFCAVITY"),
    ("HMON", "MONITOR"),
    ("VMON", "MONITOR"),
    ("SOLE", "SOLENOID"),
    ("MARKER", "MARKER"),
    ("MULT", "MULTIPOLE"),
];

/// Immutable raw-tag to normalized-family lookup.
///
/// Cloning is cheap; clones share the underlying map.
///
/// # Example
///
/// ```
/// use latticeconstructor::core::families::FamilyTable;
///
/// let table = FamilyTable::standard();
/// assert_eq!(table.normalize("KQUAD"), "QUADRUPOLE");
/// assert_eq!(table.normalize("UNDULATOR"), "UNDULATOR");
///
/// let extended = table.with_alias("UNDULATOR", "WIGGLER");
/// assert_eq!(extended.normalize("UNDULATOR"), "WIGGLER");
/// assert_eq!(table.normalize("UNDULATOR"), "UNDULATOR");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyTable {
    aliases: Arc<BTreeMap<String, String>>,
}

impl Default for FamilyTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl FamilyTable {
    /// An empty table that maps nothing.
    pub fn empty() -> Self {
        Self {
            aliases: Arc::new(BTreeMap::new()),
        }
    }

    /// The standard conversion table.
    pub fn standard() -> Self {
        Self::empty().with_aliases(STANDARD)
    }

    /// The standard table extended with the elegant element type names.
    pub fn elegant() -> Self {
        Self::standard().with_aliases(ELEGANT_EXTRA)
    }

    /// Return a copy of this table with one extra mapping.
    ///
    /// An existing mapping for `raw` is replaced.
    pub fn with_alias(&self, raw: impl AsRef<str>, normalized: impl AsRef<str>) -> Self {
        self.with_aliases([(raw, normalized)])
    }

    /// Return a copy of this table with extra mappings.
    pub fn with_aliases<I, R, N>(&self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (R, N)>,
        R: AsRef<str>,
        N: AsRef<str>,
    {
        let mut map = (*self.aliases).clone();
        for (raw, normalized) in aliases {
            map.insert(
                raw.as_ref().trim().to_ascii_uppercase(),
                normalized.as_ref().trim().to_ascii_uppercase(),
            );
        }
        Self {
            aliases: Arc::new(map),
        }
    }

    /// Normalize a raw family tag.
    ///
    /// The lookup is made on the uppercased tag; a tag without a mapping is
    /// returned exactly as given.
    pub fn normalize(&self, raw: &str) -> String {
        match self.lookup(raw) {
            Some(normalized) => normalized.to_string(),
            None => raw.to_string(),
        }
    }

    /// The mapping for a raw tag, if one exists.
    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.aliases
            .get(&raw.trim().to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether the table maps nothing.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
