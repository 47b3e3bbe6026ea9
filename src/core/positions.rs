//! core::positions
//!
//! Explicit element positions.
//!
//! Some lattice sources (MAD-X sequences) place every element at an explicit
//! longitudinal position instead of abutting elements end to end. Those
//! positions are carried as an ordered list of `(reference, at)` pairs, one
//! per lattice slot.

use serde::{Deserialize, Serialize};

/// Ordered explicit positions, one entry per lattice slot.
///
/// # Example
///
/// ```
/// use latticeconstructor::core::positions::Positions;
///
/// let positions: Positions = [("QF", 0.5), ("D", 2.0)].into_iter().collect();
/// let lattice = vec!["QF".to_string(), "D".to_string()];
///
/// assert!(positions.aligned_with(&lattice));
/// assert!(!positions.aligned_with(&lattice[..1]));
/// assert_eq!(positions.at_values(), vec![0.5, 2.0]);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Positions {
    entries: Vec<(String, f64)>,
}

impl Positions {
    /// Create an empty position list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a position.
    pub fn push(&mut self, name: impl Into<String>, at: f64) {
        self.entries.push((name.into(), at));
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(reference, at)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(name, at)| (name.as_str(), *at))
    }

    /// The `at` values in slot order.
    pub fn at_values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, at)| *at).collect()
    }

    /// The position of the last entry with this reference.
    pub fn last_at(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, at)| *at)
    }

    /// Whether these positions describe exactly this lattice: same number of
    /// slots and the same reference at every slot.
    pub fn aligned_with<S: AsRef<str>>(&self, lattice: &[S]) -> bool {
        self.entries.len() == lattice.len()
            && self
                .entries
                .iter()
                .zip(lattice)
                .all(|((name, _), slot)| name == slot.as_ref())
    }
}

impl<N: Into<String>> FromIterator<(N, f64)> for Positions {
    fn from_iter<I: IntoIterator<Item = (N, f64)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, at)| (name.into(), at))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misaligned_when_reference_differs() {
        let positions: Positions = [("QF", 0.5), ("D", 2.0)].into_iter().collect();
        assert!(!positions.aligned_with(&["QF", "QD"]));
        assert!(positions.aligned_with(&["QF", "D"]));
    }

    #[test]
    fn last_at_finds_latest_entry() {
        let mut positions = Positions::new();
        positions.push("QF", 1.0);
        positions.push("D", 2.0);
        positions.push("QF", 3.0);
        assert_eq!(positions.last_at("QF"), Some(3.0));
        assert_eq!(positions.last_at("QD"), None);
        assert_eq!(positions.len(), 3);
    }

    #[test]
    fn empty_positions_align_with_empty_lattice() {
        let positions = Positions::new();
        assert!(positions.is_empty());
        assert!(positions.aligned_with::<&str>(&[]));
    }
}
