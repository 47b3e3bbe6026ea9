//! core::table
//!
//! A small column-major structured table.
//!
//! # Overview
//!
//! [`LatticeTable`] holds one column per key and one value slot per row in
//! every column; a `None` slot is a null. Columns keep first-seen order.
//! Tables are built from row mappings, can gain derived columns, and can be
//! filtered by null-ness.
//!
//! # Invariants
//!
//! - Every column has exactly `len()` entries
//! - Column order is the order in which keys first appeared

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use super::types::AttrValue;

/// A single table row: column name to non-null value.
pub type Row = IndexMap<String, AttrValue>;

/// Errors from table operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("column '{column}' has {actual} values, table has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// Column-major table of attribute values.
///
/// # Example
///
/// ```
/// use latticeconstructor::core::table::{LatticeTable, Row};
/// use latticeconstructor::core::types::AttrValue;
///
/// let mut a = Row::new();
/// a.insert("L".into(), AttrValue::Number(1.0));
/// let mut b = Row::new();
/// b.insert("K1".into(), AttrValue::Number(0.5));
///
/// let table = LatticeTable::from_rows([a, b]);
/// assert_eq!(table.len(), 2);
/// assert_eq!(table.columns().collect::<Vec<_>>(), vec!["L", "K1"]);
/// assert_eq!(table.is_null("L"), vec![false, true]);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LatticeTable {
    columns: IndexMap<String, Vec<Option<AttrValue>>>,
    len: usize,
}

impl LatticeTable {
    /// Build a table from an ordered sequence of rows.
    ///
    /// Keys missing from a row become nulls in that row.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = Row>,
    {
        let rows: Vec<Row> = rows.into_iter().collect();
        let len = rows.len();

        let mut columns: IndexMap<String, Vec<Option<AttrValue>>> = IndexMap::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains_key(key) {
                    columns.insert(key.clone(), Vec::with_capacity(len));
                }
            }
        }

        for mut row in rows {
            for (key, values) in columns.iter_mut() {
                values.push(row.shift_remove(key));
            }
        }

        Self { columns, len }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Column names in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Whether a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// All values of a column.
    pub fn column(&self, name: &str) -> Option<&[Option<AttrValue>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// A column's values as numbers; non-numeric values read as null.
    pub fn number_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name).map(|values| {
            values
                .iter()
                .map(|v| v.as_ref().and_then(AttrValue::as_f64))
                .collect()
        })
    }

    /// A single cell.
    pub fn value(&self, row: usize, column: &str) -> Option<&AttrValue> {
        self.columns
            .get(column)
            .and_then(|values| values.get(row))
            .and_then(Option::as_ref)
    }

    /// A single row with nulls omitted.
    pub fn row(&self, index: usize) -> Option<Row> {
        if index >= self.len {
            return None;
        }
        Some(
            self.columns
                .iter()
                .filter_map(|(key, values)| values[index].clone().map(|v| (key.clone(), v)))
                .collect(),
        )
    }

    /// All rows with nulls omitted.
    pub fn rows(&self) -> Vec<Row> {
        (0..self.len).filter_map(|i| self.row(i)).collect()
    }

    /// Per-row null flags for a column. A missing column is all null.
    pub fn is_null(&self, column: &str) -> Vec<bool> {
        match self.columns.get(column) {
            Some(values) => values.iter().map(Option::is_none).collect(),
            None => vec![true; self.len],
        }
    }

    /// Whether any row is null in a column.
    pub fn has_nulls(&self, column: &str) -> bool {
        self.is_null(column).into_iter().any(|null| null)
    }

    /// Replace (or add) a column.
    ///
    /// # Errors
    ///
    /// Returns `TableError::LengthMismatch` if `values` does not have one
    /// entry per row. The table is left unchanged.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Option<AttrValue>>,
    ) -> Result<(), TableError> {
        let name = name.into();
        if values.len() != self.len {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.len,
                actual: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Replace (or add) a column computed from the row index.
    pub fn derive_column<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: FnMut(usize) -> Option<AttrValue>,
    {
        let values = (0..self.len).map(f).collect();
        self.columns.insert(name.into(), values);
    }

    /// Set every null cell of a column to `value`, adding the column if needed.
    ///
    /// Returns the number of cells filled.
    pub fn fill_null(&mut self, column: &str, value: AttrValue) -> usize {
        let len = self.len;
        let values = self
            .columns
            .entry(column.to_string())
            .or_insert_with(|| vec![None; len]);

        let mut filled = 0;
        for slot in values.iter_mut().filter(|slot| slot.is_none()) {
            *slot = Some(value.clone());
            filled += 1;
        }
        filled
    }

    /// Set every cell of a column that is null, non-numeric or not finite
    /// to `value`, adding the column if needed.
    ///
    /// Returns the number of cells replaced.
    pub fn fill_non_numeric(&mut self, column: &str, value: AttrValue) -> usize {
        let len = self.len;
        let values = self
            .columns
            .entry(column.to_string())
            .or_insert_with(|| vec![None; len]);

        let mut filled = 0;
        for slot in values.iter_mut() {
            let usable = slot
                .as_ref()
                .and_then(AttrValue::as_f64)
                .is_some_and(f64::is_finite);
            if !usable {
                *slot = Some(value.clone());
                filled += 1;
            }
        }
        filled
    }

    /// Running sum of a numeric column.
    ///
    /// Null and non-numeric cells stay null in the output and do not
    /// contribute to the sum. A missing column yields all nulls.
    pub fn cumsum(&self, column: &str) -> Vec<Option<f64>> {
        let Some(numbers) = self.number_column(column) else {
            return vec![None; self.len];
        };

        let mut total = 0.0;
        numbers
            .into_iter()
            .map(|n| {
                n.map(|n| {
                    total += n;
                    total
                })
            })
            .collect()
    }

    /// Rows where `column` is null.
    pub fn filter_null(&self, column: &str) -> LatticeTable {
        self.select(&self.is_null(column))
    }

    /// Rows where `column` is not null.
    pub fn filter_not_null(&self, column: &str) -> LatticeTable {
        let keep: Vec<bool> = self.is_null(column).into_iter().map(|n| !n).collect();
        self.select(&keep)
    }

    fn select(&self, keep: &[bool]) -> LatticeTable {
        let columns = self
            .columns
            .iter()
            .map(|(key, values)| {
                let kept = values
                    .iter()
                    .zip(keep)
                    .filter(|(_, keep)| **keep)
                    .map(|(v, _)| v.clone())
                    .collect();
                (key.clone(), kept)
            })
            .collect();

        LatticeTable {
            columns,
            len: keep.iter().filter(|k| **k).count(),
        }
    }
}
