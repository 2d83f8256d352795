//! Column-major matrix of integer-coded values.

use serde::{Deserialize, Serialize};

use crate::error::{AnonError, AnonResult};

/// Immutable-by-convention, column-major matrix of coded values.
///
/// Each column holds one attribute, each row one record. Cell `(row, column)`
/// lives at `column * rows + row`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMatrix {
    rows: usize,
    columns: usize,
    values: Vec<u32>,
}

impl DataMatrix {
    /// Creates a zero-filled matrix.
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            values: vec![0; rows * columns],
        }
    }

    /// Builds a matrix from row-major records; every record must have the same width.
    pub fn from_rows(records: &[Vec<u32>]) -> AnonResult<Self> {
        let columns = records.first().map(|r| r.len()).unwrap_or(0);
        let rows = records.len();
        let mut matrix = Self::new(rows, columns);
        for (row, record) in records.iter().enumerate() {
            if record.len() != columns {
                return Err(AnonError::DimensionMismatch {
                    what: format!("width of record {}", row),
                    expected: columns,
                    actual: record.len(),
                });
            }
            for (column, &value) in record.iter().enumerate() {
                matrix.set(row, column, value);
            }
        }
        Ok(matrix)
    }

    /// Builds a matrix directly from column vectors of equal length.
    pub fn from_columns(columns: Vec<Vec<u32>>) -> AnonResult<Self> {
        let rows = columns.first().map(|c| c.len()).unwrap_or(0);
        let width = columns.len();
        let mut values = Vec::with_capacity(rows * width);
        for (index, column) in columns.into_iter().enumerate() {
            if column.len() != rows {
                return Err(AnonError::DimensionMismatch {
                    what: format!("length of column {}", index),
                    expected: rows,
                    actual: column.len(),
                });
            }
            values.extend(column);
        }
        Ok(Self {
            rows,
            columns: width,
            values,
        })
    }

    /// Number of records.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of attributes.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Value at `(row, column)`.
    #[inline]
    pub fn get(&self, row: usize, column: usize) -> u32 {
        self.values[column * self.rows + row]
    }

    /// Overwrites the value at `(row, column)`.
    #[inline]
    pub fn set(&mut self, row: usize, column: usize, value: u32) {
        self.values[column * self.rows + row] = value;
    }

    /// Contiguous slice of one attribute.
    pub fn column(&self, column: usize) -> &[u32] {
        let start = column * self.rows;
        &self.values[start..start + self.rows]
    }

    /// Copies one record into `out`, which must have `columns()` slots.
    pub fn copy_row(&self, row: usize, out: &mut [u32]) {
        for (column, slot) in out.iter_mut().enumerate().take(self.columns) {
            *slot = self.get(row, column);
        }
    }

    /// One record as an owned vector.
    pub fn row(&self, row: usize) -> Vec<u32> {
        let mut out = vec![0; self.columns];
        self.copy_row(row, &mut out);
        out
    }

    /// Writes a record, `values` must have `columns()` entries.
    pub fn set_row(&mut self, row: usize, values: &[u32]) {
        for (column, &value) in values.iter().enumerate().take(self.columns) {
            self.set(row, column, value);
        }
    }
}
