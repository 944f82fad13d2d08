// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bocpd_core::BocpdError;

/// Dense run-length posterior `R`, `(T + 1)` rows by `T` columns.
///
/// `R[r, t]` is the probability that the run length is `r` after `t`
/// observations. Storage is column-major. Columns are appended in order and
/// never touched again; column 0 stays all-zero.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawRunLengthMatrix"))]
#[derive(Clone, Debug, PartialEq)]
pub struct RunLengthMatrix {
    rows: usize,
    cols: usize,
    filled: usize,
    values: Vec<f64>,
}

/// Unchecked wire shape of [`RunLengthMatrix`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawRunLengthMatrix {
    rows: usize,
    cols: usize,
    filled: usize,
    values: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawRunLengthMatrix> for RunLengthMatrix {
    type Error = BocpdError;

    fn try_from(raw: RawRunLengthMatrix) -> Result<Self, Self::Error> {
        let matrix = Self {
            rows: raw.rows,
            cols: raw.cols,
            filled: raw.filled,
            values: raw.values,
        };
        matrix.validate()?;
        Ok(matrix)
    }
}

impl RunLengthMatrix {
    /// Zeroed matrix for a series of `n` observations.
    pub fn zeros(n: usize) -> Self {
        let rows = n + 1;
        Self {
            rows,
            cols: n,
            filled: 1.min(n),
            values: vec![0.0; rows * n],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of columns written so far, counting the zero column.
    pub fn filled_columns(&self) -> usize {
        self.filled
    }

    pub fn get(&self, run_length: usize, t: usize) -> Option<f64> {
        if run_length >= self.rows || t >= self.cols {
            return None;
        }
        Some(self.values[t * self.rows + run_length])
    }

    pub fn column(&self, t: usize) -> Option<&[f64]> {
        if t >= self.cols {
            return None;
        }
        let start = t * self.rows;
        Some(&self.values[start..start + self.rows])
    }

    pub fn column_sum(&self, t: usize) -> Option<f64> {
        self.column(t).map(|column| column.iter().sum())
    }

    /// Row `run_length` across all columns.
    pub fn row(&self, run_length: usize) -> Option<Vec<f64>> {
        if run_length >= self.rows {
            return None;
        }
        Some(
            (0..self.cols)
                .map(|t| self.values[t * self.rows + run_length])
                .collect(),
        )
    }

    /// Column-major backing storage.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Checks the shape invariants `rows == cols + 1`,
    /// `values.len() == rows * cols` and `filled <= cols`.
    pub fn validate(&self) -> Result<(), BocpdError> {
        if self.rows != self.cols + 1 {
            return Err(BocpdError::invalid_input(format!(
                "run-length matrix must have cols + 1 rows: rows={}, cols={}",
                self.rows, self.cols
            )));
        }
        let expected = self.rows.checked_mul(self.cols).ok_or_else(|| {
            BocpdError::invalid_input(format!(
                "run-length matrix size overflows usize: rows={}, cols={}",
                self.rows, self.cols
            ))
        })?;
        if self.values.len() != expected {
            return Err(BocpdError::invalid_input(format!(
                "run-length matrix storage has {} values; expected rows * cols = {expected}",
                self.values.len()
            )));
        }
        if self.filled > self.cols {
            return Err(BocpdError::invalid_input(format!(
                "run-length matrix filled={} exceeds cols={}",
                self.filled, self.cols
            )));
        }
        Ok(())
    }

    /// Appends the next column. `probs[r]` is the mass at run length `r`;
    /// rows past `probs.len()` stay zero.
    pub(crate) fn push_column(&mut self, probs: &[f64]) -> Result<usize, BocpdError> {
        let t = self.filled;
        if t >= self.cols {
            return Err(BocpdError::invalid_input(format!(
                "run-length matrix is full: cols={}",
                self.cols
            )));
        }
        if probs.len() > self.rows {
            return Err(BocpdError::invalid_input(format!(
                "posterior column {t} has {} entries but the matrix has {} rows",
                probs.len(),
                self.rows
            )));
        }

        let start = t * self.rows;
        self.values[start..start + probs.len()].copy_from_slice(probs);
        self.filled += 1;
        Ok(t)
    }
}
