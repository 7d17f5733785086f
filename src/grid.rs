//! The rectangular grid of samples a surface is built from.

use crate::error::{PlotError, Result};
use crate::ticks::{NiceRounding, nice_num};

/// An R x C grid of scalar samples, stored row-major.
///
/// Rows run along the plot's x axis and columns along its y axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleGrid {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl SampleGrid {
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if rows < 2 || cols < 2 {
            return Err(PlotError::GridTooSmall { rows, cols });
        }
        if values.len() != rows * cols {
            return Err(PlotError::GridSizeMismatch {
                expected: rows * cols,
                found: values.len(),
            });
        }
        if let Some(index) = values.iter().position(|v| v.is_infinite()) {
            return Err(PlotError::InfiniteSample {
                row: index / cols,
                col: index % cols,
            });
        }
        Ok(Self { rows, cols, values })
    }

    /// Build from nested rows; every row must have the first row's length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let row_count = rows.len();
        let cols = rows.first().map_or(0, Vec::len);
        if let Some((row, found)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != cols)
            .map(|(i, r)| (i, r.len()))
        {
            return Err(PlotError::RaggedGrid {
                row,
                expected: cols,
                found,
            });
        }
        Self::new(row_count, cols, rows.into_iter().flatten().collect())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Smallest and largest sample, ignoring NaN.
    pub fn min_max(&self) -> (f64, f64) {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Every sample divided by `divisor`.
    pub fn divided_by(&self, divisor: f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            values: self.values.iter().map(|v| v / divisor).collect(),
        }
    }

    /// Rescale so the axis maximum lands on the nice number at or above the
    /// largest sample. Returns the grid and the nice maximum it was divided by,
    /// or the grid unchanged when there is no positive maximum to snap to.
    pub fn normalised(&self) -> (Self, Option<f64>) {
        let (_, max) = self.min_max();
        if !(max.is_finite() && max > 0.0) {
            tracing::debug!(max, "no positive maximum, leaving z values unscaled");
            return (self.clone(), None);
        }
        let nice_max = nice_num(max, NiceRounding::Ceil);
        (self.divided_by(nice_max), Some(nice_max))
    }
}
