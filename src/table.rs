use crate::dataset::{Dataset, Row};
use ordered_float::OrderedFloat;
use rand::Rng;
use std::iter::FromIterator;
use std::ops::Sub;
use thiserror::Error;

/// Read-only access to the rows of a [`Dataset`] by row index.
///
/// Tree growing never moves rows around; it reorders slices of indices into
/// the table instead.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    rows: &'a [Row],
    features_len: usize,
}

impl<'a> Table<'a> {
    pub fn new(dataset: &'a Dataset) -> Result<Self, TableError> {
        if dataset.is_empty() {
            return Err(TableError::EmptyTable);
        }
        Ok(Self {
            rows: dataset.rows(),
            features_len: dataset.features_len(),
        })
    }

    pub fn features_len(&self) -> usize {
        self.features_len
    }

    pub fn rows_len(&self) -> usize {
        self.rows.len()
    }

    pub fn target(&self, index: usize) -> f64 {
        self.rows[index].target()
    }

    pub fn value(&self, index: usize, column: usize) -> f64 {
        self.rows[index].features()[column]
    }

    /// Draws as many row indices as the table has rows, with replacement.
    pub fn bootstrap<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        (0..self.rows_len())
            .map(|_| rng.gen_range(0..self.rows_len()))
            .collect()
    }

    pub fn sort_by_feature(&self, indices: &mut [usize], column: usize) {
        indices.sort_by_key(|&i| OrderedFloat(self.value(i, column)));
    }

    pub fn has_nan(&self, indices: &[usize], column: usize) -> bool {
        indices.iter().any(|&i| self.value(i, column).is_nan())
    }

    pub fn is_constant_target(&self, indices: &[usize]) -> bool {
        let mut targets = indices.iter().map(|&i| self.target(i));
        match targets.next() {
            Some(first) => targets.all(|t| t == first),
            None => true,
        }
    }

    pub fn target_stats(&self, indices: &[usize]) -> TargetStats {
        indices.iter().map(|&i| self.target(i)).collect()
    }
}

/// Running sums of a set of targets.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetStats {
    count: usize,
    sum: f64,
    sum_sq: f64,
}

impl TargetStats {
    pub fn push(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sum_sq += y * y;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }

    /// Sum of squared deviations from the mean.
    pub fn sse(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.sum_sq - self.sum * self.sum / self.count as f64).max(0.0)
    }
}

impl FromIterator<f64> for TargetStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Self::default();
        for y in iter {
            stats.push(y);
        }
        stats
    }
}

impl Sub for TargetStats {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sum_sq: self.sum_sq - other.sum_sq,
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum TableError {
    #[error("table must have at least one row")]
    EmptyTable,
}
