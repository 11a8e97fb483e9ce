use itertools::Itertools as _;
use ordered_float::OrderedFloat;
use rand::seq::SliceRandom as _;
use rand::Rng;
use thiserror::Error;

/// A single observation: feature values and a numeric target.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    features: Vec<f64>,
    target: f64,
}

impl Row {
    pub fn new(features: Vec<f64>, target: f64) -> Self {
        Self { features, target }
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Returns a copy of this row carrying `target` instead of its own label.
    pub fn with_target(&self, target: f64) -> Self {
        Self {
            features: self.features.clone(),
            target,
        }
    }
}

/// An ordered collection of rows sharing the same feature count.
///
/// Indices are only stable until the next removal.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features_len: usize,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new(features_len: usize) -> Self {
        Self {
            features_len,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(features_len: usize, rows: Vec<Row>) -> Result<Self, DatasetError> {
        let mut dataset = Self::new(features_len);
        for row in rows {
            dataset.push(row)?;
        }
        Ok(dataset)
    }

    /// Builds a dataset from feature columns and a target column.
    pub fn from_columns(features: Vec<&[f64]>, target: &[f64]) -> Result<Self, DatasetError> {
        if target.is_empty() {
            return Err(DatasetError::EmptyDataset);
        }
        if features.iter().any(|c| c.len() != target.len()) {
            return Err(DatasetError::RowSizeMismatch);
        }

        let rows = target
            .iter()
            .enumerate()
            .map(|(i, &y)| Row::new(features.iter().map(|c| c[i]).collect(), y))
            .collect();
        Self::from_rows(features.len(), rows)
    }

    pub fn features_len(&self) -> usize {
        self.features_len
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn iter(&self) -> impl '_ + Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn target(&self) -> impl '_ + Iterator<Item = f64> + Clone {
        self.rows.iter().map(|r| r.target)
    }

    pub fn push(&mut self, row: Row) -> Result<(), DatasetError> {
        if row.features.len() != self.features_len {
            return Err(DatasetError::FeatureLenMismatch {
                expected: self.features_len,
                actual: row.features.len(),
            });
        }
        if !row.target.is_finite() {
            return Err(DatasetError::NonFiniteTarget);
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<Row, DatasetError> {
        if index >= self.rows.len() {
            return Err(DatasetError::IndexOutOfBounds {
                index,
                len: self.rows.len(),
            });
        }
        Ok(self.rows.remove(index))
    }

    /// Removes every distinct index in `indices`, all interpreted against the
    /// current row order.
    ///
    /// Deletion runs in descending index order so that no removal shifts a
    /// position that is still pending. Returns the number of removed rows.
    pub fn remove_many(&mut self, indices: &[usize]) -> Result<usize, DatasetError> {
        let targets = indices
            .iter()
            .copied()
            .sorted_by(|a, b| b.cmp(a))
            .dedup()
            .collect::<Vec<_>>();
        if let Some(&index) = targets.first() {
            if index >= self.rows.len() {
                return Err(DatasetError::IndexOutOfBounds {
                    index,
                    len: self.rows.len(),
                });
            }
        }
        for &index in &targets {
            self.rows.remove(index);
        }
        Ok(targets.len())
    }

    /// Returns the rows at `indices` (in that order) as a new dataset.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features_len: self.features_len,
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Shuffles the rows with `rng` and splits them into the first
    /// `floor(len * ratio)` rows and the rest.
    pub fn random_split<R: Rng + ?Sized>(&self, ratio: f64, rng: &mut R) -> (Self, Self) {
        let mut order = (0..self.len()).collect::<Vec<_>>();
        order.shuffle(rng);
        let head = ((self.len() as f64 * ratio) as usize).min(self.len());
        (self.select(&order[..head]), self.select(&order[head..]))
    }

    /// Min-max normalizes every feature column and the target column into `[0, 1]`.
    ///
    /// A constant column becomes all zeros.
    pub fn normalize(&mut self) {
        let target_column = self.features_len;
        for column in 0..=target_column {
            let value = |row: &Row| {
                if column == target_column {
                    row.target
                } else {
                    row.features[column]
                }
            };
            let (min, max) = match self.rows.iter().map(|r| OrderedFloat(value(r))).minmax() {
                itertools::MinMaxResult::MinMax(min, max) => (min.0, max.0),
                itertools::MinMaxResult::OneElement(v) => (v.0, v.0),
                itertools::MinMaxResult::NoElements => continue,
            };
            let width = max - min;
            let scale = |v: f64| if width > 0.0 { (v - min) / width } else { 0.0 };

            for row in &mut self.rows {
                if column == target_column {
                    row.target = scale(row.target);
                } else {
                    row.features[column] = scale(row.features[column]);
                }
            }
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DatasetError {
    #[error("dataset must have at least one row")]
    EmptyDataset,

    #[error("row has {actual} features but the dataset expects {expected}")]
    FeatureLenMismatch { expected: usize, actual: usize },

    #[error("some of features or target have a different row count from others")]
    RowSizeMismatch,

    #[error("target contains non finite numbers")]
    NonFiniteTarget,

    #[error("row index {index} is out of bounds for a dataset of {len} rows")]
    IndexOutOfBounds { index: usize, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dataset(len: usize) -> Dataset {
        let rows = (0..len)
            .map(|i| Row::new(vec![i as f64, (i * 2) as f64], i as f64 * 10.0))
            .collect();
        Dataset::from_rows(2, rows).expect("valid rows")
    }

    #[test]
    fn push_checks_schema() {
        let mut data = Dataset::new(2);
        assert!(data.push(Row::new(vec![1.0, 2.0], 3.0)).is_ok());
        assert_eq!(
            data.push(Row::new(vec![1.0], 3.0)),
            Err(DatasetError::FeatureLenMismatch {
                expected: 2,
                actual: 1
            })
        );
        assert_eq!(
            data.push(Row::new(vec![1.0, 2.0], f64::NAN)),
            Err(DatasetError::NonFiniteTarget)
        );
        assert_eq!(data.len(), 1);
    }

    #[test]
    fn from_columns_works() -> Result<(), anyhow::Error> {
        let data = Dataset::from_columns(vec![&[1.0, 2.0][..], &[3.0, 4.0][..]], &[5.0, 6.0])?;
        assert_eq!(data.len(), 2);
        assert_eq!(data.get(1), Some(&Row::new(vec![2.0, 4.0], 6.0)));

        assert_eq!(
            Dataset::from_columns(vec![&[1.0][..]], &[5.0, 6.0]),
            Err(DatasetError::RowSizeMismatch)
        );
        assert_eq!(
            Dataset::from_columns(vec![], &[]),
            Err(DatasetError::EmptyDataset)
        );
        Ok(())
    }

    #[test]
    fn remove_many_ignores_shifts_and_duplicates() -> Result<(), anyhow::Error> {
        let mut data = dataset(6);
        assert_eq!(data.remove_many(&[1, 4, 1, 0])?, 3);
        assert_eq!(data.target().collect::<Vec<_>>(), vec![20.0, 30.0, 50.0]);

        assert!(data.remove_many(&[0, 3]).is_err());
        assert_eq!(data.len(), 3);
        Ok(())
    }

    #[test]
    fn random_split_partitions_rows() {
        let data = dataset(10);
        let mut rng = StdRng::seed_from_u64(0);
        let (head, tail) = data.random_split(0.7, &mut rng);
        assert_eq!(head.len(), 7);
        assert_eq!(tail.len(), 3);

        let mut targets = head.target().chain(tail.target()).collect::<Vec<_>>();
        targets.sort_by_key(|&t| OrderedFloat(t));
        assert_eq!(targets, data.target().collect::<Vec<_>>());
    }

    #[test]
    fn normalize_works() -> Result<(), anyhow::Error> {
        let mut data = Dataset::from_columns(
            vec![&[2.0, 4.0, 6.0][..], &[1.0, 1.0, 1.0][..]],
            &[0.0, 5.0, 10.0],
        )?;
        data.normalize();
        assert_eq!(data.get(0), Some(&Row::new(vec![0.0, 0.0], 0.0)));
        assert_eq!(data.get(1), Some(&Row::new(vec![0.5, 0.0], 0.5)));
        assert_eq!(data.get(2), Some(&Row::new(vec![1.0, 0.0], 1.0)));
        Ok(())
    }
}
