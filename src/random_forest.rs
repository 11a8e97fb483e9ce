use crate::dataset::Dataset;
use crate::decision_tree::{RegressionTree, TreeParams};
use crate::functions;
use crate::regressor::{FitError, Regressor, TrainedRegressor};
use crate::table::Table;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::num::NonZeroUsize;

/// Bootstrap-aggregated regression trees.
///
/// Every `fit` starts from the same `seed`, so refitting on the same rows
/// yields the same forest.
#[derive(Debug, Clone)]
pub struct RandomForestOptions {
    trees: NonZeroUsize,
    max_features: Option<usize>,
    max_depth: Option<usize>,
    min_samples_leaf: NonZeroUsize,
    seed: u64,
    parallel: bool,
}

impl RandomForestOptions {
    pub fn trees(mut self, trees: NonZeroUsize) -> Self {
        self.trees = trees;
        self
    }

    /// Columns examined per split. Defaults to the square root of the
    /// number of features.
    pub fn max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features);
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Smallest number of (bootstrapped) rows a leaf may hold.
    pub fn min_samples_leaf(mut self, min_samples_leaf: NonZeroUsize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Grows the trees on the rayon thread pool.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    fn tree_params(&self, table: &Table) -> TreeParams {
        let max_features = self
            .max_features
            .unwrap_or_else(|| (table.features_len() as f64).sqrt().ceil() as usize);
        TreeParams {
            max_features,
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf.get(),
        }
    }

    fn tree_seeds(&self) -> Vec<u64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.trees.get()).map(|_| rng.gen()).collect()
    }
}

impl Default for RandomForestOptions {
    fn default() -> Self {
        Self {
            trees: NonZeroUsize::new(100).expect("never fails"),
            max_features: None,
            max_depth: None,
            min_samples_leaf: NonZeroUsize::new(1).expect("never fails"),
            seed: 0,
            parallel: false,
        }
    }
}

impl Regressor for RandomForestOptions {
    type Model = RandomForestRegressor;

    fn fit(&self, data: &Dataset) -> Result<Self::Model, FitError> {
        let table = Table::new(data)?;
        let params = self.tree_params(&table);
        let grow = |&seed: &u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut indices = table.bootstrap(&mut rng);
            RegressionTree::grow(&table, &mut indices, params, &mut rng)
        };

        let seeds = self.tree_seeds();
        let trees: Vec<_> = if self.parallel {
            seeds.par_iter().map(grow).collect()
        } else {
            seeds.iter().map(grow).collect()
        };
        Ok(RandomForestRegressor { trees })
    }
}

#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

impl TrainedRegressor for RandomForestRegressor {
    fn predict(&self, xs: &[f64]) -> f64 {
        functions::mean(self.trees.iter().map(|tree| tree.predict(xs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Row;

    fn dataset() -> Dataset {
        let features = [
            [0.0, 2.0, 1.0, 0.0],
            [0.0, 2.0, 1.0, 1.0],
            [1.0, 2.0, 1.0, 0.0],
            [2.0, 1.0, 1.0, 0.0],
            [2.0, 0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
            [2.0, 1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0, 1.0],
        ];
        let target = [
            25.0, 30.0, 46.0, 45.0, 52.0, 23.0, 43.0, 35.0, 38.0, 46.0, 48.0, 52.0,
        ];
        let rows = features
            .iter()
            .zip(target.iter())
            .map(|(xs, &y)| Row::new(xs.to_vec(), y))
            .collect();
        Dataset::from_rows(4, rows).expect("valid rows")
    }

    #[test]
    fn regression_is_reproducible() -> Result<(), anyhow::Error> {
        let data = dataset();
        let options = RandomForestOptions::default();
        let a = options.fit(&data)?;
        let b = options.clone().parallel(true).fit(&data)?;
        let c = options.clone().fit(&data)?;
        assert_eq!(a.trees().len(), 100);

        let xs = [1.0, 2.0, 0.0, 0.0];
        assert_eq!(a.predict(&xs), b.predict(&xs));
        assert_eq!(a.predict(&xs), c.predict(&xs));

        let prediction = a.predict(&xs);
        assert!((23.0..=52.0).contains(&prediction));
        Ok(())
    }

    #[test]
    fn growth_limits_apply() -> Result<(), anyhow::Error> {
        let data = dataset();
        let stumps = RandomForestOptions::default()
            .trees(NonZeroUsize::new(10).expect("non zero"))
            .max_depth(1)
            .fit(&data)?;
        assert!(stumps.trees().iter().all(|t| t.leaves_len() <= 2));

        let single_leaf = RandomForestOptions::default()
            .trees(NonZeroUsize::new(10).expect("non zero"))
            .min_samples_leaf(NonZeroUsize::new(7).expect("non zero"))
            .fit(&data)?;
        assert!(single_leaf.trees().iter().all(|t| t.leaves_len() == 1));
        Ok(())
    }

    #[test]
    fn empty_dataset_fails() {
        let options = RandomForestOptions::default();
        assert!(matches!(
            options.fit(&Dataset::new(4)),
            Err(FitError::EmptyDataset)
        ));
    }
}
