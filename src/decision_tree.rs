use crate::regressor::TrainedRegressor;
use crate::table::{Table, TargetStats};
use rand::seq::SliceRandom as _;
use rand::Rng;

/// Growth limits of a single tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    /// Columns examined per split.
    pub max_features: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
}

/// A regression tree whose leaves predict the mean target of their rows.
///
/// Nodes live in one vector and refer to their children by position; the root
/// is at position 0.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        column: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct Split {
    column: usize,
    threshold: f64,
    /// Number of rows going left once sorted by `column`.
    position: usize,
    gain: f64,
}

impl RegressionTree {
    /// Grows a tree on the rows of `table` listed in `indices`.
    ///
    /// `indices` may repeat rows and is reordered in place.
    pub fn grow<R: Rng + ?Sized>(
        table: &Table,
        indices: &mut [usize],
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let mut grower = Grower {
            table,
            params,
            rng,
            nodes: Vec::new(),
        };
        grower.grow(indices, 0);
        Self {
            nodes: grower.nodes,
        }
    }

    pub fn leaves_len(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

impl TrainedRegressor for RegressionTree {
    fn predict(&self, xs: &[f64]) -> f64 {
        let mut position = 0;
        loop {
            match self.nodes[position] {
                Node::Leaf { value } => return value,
                Node::Split {
                    column,
                    threshold,
                    left,
                    right,
                } => {
                    position = if xs[column] <= threshold { left } else { right };
                }
            }
        }
    }
}

struct Grower<'t, 'a, R: ?Sized> {
    table: &'t Table<'a>,
    params: TreeParams,
    rng: &'t mut R,
    nodes: Vec<Node>,
}

impl<'t, 'a, R: Rng + ?Sized> Grower<'t, 'a, R> {
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let stats = self.table.target_stats(indices);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: stats.mean(),
        });

        if self.params.max_depth.map_or(false, |max| depth >= max)
            || stats.count() < 2 * self.params.min_samples_leaf
            || self.table.is_constant_target(indices)
        {
            return id;
        }

        if let Some(split) = self.best_split(indices, stats) {
            self.table.sort_by_feature(indices, split.column);
            let (l, r) = indices.split_at_mut(split.position);
            let left = self.grow(l, depth + 1);
            let right = self.grow(r, depth + 1);
            self.nodes[id] = Node::Split {
                column: split.column,
                threshold: split.threshold,
                left,
                right,
            };
        }
        id
    }

    /// Finds the largest reduction of the squared error over a random subset
    /// of the columns, keeping at least `min_samples_leaf` rows on each side.
    fn best_split(&mut self, indices: &mut [usize], total: TargetStats) -> Option<Split> {
        let table = self.table;
        let columns = (0..table.features_len())
            .filter(|&c| !table.has_nan(indices, c))
            .collect::<Vec<_>>();
        let sampled = std::cmp::min(columns.len(), self.params.max_features);
        let min_leaf = self.params.min_samples_leaf;

        let mut best: Option<Split> = None;
        for &column in columns.choose_multiple(&mut *self.rng, sampled) {
            table.sort_by_feature(indices, column);
            let mut left = TargetStats::default();
            for position in 1..indices.len() {
                left.push(table.target(indices[position - 1]));
                if position < min_leaf || indices.len() - position < min_leaf {
                    continue;
                }
                let prev = table.value(indices[position - 1], column);
                let next = table.value(indices[position], column);
                if prev == next {
                    continue;
                }

                let gain = total.sse() - left.sse() - (total - left).sse();
                if best.map_or(true, |b| b.gain < gain) {
                    best = Some(Split {
                        column,
                        threshold: (prev + next) / 2.0,
                        position,
                        gain,
                    });
                }
            }
        }
        best.filter(|b| b.gain > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> TreeParams {
        TreeParams {
            max_features: 1,
            max_depth: None,
            min_samples_leaf: 1,
        }
    }

    fn grow(data: &Dataset, params: TreeParams) -> Result<RegressionTree, anyhow::Error> {
        let table = Table::new(data)?;
        let mut indices = (0..data.len()).collect::<Vec<_>>();
        let mut rng = StdRng::seed_from_u64(0);
        Ok(RegressionTree::grow(&table, &mut indices, params, &mut rng))
    }

    #[test]
    fn regression_works() -> Result<(), anyhow::Error> {
        let data = Dataset::from_columns(
            vec![&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0][..]],
            &[1.0, 1.0, 1.0, 7.0, 7.0, 7.0],
        )?;
        let tree = grow(&data, params())?;

        assert_eq!(tree.leaves_len(), 2);
        assert_eq!(tree.predict(&[0.5]), 1.0);
        assert_eq!(tree.predict(&[2.4]), 1.0);
        assert_eq!(tree.predict(&[2.6]), 7.0);
        assert_eq!(tree.predict(&[10.0]), 7.0);
        Ok(())
    }

    #[test]
    fn depth_limit_yields_mean() -> Result<(), anyhow::Error> {
        let data = Dataset::from_columns(
            vec![&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0][..]],
            &[1.0, 1.0, 1.0, 7.0, 7.0, 7.0],
        )?;
        let tree = grow(
            &data,
            TreeParams {
                max_depth: Some(0),
                ..params()
            },
        )?;
        assert_eq!(tree.leaves_len(), 1);
        assert_eq!(tree.predict(&[0.0]), 4.0);
        Ok(())
    }

    #[test]
    fn leaves_keep_min_samples() -> Result<(), anyhow::Error> {
        let data = Dataset::from_columns(
            vec![&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0][..]],
            &[0.0, 0.0, 0.0, 0.0, 0.0, 10.0],
        )?;

        let unrestricted = grow(&data, params())?;
        assert_eq!(unrestricted.predict(&[5.0]), 10.0);

        let restricted = grow(
            &data,
            TreeParams {
                min_samples_leaf: 2,
                ..params()
            },
        )?;
        assert_eq!(restricted.predict(&[5.0]), 5.0);
        assert_eq!(restricted.predict(&[0.0]), 0.0);
        Ok(())
    }

    #[test]
    fn duplicated_rows_are_grown() -> Result<(), anyhow::Error> {
        let data = Dataset::from_columns(vec![&[0.0, 1.0][..]], &[2.0, 4.0])?;
        let table = Table::new(&data)?;
        let mut indices = vec![1, 0, 1, 1];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::grow(&table, &mut indices, params(), &mut rng);
        assert_eq!(tree.predict(&[0.0]), 2.0);
        assert_eq!(tree.predict(&[1.0]), 4.0);
        Ok(())
    }
}
