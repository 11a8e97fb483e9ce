use crate::dataset::Dataset;
use crate::features;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Which positions of the expanded feature vectors enter the distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborMetric {
    /// Only the first `n` positions, i.e. the raw feature values.
    Raw,

    /// All `2n` positions, including the circular differences.
    Expanded,
}

impl Default for NeighborMetric {
    fn default() -> Self {
        Self::Raw
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

/// Ranks every row of `reference` by its distance to `target`.
///
/// The result has one entry per reference row, ordered by ascending distance.
/// Rows at the same distance keep their original order.
pub fn k_nearest(target: &[f64], reference: &Dataset, metric: NeighborMetric) -> Vec<Neighbor> {
    let target = features::expand(target);
    let len = match metric {
        NeighborMetric::Raw => target.len() / 2,
        NeighborMetric::Expanded => target.len(),
    };

    let mut neighbors = reference
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let row = features::expand(row.features());
            let distance = target[..len]
                .iter()
                .zip(&row[..len])
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            Neighbor { index, distance }
        })
        .collect::<Vec<_>>();
    neighbors.sort_by_key(|n| OrderedFloat(n.distance));
    neighbors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Row;

    fn reference() -> Dataset {
        let rows = [[0.0, 0.0], [3.0, 4.0], [1.0, 0.0], [0.0, 1.0], [-3.0, -4.0]]
            .iter()
            .map(|xs| Row::new(xs.to_vec(), 0.0))
            .collect();
        Dataset::from_rows(2, rows).expect("valid rows")
    }

    #[test]
    fn k_nearest_sorts_by_distance() {
        let neighbors = k_nearest(&[0.0, 0.0], &reference(), NeighborMetric::Raw);
        assert_eq!(neighbors.len(), 5);
        assert_eq!(
            neighbors.iter().map(|n| n.index).collect::<Vec<_>>(),
            vec![0, 2, 3, 1, 4]
        );
        assert_eq!(
            neighbors.iter().map(|n| n.distance).collect::<Vec<_>>(),
            vec![0.0, 1.0, 1.0, 5.0, 5.0]
        );
        assert!(neighbors
            .windows(2)
            .all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn expanded_metric_includes_differences() {
        // Differences of [1, 0] are [1, -1]; of [0, 1] are [-1, 1].
        let neighbors = k_nearest(&[1.0, 0.0], &reference(), NeighborMetric::Expanded);
        assert_eq!(neighbors[0].index, 2);
        assert_eq!(neighbors[0].distance, 0.0);

        let to_row3 = neighbors.iter().find(|n| n.index == 3).expect("present");
        assert_eq!(to_row3.distance, (2.0f64 + 8.0).sqrt());
    }

    #[test]
    fn empty_reference_yields_no_neighbors() {
        assert!(k_nearest(&[1.0], &Dataset::new(1), NeighborMetric::Raw).is_empty());
    }
}
