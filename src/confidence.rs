use crate::dataset::{Dataset, Row};
use crate::neighbors::{self, NeighborMetric};
use crate::regressor::{FitError, Regressor, TrainedRegressor};

/// Estimates how much adding `candidate` to `reference` would reduce the
/// squared error of `existing` around the candidate.
///
/// A throwaway model is fitted on `reference` plus the candidate (with the
/// candidate's current label). The result sums, over every row of `reference`,
/// the squared error of `existing` minus the squared error of that model.
/// Positive values mean the candidate helps.
pub fn score<R, M>(
    regressor: &R,
    reference: &Dataset,
    candidate: &Row,
    existing: &M,
    metric: NeighborMetric,
) -> Result<f64, FitError>
where
    R: Regressor,
    M: TrainedRegressor + ?Sized,
{
    let mut augmented = reference.clone();
    augmented.push(candidate.clone())?;
    let augmented = regressor.fit(&augmented)?;

    let confidence = neighbors::k_nearest(candidate.features(), reference, metric)
        .into_iter()
        .map(|n| &reference.rows()[n.index])
        .map(|row| {
            let before = (existing.predict(row.features()) - row.target()).powi(2);
            let after = (augmented.predict(row.features()) - row.target()).powi(2);
            before - after
        })
        .sum();
    Ok(confidence)
}
