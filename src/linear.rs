use crate::dataset::Dataset;
use crate::regressor::{FitError, Regressor, TrainedRegressor};
use nalgebra::{DMatrix, DVector};

/// Linear least squares with an L2 penalty on the weights.
///
/// The intercept is never penalized, so the training residuals of a fitted
/// model always sum to zero.
#[derive(Debug, Clone)]
pub struct RidgeRegressor {
    alpha: f64,
}

impl RidgeRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

impl Default for RidgeRegressor {
    fn default() -> Self {
        Self { alpha: 1e-4 }
    }
}

impl Regressor for RidgeRegressor {
    type Model = LinearModel;

    fn fit(&self, data: &Dataset) -> Result<Self::Model, FitError> {
        if data.is_empty() {
            return Err(FitError::EmptyDataset);
        }

        let rows = data.rows();
        let n = data.features_len();
        let x = DMatrix::from_fn(rows.len(), n, |i, j| rows[i].features()[j]);
        let y = DVector::from_iterator(rows.len(), data.target());

        let x_mean = x.row_mean();
        let y_mean = y.mean();
        let centered = DMatrix::from_fn(rows.len(), n, |i, j| x[(i, j)] - x_mean[j]);

        // (X'X + alpha I) w = X'y over centered data.
        let gram = centered.tr_mul(&centered) + DMatrix::<f64>::identity(n, n) * self.alpha;
        let moment = centered.tr_mul(&y.add_scalar(-y_mean));
        let weights = gram
            .lu()
            .solve(&moment)
            .filter(|w| w.iter().all(|v| v.is_finite()))
            .ok_or(FitError::SingularSystem)?;

        let intercept = y_mean - weights.dot(&x_mean.transpose());
        Ok(LinearModel { weights, intercept })
    }
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: DVector<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn weights(&self) -> &[f64] {
        self.weights.as_slice()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl TrainedRegressor for LinearModel {
    fn predict(&self, xs: &[f64]) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(xs)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}
