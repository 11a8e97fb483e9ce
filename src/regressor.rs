use crate::dataset::{Dataset, DatasetError};
use crate::table::TableError;
use thiserror::Error;

/// A trainable regression backend.
///
/// `fit` never mutates the backend itself, so one instance can produce any
/// number of independent models (the committee members and the throwaway
/// models used for confidence scoring).
pub trait Regressor: Send + Sync {
    type Model: TrainedRegressor;

    fn fit(&self, data: &Dataset) -> Result<Self::Model, FitError>;
}

pub trait TrainedRegressor: Send + Sync {
    fn predict(&self, xs: &[f64]) -> f64;
}

impl<T: Regressor + ?Sized> Regressor for &T {
    type Model = T::Model;

    fn fit(&self, data: &Dataset) -> Result<Self::Model, FitError> {
        (**self).fit(data)
    }
}

#[non_exhaustive]
#[derive(Debug, Error, Clone)]
pub enum FitError {
    #[error("cannot fit a regressor on an empty dataset")]
    EmptyDataset,

    #[error("normal equations are singular")]
    SingularSystem,

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl From<TableError> for FitError {
    fn from(f: TableError) -> Self {
        match f {
            TableError::EmptyTable => Self::EmptyDataset,
        }
    }
}
