use crate::dataset::Dataset;
use crate::neighbors::Neighbor;
use crate::regressor::{FitError, Regressor, TrainedRegressor};
use itertools::Itertools as _;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of nearest labeled rows on which the committee members are compared.
///
/// This is independent of the `k_neighbors` option.
pub const COMMITTEE_NEIGHBORS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressorId {
    /// Trained on the rows the separation regressor underestimates.
    Lower,

    /// Trained on the remaining rows.
    Upper,

    /// Trained on the whole labeled pool.
    Separation,
}

impl RegressorId {
    /// All members, in tie-break order.
    pub const ALL: [Self; 3] = [Self::Lower, Self::Upper, Self::Separation];

    pub const fn index(self) -> usize {
        match self {
            Self::Lower => 0,
            Self::Upper => 1,
            Self::Separation => 2,
        }
    }
}

impl fmt::Display for RegressorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Lower => write!(f, "lower"),
            Self::Upper => write!(f, "upper"),
            Self::Separation => write!(f, "separation"),
        }
    }
}

/// Outcome of comparing the members on a neighborhood.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub id: RegressorId,

    /// Squared error sums, indexed by [`RegressorId::index`].
    pub errors: [f64; 3],

    /// `true` if no member was strictly better than both others.
    pub tied: bool,
}

/// The two predictive regressors and the separation regressor.
#[derive(Debug)]
pub struct Committee<M> {
    members: [Option<M>; 3],
}

impl<M: TrainedRegressor> Committee<M> {
    pub fn new() -> Self {
        Self {
            members: [None, None, None],
        }
    }

    pub fn member(&self, id: RegressorId) -> Result<&M, CommitteeError> {
        self.members[id.index()]
            .as_ref()
            .ok_or(CommitteeError::Untrained(id))
    }

    pub fn is_trained(&self) -> bool {
        self.members.iter().all(Option::is_some)
    }

    /// Fits a single member, leaving the others untouched.
    pub fn fit_member<R>(
        &mut self,
        id: RegressorId,
        regressor: &R,
        data: &Dataset,
    ) -> Result<(), CommitteeError>
    where
        R: Regressor<Model = M>,
    {
        let model = regressor
            .fit(data)
            .map_err(|source| CommitteeError::Fit { id, source })?;
        self.members[id.index()] = Some(model);
        Ok(())
    }

    /// Refits every member from scratch.
    ///
    /// Members are only replaced once all three fits have succeeded.
    pub fn train<R>(
        &mut self,
        regressor: &R,
        labeled: &Dataset,
        lower: &Dataset,
        upper: &Dataset,
        parallel: bool,
    ) -> Result<(), CommitteeError>
    where
        R: Regressor<Model = M>,
    {
        let (l, (u, s)) = if parallel {
            rayon::join(
                || regressor.fit(lower),
                || rayon::join(|| regressor.fit(upper), || regressor.fit(labeled)),
            )
        } else {
            (
                regressor.fit(lower),
                (regressor.fit(upper), regressor.fit(labeled)),
            )
        };

        let fitted = |id, result: Result<M, FitError>| {
            result.map_err(|source| CommitteeError::Fit { id, source })
        };
        self.members = [
            Some(fitted(RegressorId::Lower, l)?),
            Some(fitted(RegressorId::Upper, u)?),
            Some(fitted(RegressorId::Separation, s)?),
        ];
        Ok(())
    }

    pub fn predict(&self, id: RegressorId, xs: &[f64]) -> Result<f64, CommitteeError> {
        Ok(self.member(id)?.predict(xs))
    }

    /// Picks the member with the smallest squared error over the first
    /// [`COMMITTEE_NEIGHBORS`] entries of `neighbors` (indices into `labeled`).
    ///
    /// Ties go to the member that comes first in [`RegressorId::ALL`].
    pub fn select(
        &self,
        labeled: &Dataset,
        neighbors: &[Neighbor],
    ) -> Result<Selection, CommitteeError> {
        if neighbors.len() < COMMITTEE_NEIGHBORS {
            return Err(CommitteeError::TooFewNeighbors {
                required: COMMITTEE_NEIGHBORS,
                available: neighbors.len(),
            });
        }

        let mut errors = [0.0; 3];
        for id in RegressorId::ALL {
            let member = self.member(id)?;
            errors[id.index()] = neighbors[..COMMITTEE_NEIGHBORS]
                .iter()
                .map(|n| &labeled.rows()[n.index])
                .map(|row| (member.predict(row.features()) - row.target()).powi(2))
                .sum();
        }

        let best = errors
            .iter()
            .position_min_by_key(|&&e| OrderedFloat(e))
            .expect("never fails");
        let tied = errors
            .iter()
            .filter(|&&e| OrderedFloat(e) == OrderedFloat(errors[best]))
            .count()
            > 1;
        Ok(Selection {
            id: RegressorId::ALL[best],
            errors,
            tied,
        })
    }
}

impl<M: TrainedRegressor> Default for Committee<M> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error, Clone)]
pub enum CommitteeError {
    #[error("regressor {0} has not been trained")]
    Untrained(RegressorId),

    #[error("failed to fit regressor {id}")]
    Fit {
        id: RegressorId,
        #[source]
        source: FitError,
    },

    #[error("{available} neighbors are available but {required} are required")]
    TooFewNeighbors { required: usize, available: usize },
}
