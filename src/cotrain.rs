//! The co-training loop.
//!
//! A session starts by splitting the training set into a small labeled pool
//! `L` and an unlabeled pool `U`, and by partitioning `L` according to whether
//! the separation regressor underestimates each row. Every iteration then
//! draws a sample pool from `U`, lets each committee member claim the
//! candidates it fits best, scores the claimed candidates, and moves the most
//! confident candidate of each member into `L` under a pseudo-label.
use crate::committee::{
    Committee, CommitteeError, RegressorId, Selection, COMMITTEE_NEIGHBORS,
};
use crate::confidence;
use crate::dataset::{Dataset, DatasetError};
use crate::neighbors::{self, NeighborMetric};
use crate::regressor::{FitError, Regressor, TrainedRegressor};
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::seq::SliceRandom as _;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The loop stops once fewer unlabeled rows than this remain.
pub const MIN_UNLABELED: usize = 100;

pub const DEFAULT_SEED: u64 = 19951004;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoTrainerOptions {
    iterations: usize,
    sample_pool_size: usize,
    k_neighbors: usize,
    labeled_proportion: f64,
    metric: NeighborMetric,
    seed: u64,
    parallel: bool,
}

impl CoTrainerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of iterations.
    pub fn iterations(mut self, n: usize) -> Self {
        self.iterations = n;
        self
    }

    /// Number of unlabeled candidates drawn per iteration.
    pub fn sample_pool_size(mut self, n: usize) -> Self {
        self.sample_pool_size = n;
        self
    }

    /// Recorded in the training report. Committee selection always compares
    /// on [`COMMITTEE_NEIGHBORS`] rows and confidence scoring on every row of
    /// the reference pool, whatever this is set to.
    pub fn k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k;
        self
    }

    /// Fraction of the training set that starts out labeled.
    pub fn labeled_proportion(mut self, p: f64) -> Self {
        self.labeled_proportion = p;
        self
    }

    pub fn metric(mut self, metric: NeighborMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fits the three committee members concurrently.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), TrainError> {
        let invalid = |reason: &str| {
            Err(TrainError::InvalidOptions {
                reason: reason.to_owned(),
            })
        };
        if self.sample_pool_size == 0 {
            return invalid("sample pool size must be positive");
        }
        if self.k_neighbors == 0 {
            return invalid("k_neighbors must be positive");
        }
        if !(self.labeled_proportion > 0.0 && self.labeled_proportion <= 1.0) {
            return invalid("labeled proportion must be in (0, 1]");
        }
        Ok(())
    }

    /// Runs a whole session on `data` and returns the trained model.
    pub fn fit<R: Regressor>(
        self,
        regressor: R,
        data: &Dataset,
    ) -> Result<Model<R::Model>, TrainError> {
        let mut session = CoTrainingSession::new(self, regressor, data)?;
        session.run()?;
        session.into_model()
    }
}

impl Default for CoTrainerOptions {
    fn default() -> Self {
        Self {
            iterations: 100,
            sample_pool_size: 20,
            k_neighbors: 3,
            labeled_proportion: 0.05,
            metric: NeighborMetric::default(),
            seed: DEFAULT_SEED,
            parallel: false,
        }
    }
}

/// State of a [`CoTrainingSession`]. Construction performs initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Iterating,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    IterationBudget,
    UnlabeledPoolExhausted,
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pool {
    Labeled,
    Unlabeled,

    /// Sub-pool of the rows the separation regressor underestimates.
    Lower,

    /// Sub-pool of the remaining labeled rows.
    Upper,
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Labeled => write!(f, "labeled"),
            Self::Unlabeled => write!(f, "unlabeled"),
            Self::Lower => write!(f, "lower"),
            Self::Upper => write!(f, "upper"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub iterations: usize,
    pub stop_reason: Option<StopReason>,
    pub labeled_len: usize,
    pub unlabeled_len: usize,
    pub lower_len: usize,
    pub upper_len: usize,
    pub k_neighbors: usize,
    pub degenerate_ties: usize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    confidence: f64,
}

#[derive(Debug)]
pub struct CoTrainingSession<R: Regressor> {
    options: CoTrainerOptions,
    regressor: R,
    rng: StdRng,
    phase: Phase,
    stop_reason: Option<StopReason>,
    iteration: usize,
    degenerate_ties: usize,
    labeled: Dataset,
    unlabeled: Dataset,
    lower: Dataset,
    upper: Dataset,
    committee: Committee<R::Model>,
}

impl<R: Regressor> CoTrainingSession<R> {
    /// Splits `data` into the labeled and unlabeled pools and trains the
    /// initial committee.
    pub fn new(
        options: CoTrainerOptions,
        regressor: R,
        data: &Dataset,
    ) -> Result<Self, TrainError> {
        options.validate()?;
        if data.is_empty() {
            return Err(DatasetError::EmptyDataset.into());
        }

        let mut rng = StdRng::seed_from_u64(options.seed);
        let (labeled, unlabeled) = data.random_split(options.labeled_proportion, &mut rng);
        if labeled.len() < COMMITTEE_NEIGHBORS {
            return Err(TrainError::InsufficientData {
                pool: Pool::Labeled,
                required: COMMITTEE_NEIGHBORS,
                available: labeled.len(),
            });
        }

        let mut committee = Committee::new();
        let initializing = |e| lift(e, 0, None);
        committee
            .fit_member(RegressorId::Separation, &regressor, &labeled)
            .map_err(initializing)?;

        let mut lower = Dataset::new(data.features_len());
        let mut upper = Dataset::new(data.features_len());
        for row in &labeled {
            let predicted = committee
                .predict(RegressorId::Separation, row.features())
                .map_err(initializing)?;
            if predicted < row.target() {
                lower.push(row.clone())?;
            } else {
                upper.push(row.clone())?;
            }
        }
        for (pool, rows) in [(Pool::Lower, &lower), (Pool::Upper, &upper)] {
            if rows.is_empty() {
                return Err(TrainError::InsufficientData {
                    pool,
                    required: 1,
                    available: 0,
                });
            }
        }
        committee
            .fit_member(RegressorId::Lower, &regressor, &lower)
            .map_err(initializing)?;
        committee
            .fit_member(RegressorId::Upper, &regressor, &upper)
            .map_err(initializing)?;

        info!(
            "co-training initialized: labeled={} (lower={}, upper={}), unlabeled={}",
            labeled.len(),
            lower.len(),
            upper.len(),
            unlabeled.len()
        );

        let mut session = Self {
            options,
            regressor,
            rng,
            phase: Phase::Iterating,
            stop_reason: None,
            iteration: 0,
            degenerate_ties: 0,
            labeled,
            unlabeled,
            lower,
            upper,
            committee,
        };
        session.check_termination();
        Ok(session)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn labeled(&self) -> &Dataset {
        &self.labeled
    }

    pub fn unlabeled(&self) -> &Dataset {
        &self.unlabeled
    }

    /// Sub-pool 1: rows the separation regressor underestimated, plus slot 0 pseudo-labels.
    pub fn lower(&self) -> &Dataset {
        &self.lower
    }

    /// Sub-pool 2: the rest of the initial labeled rows, plus slot 1 pseudo-labels.
    pub fn upper(&self) -> &Dataset {
        &self.upper
    }

    pub fn committee(&self) -> &Committee<R::Model> {
        &self.committee
    }

    /// Runs steps until the session is done.
    pub fn run(&mut self) -> Result<(), TrainError> {
        while self.step()? == Phase::Iterating {}
        info!(
            "co-training done after {} iterations ({:?}): labeled={}, unlabeled={}",
            self.iteration,
            self.stop_reason,
            self.labeled.len(),
            self.unlabeled.len()
        );
        Ok(())
    }

    /// Performs one iteration and returns the phase afterwards.
    ///
    /// A session that runs out of unlabeled candidates moves to
    /// [`Phase::Done`] and reports [`TrainError::InsufficientData`]; its pools
    /// and committee stay usable. Backend failures leave the session as it
    /// was before the step.
    pub fn step(&mut self) -> Result<Phase, TrainError> {
        if self.phase == Phase::Done {
            return Ok(Phase::Done);
        }

        let size = self.options.sample_pool_size;
        if self.unlabeled.len() < size {
            self.finish(StopReason::InsufficientData);
            return Err(TrainError::InsufficientData {
                pool: Pool::Unlabeled,
                required: size,
                available: self.unlabeled.len(),
            });
        }

        let mut order = (0..self.unlabeled.len()).collect::<Vec<_>>();
        order.shuffle(&mut self.rng);
        let sample_pool = &order[..size];

        let (trackers, ties) = self.scan(sample_pool)?;
        let selected =
            RegressorId::ALL.map(|id| trackers[id.index()].map_or(sample_pool[0], |c| c.index));

        let iteration = self.iteration;
        let mut labeled = self.labeled.clone();
        let mut lower = self.lower.clone();
        let mut upper = self.upper.clone();
        for id in RegressorId::ALL {
            let index = selected[id.index()];
            let row = &self.unlabeled.rows()[index];
            let label = self
                .committee
                .predict(id, row.features())
                .map_err(|e| lift(e, iteration, Some(index)))?;
            let pseudo = row.with_target(label);
            trace!(
                "iteration {}: {} pseudo-labels row {} as {}",
                iteration,
                id,
                index,
                label
            );

            match id {
                RegressorId::Lower => lower.push(pseudo.clone())?,
                RegressorId::Upper => upper.push(pseudo.clone())?,
                RegressorId::Separation => {}
            }
            labeled.push(pseudo)?;
        }

        let mut committee = Committee::new();
        committee
            .train(&self.regressor, &labeled, &lower, &upper, self.options.parallel)
            .map_err(|e| lift(e, iteration, None))?;

        let removed = self.unlabeled.remove_many(&selected)?;
        self.labeled = labeled;
        self.lower = lower;
        self.upper = upper;
        self.committee = committee;
        self.degenerate_ties += ties;
        self.iteration += 1;
        debug!(
            "iteration {}: selected={:?}, removed={}, labeled={}, unlabeled={}, ties={}",
            iteration,
            selected,
            removed,
            self.labeled.len(),
            self.unlabeled.len(),
            ties
        );

        self.check_termination();
        Ok(self.phase)
    }

    /// Returns the most confident candidate of each slot, and the number of
    /// candidates on which the committee was tied.
    fn scan(
        &self,
        sample_pool: &[usize],
    ) -> Result<([Option<Candidate>; 3], usize), TrainError> {
        let mut trackers: [Option<Candidate>; 3] = [None; 3];
        let mut ties = 0;
        for &index in sample_pool {
            let row = &self.unlabeled.rows()[index];
            let scanning = |e| lift(e, self.iteration, Some(index));

            let neighbors =
                neighbors::k_nearest(row.features(), &self.labeled, self.options.metric);
            let Selection { id, tied, .. } = self
                .committee
                .select(&self.labeled, &neighbors)
                .map_err(scanning)?;
            if tied {
                debug!(
                    "iteration {}: no member dominates around row {}",
                    self.iteration, index
                );
                ties += 1;
            }

            let existing = self.committee.member(id).map_err(scanning)?;
            let confidence = confidence::score(
                &self.regressor,
                self.reference_pool(id),
                row,
                existing,
                self.options.metric,
            )
            .map_err(|source| TrainError::Backend {
                iteration: self.iteration,
                regressor: id,
                row: Some(index),
                source,
            })?;
            trace!(
                "iteration {}: row {} -> {} (confidence {})",
                self.iteration,
                index,
                id,
                confidence
            );

            let tracker = &mut trackers[id.index()];
            if confidence > 0.0 && tracker.map_or(true, |c| c.confidence < confidence) {
                *tracker = Some(Candidate { index, confidence });
            }
        }
        Ok((trackers, ties))
    }

    fn reference_pool(&self, id: RegressorId) -> &Dataset {
        match id {
            RegressorId::Lower => &self.lower,
            RegressorId::Upper => &self.upper,
            RegressorId::Separation => &self.labeled,
        }
    }

    fn check_termination(&mut self) {
        if self.iteration >= self.options.iterations {
            self.finish(StopReason::IterationBudget);
        } else if self.unlabeled.len() < MIN_UNLABELED {
            self.finish(StopReason::UnlabeledPoolExhausted);
        }
    }

    fn finish(&mut self, reason: StopReason) {
        self.phase = Phase::Done;
        self.stop_reason = Some(reason);
    }

    pub fn report(&self) -> TrainingReport {
        TrainingReport {
            iterations: self.iteration,
            stop_reason: self.stop_reason,
            labeled_len: self.labeled.len(),
            unlabeled_len: self.unlabeled.len(),
            lower_len: self.lower.len(),
            upper_len: self.upper.len(),
            k_neighbors: self.options.k_neighbors,
            degenerate_ties: self.degenerate_ties,
        }
    }

    /// Converts a finished session into a queryable model.
    pub fn into_model(self) -> Result<Model<R::Model>, TrainError> {
        if self.phase != Phase::Done {
            return Err(TrainError::Unfinished {
                iteration: self.iteration,
            });
        }
        let report = self.report();
        Ok(Model {
            labeled: self.labeled,
            committee: self.committee,
            metric: self.options.metric,
            report,
        })
    }
}

fn lift(e: CommitteeError, iteration: usize, row: Option<usize>) -> TrainError {
    match e {
        CommitteeError::Untrained(id) => TrainError::UntrainedRegressor(id),
        CommitteeError::Fit { id, source } => TrainError::Backend {
            iteration,
            regressor: id,
            row,
            source,
        },
        CommitteeError::TooFewNeighbors {
            required,
            available,
        } => TrainError::InsufficientData {
            pool: Pool::Labeled,
            required,
            available,
        },
    }
}

/// A trained co-training committee together with its final labeled pool.
#[derive(Debug)]
pub struct Model<M> {
    labeled: Dataset,
    committee: Committee<M>,
    metric: NeighborMetric,
    report: TrainingReport,
}

impl<M: TrainedRegressor> Model<M> {
    /// Predicts with the member that fits the labeled neighborhood of `xs` best.
    pub fn predict(&self, xs: &[f64]) -> Result<f64, TrainError> {
        self.predict_with_selection(xs).map(|(y, _)| y)
    }

    pub fn predict_with_selection(&self, xs: &[f64]) -> Result<(f64, Selection), TrainError> {
        if xs.len() != self.labeled.features_len() {
            return Err(DatasetError::FeatureLenMismatch {
                expected: self.labeled.features_len(),
                actual: xs.len(),
            }
            .into());
        }

        let predicting = |e| lift(e, self.report.iterations, None);
        let neighbors = neighbors::k_nearest(xs, &self.labeled, self.metric);
        let selection = self
            .committee
            .select(&self.labeled, &neighbors)
            .map_err(predicting)?;
        let y = self.committee.predict(selection.id, xs).map_err(predicting)?;
        Ok((y, selection))
    }

    pub fn labeled(&self) -> &Dataset {
        &self.labeled
    }

    pub fn committee(&self) -> &Committee<M> {
        &self.committee
    }

    pub fn report(&self) -> &TrainingReport {
        &self.report
    }
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("invalid options: {reason}")]
    InvalidOptions { reason: String },

    #[error("{pool} pool has {available} rows but at least {required} are required")]
    InsufficientData {
        pool: Pool,
        required: usize,
        available: usize,
    },

    #[error("regressor {0} has not been trained")]
    UntrainedRegressor(RegressorId),

    #[error("failed to fit regressor {regressor} at iteration {iteration} (unlabeled row {row:?})")]
    Backend {
        iteration: usize,
        regressor: RegressorId,
        row: Option<usize>,
        #[source]
        source: FitError,
    },

    #[error("session is still iterating (iteration {iteration})")]
    Unfinished { iteration: usize },

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}
