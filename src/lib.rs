pub use committee::{Committee, RegressorId, Selection, COMMITTEE_NEIGHBORS};
pub use cotrain::{
    CoTrainerOptions, CoTrainingSession, Model, Phase, StopReason, TrainError, TrainingReport,
};
pub use dataset::{Dataset, DatasetError, Row};
pub use decision_tree::RegressionTree;
pub use linear::{LinearModel, RidgeRegressor};
pub use neighbors::{Neighbor, NeighborMetric};
pub use random_forest::{RandomForestOptions, RandomForestRegressor};
pub use regressor::{FitError, Regressor, TrainedRegressor};

pub mod committee;
pub mod confidence;
pub mod cotrain;
pub mod dataset;
pub mod features;
pub mod functions;
pub mod neighbors;

mod decision_tree;
mod linear;
mod random_forest;
mod regressor;
mod table;
