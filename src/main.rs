use anyhow::{anyhow, ensure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use srpf::{
    functions, CoTrainerOptions, Dataset, NeighborMetric, RandomForestOptions, Regressor,
    RidgeRegressor, TrainingReport,
};
use std::num::NonZeroUsize;
use structopt::StructOpt;

#[derive(Debug, Deserialize)]
struct Column {
    name: String,
    data: Vec<f64>,
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "srpf",
    about = "Runs repeated co-training regression experiments on JSON columns read from stdin"
)]
struct Opt {
    /// Maximum number of co-training iterations.
    #[structopt(long, default_value = "20")]
    iterations: usize,

    /// Unlabeled candidates drawn per iteration.
    #[structopt(long, default_value = "100")]
    sample_pool_size: usize,

    #[structopt(long, default_value = "2")]
    k_neighbors: usize,

    /// Fraction of the training split that starts out labeled.
    #[structopt(long, default_value = "0.05")]
    labeled_proportion: f64,

    #[structopt(long, default_value = "10")]
    trials: usize,

    /// Fraction of the rows used for training in each trial.
    #[structopt(long, default_value = "0.7")]
    train_ratio: f64,

    #[structopt(long, default_value = "19951004")]
    seed: u64,

    #[structopt(long, default_value = "ridge", possible_values = &["ridge", "forest"])]
    backend: String,

    /// Number of trees of the `forest` backend.
    #[structopt(long, default_value = "100")]
    trees: NonZeroUsize,

    /// Smallest leaf of the `forest` backend's trees.
    #[structopt(long, default_value = "1")]
    min_samples_leaf: NonZeroUsize,

    /// Measures neighbor distances over the expanded features.
    #[structopt(long)]
    expanded_metric: bool,

    /// Min-max normalizes every column before splitting.
    #[structopt(long)]
    normalize: bool,

    #[structopt(long)]
    parallel: bool,
}

#[derive(Debug, Serialize)]
struct Trial {
    rmse: f64,
    report: TrainingReport,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    target: &'a str,
    trials: Vec<Trial>,
    mean_rmse: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opt = Opt::from_args();
    ensure!(opt.trials > 0, "at least one trial is required");
    ensure!(
        opt.train_ratio > 0.0 && opt.train_ratio < 1.0,
        "train ratio must be in (0, 1)"
    );

    let columns: Vec<Column> = serde_json::from_reader(std::io::stdin().lock())?;
    ensure!(columns.len() >= 2, "too few columns");

    let (target, features) = columns.split_last().ok_or_else(|| anyhow!("no columns"))?;
    let mut dataset = Dataset::from_columns(
        features.iter().map(|c| c.data.as_slice()).collect(),
        &target.data,
    )?;
    if opt.normalize {
        dataset.normalize();
    }
    log::info!(
        "loaded {} rows with {} features, target column {:?}",
        dataset.len(),
        dataset.features_len(),
        target.name
    );

    let mut rng = StdRng::seed_from_u64(opt.seed);
    let mut trials = Vec::with_capacity(opt.trials);
    for i in 0..opt.trials {
        let (train, test) = dataset.random_split(opt.train_ratio, &mut rng);
        let options = CoTrainerOptions::new()
            .iterations(opt.iterations)
            .sample_pool_size(opt.sample_pool_size)
            .k_neighbors(opt.k_neighbors)
            .labeled_proportion(opt.labeled_proportion)
            .metric(if opt.expanded_metric {
                NeighborMetric::Expanded
            } else {
                NeighborMetric::Raw
            })
            .seed(rng.gen())
            .parallel(opt.parallel);

        let trial = match opt.backend.as_str() {
            "forest" => {
                let forest = RandomForestOptions::default()
                    .trees(opt.trees)
                    .min_samples_leaf(opt.min_samples_leaf)
                    .seed(rng.gen())
                    .parallel(opt.parallel);
                run_trial(options, forest, &train, &test)?
            }
            _ => run_trial(options, RidgeRegressor::new(), &train, &test)?,
        };
        log::info!("trial {}: rmse={}", i, trial.rmse);
        trials.push(trial);
    }

    let mean_rmse = functions::mean(trials.iter().map(|t| t.rmse));
    let summary = Summary {
        target: &target.name,
        trials,
        mean_rmse,
    };
    serde_json::to_writer_pretty(std::io::stdout().lock(), &summary)?;
    println!();

    Ok(())
}

fn run_trial<R: Regressor>(
    options: CoTrainerOptions,
    regressor: R,
    train: &Dataset,
    test: &Dataset,
) -> anyhow::Result<Trial> {
    ensure!(!test.is_empty(), "test split is empty");

    let model = options.fit(regressor, train)?;
    let predictions = test
        .iter()
        .map(|row| model.predict(row.features()))
        .collect::<Result<Vec<_>, _>>()?;
    let rmse = functions::rmse(predictions.into_iter().zip(test.target()));
    Ok(Trial {
        rmse,
        report: model.report().clone(),
    })
}
