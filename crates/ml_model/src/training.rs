//! Training logic for the delivery time model.

use order_structs::FeatureVector;
use rand::SeedableRng;
use rand::seq::index;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::forest::{ForestConfig, RandomForest, RegressionTree};
use crate::preprocess::Preprocessor;
use crate::{DeliveryTimeModel, ModelError};

/// Fits the preprocessing pipeline and the forest on exactly the given rows.
///
/// No holdout is taken and no size limit is applied; callers subsample large
/// inputs with [`sample_rows`] first.
///
/// # Errors
///
/// Returns an error if the inputs are empty, differ in length, or a target is
/// not finite.
pub fn build_model(
    features: &[FeatureVector],
    targets: &[f64],
    config: &ForestConfig,
) -> Result<DeliveryTimeModel, ModelError> {
    if features.len() != targets.len() {
        return Err(ModelError::LengthMismatch {
            features: features.len(),
            targets: targets.len(),
        });
    }
    if features.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if let Some(row) = targets.iter().position(|t| !t.is_finite()) {
        return Err(ModelError::NonFiniteTarget { row });
    }

    let preprocessor = Preprocessor::fit(features);
    let x = preprocessor.transform_all(features);

    debug!(
        rows = x.n_rows(),
        inputs = x.n_cols(),
        categories = preprocessor.encoder().width(),
        n_trees = config.n_trees,
        "Fitting forest"
    );

    let forest = RandomForest::fit(config, &x, targets);

    debug!(
        leaves = forest.trees().iter().map(RegressionTree::n_leaves).sum::<usize>(),
        "Forest fitted"
    );

    Ok(DeliveryTimeModel::new(preprocessor, forest))
}

/// Picks the rows to train on.
///
/// Returns every index when `n <= cap`; otherwise exactly `cap` distinct
/// indices drawn with a generator seeded by `seed`, in ascending order.
#[must_use]
pub fn sample_rows(n: usize, cap: usize, seed: u64) -> Vec<usize> {
    if n <= cap {
        return (0..n).collect();
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut picked = index::sample(&mut rng, n, cap).into_vec();
    picked.sort_unstable();
    picked
}
