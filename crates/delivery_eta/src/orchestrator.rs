//! Prediction orchestration: decides between training a new model and loading
//! the stored one, then scores every row.
//!
//! One request moves strictly forward through
//! `columns checked -> trained | loaded -> predicted`; the first failure
//! aborts it with a [`PredictionError`] and nothing is produced.

use std::fmt;
use std::str::FromStr;

use config::Config;
use feature_extractor::{
    DerivedTable, derive_features, feature_vectors, missing_columns, single_order_features,
};
use ml_model::{ForestConfig, ModelMetadata, ModelStore, StoredModel, build_model, sample_rows};
use order_structs::{FeatureVector, OrderTable, SingleOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::PredictionError;

/// How the caller wants a batch request handled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Train when the upload has at least one delivery time, otherwise load.
    #[default]
    Auto,
    /// Always train; fails without labeled rows.
    Train,
    /// Always use the stored model.
    Predict,
}

impl FromStr for BatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "train" => Ok(Self::Train),
            "predict" => Ok(Self::Predict),
            other => Err(format!("Invalid mode: {other} (expected auto, train or predict)")),
        }
    }
}

/// The execution path a batch request took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Train,
    Load,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => f.write_str("train"),
            Self::Load => f.write_str("load"),
        }
    }
}

/// Tunables for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Maximum labeled rows used for one training run.
    pub sample_cap: usize,
    /// Row count above which a large-input warning is logged.
    pub large_input_rows: usize,
    /// Forest hyperparameters; its seed also drives subsampling.
    pub forest: ForestConfig,
}

impl OrchestratorSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            sample_cap: config.sample_cap,
            large_input_rows: config.large_input_rows,
            forest: ForestConfig {
                n_trees: config.n_trees,
                seed: config.seed,
                ..ForestConfig::default()
            },
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Simple statistics over batch predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl PredictionSummary {
    /// Returns `None` for an empty batch.
    #[must_use]
    pub fn from_predictions(predictions: &[f64]) -> Option<Self> {
        if predictions.is_empty() {
            return None;
        }

        let sum: f64 = predictions.iter().sum();
        let min = predictions.iter().copied().fold(f64::INFINITY, f64::min);
        let max = predictions.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            count: predictions.len(),
            mean: sum / predictions.len() as f64,
            min,
            max,
        })
    }
}

/// Result of a batch request: one prediction per input row, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub predictions: Vec<f64>,
    pub branch: Branch,
    /// Rows of the upload that carry a delivery time.
    pub labeled_rows: usize,
    /// Metadata of the model that produced the predictions.
    pub model: ModelMetadata,
}

impl BatchOutcome {
    #[must_use]
    pub fn summary(&self) -> Option<PredictionSummary> {
        PredictionSummary::from_predictions(&self.predictions)
    }

    /// Returns true if training used only a random subset of the labeled rows.
    #[must_use]
    pub const fn was_sampled(&self) -> bool {
        matches!(self.branch, Branch::Train) && self.model.training_rows < self.labeled_rows
    }
}

/// Result of a single-order request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SinglePrediction {
    pub eta_minutes: f64,
    pub model_version: u64,
}

/// Drives the train-or-load decision around a [`ModelStore`].
#[derive(Debug)]
pub struct Orchestrator<S> {
    store: S,
    settings: OrchestratorSettings,
}

impl<S: ModelStore> Orchestrator<S> {
    pub const fn new(store: S, settings: OrchestratorSettings) -> Self {
        Self { store, settings }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Scores an uploaded table, training a new model first when the mode
    /// (or, in `Auto`, the presence of delivery times) calls for it.
    ///
    /// Training overwrites the stored model.
    ///
    /// # Errors
    ///
    /// Returns an error if required columns are missing, a creation timestamp
    /// or feature value is invalid, no model is available for loading, or
    /// training/saving fails.
    pub fn predict_batch(
        &self,
        table: &OrderTable,
        mode: BatchMode,
    ) -> Result<BatchOutcome, PredictionError> {
        let missing = missing_columns(table);
        if !missing.is_empty() {
            warn!(?missing, "Rejecting upload with missing columns");
            return Err(PredictionError::MissingColumns(missing));
        }

        if table.len() > self.settings.large_input_rows {
            warn!(
                rows = table.len(),
                "Large file detected; training and prediction may take longer"
            );
        }

        let derived = derive_features(table)?;
        let features = feature_vectors(table, &derived)?;

        let branch = match mode {
            BatchMode::Auto if derived.has_targets() => Branch::Train,
            BatchMode::Auto | BatchMode::Predict => Branch::Load,
            BatchMode::Train => Branch::Train,
        };
        debug!(?mode, %branch, rows = table.len(), "Selected branch");

        let stored = match branch {
            Branch::Train => self.train(&features, &derived)?,
            Branch::Load => self.load()?,
        };

        let predictions = stored.model.predict(&features);

        info!(
            rows = predictions.len(),
            %branch,
            version = stored.metadata.version,
            "Predicted delivery times"
        );

        Ok(BatchOutcome {
            predictions,
            branch,
            labeled_rows: derived.labeled_count(),
            model: stored.metadata,
        })
    }

    /// Predicts one hand-entered order with the stored model.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is invalid or no model has been saved.
    pub fn predict_single(&self, order: &SingleOrder) -> Result<SinglePrediction, PredictionError> {
        let features = single_order_features(order)?;
        let stored = self.load()?;

        let eta_minutes = stored.model.predict_one(&features);
        info!(eta_minutes, version = stored.metadata.version, "Predicted single order");

        Ok(SinglePrediction {
            eta_minutes,
            model_version: stored.metadata.version,
        })
    }

    /// Trains on the labeled rows (subsampled past the cap) and saves the
    /// result as the next version.
    fn train(
        &self,
        features: &[FeatureVector],
        derived: &DerivedTable,
    ) -> Result<StoredModel, PredictionError> {
        let labeled: Vec<(usize, f64)> = derived
            .orders
            .iter()
            .enumerate()
            .filter_map(|(row, order)| order.delivery_time_minutes.map(|t| (row, t)))
            .collect();

        if labeled.is_empty() {
            return Err(PredictionError::NoTrainingTargets);
        }

        let cap = self.settings.sample_cap;
        if labeled.len() > cap {
            info!(
                sample = cap,
                labeled = derived.labeled_count(),
                "Training on a random sample of labeled rows"
            );
        }

        let picked = sample_rows(labeled.len(), cap, self.settings.forest.seed);
        let (x, y): (Vec<FeatureVector>, Vec<f64>) = picked
            .iter()
            .map(|&i| {
                let (row, target) = labeled[i];
                (features[row].clone(), target)
            })
            .unzip();

        info!(rows = x.len(), n_trees = self.settings.forest.n_trees, "Training model");
        let model = build_model(&x, &y, &self.settings.forest)?;

        let version = self.store.latest_version().map_or(1, |v| v + 1);
        let stored = StoredModel::new(model, version, x.len());
        self.store.save(&stored).map_err(PredictionError::Save)?;

        info!(version, "Model trained on uploaded data and saved for future predictions");
        Ok(stored)
    }

    fn load(&self) -> Result<StoredModel, PredictionError> {
        let stored = self.store.load_latest().map_err(|source| {
            warn!(error = %source, "No usable pre-trained model");
            PredictionError::NoModelAvailable { source }
        })?;

        info!(version = stored.metadata.version, "Using pre-trained model for prediction");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use feature_extractor::FeatureError;
    use ml_model::MemoryModelStore;

    use super::*;

    const HEADER: &str = "created_at,actual_delivery_time,estimated_store_to_consumer_driving_duration,subtotal,total_items,store_primary_category,market_id";

    fn settings() -> OrchestratorSettings {
        OrchestratorSettings {
            sample_cap: 50,
            large_input_rows: 20_000,
            forest: ForestConfig {
                n_trees: 5,
                ..ForestConfig::default()
            },
        }
    }

    fn orchestrator() -> Orchestrator<MemoryModelStore> {
        Orchestrator::new(MemoryModelStore::new(), settings())
    }

    fn table_from_rows(header: &str, rows: &[String]) -> OrderTable {
        let split = |line: &str| line.split(',').map(str::to_string).collect::<Vec<_>>();
        OrderTable::new(split(header), rows.iter().map(|r| split(r)).collect())
    }

    /// `n` orders; delivery takes `20 + drive/60 + items` minutes when labeled.
    fn orders(n: u32, labeled: bool) -> OrderTable {
        let rows: Vec<String> = (0..n)
            .map(|i| {
                let drive = 300 + (i * 37) % 900;
                let items = i % 5 + 1;
                let minutes = 20 + drive / 60 + items;
                let hour = i % 24;
                let delivered = if labeled {
                    format!("2024-03-04 {:02}:{:02}:00", hour + minutes / 60, minutes % 60)
                } else {
                    String::new()
                };
                let category = ["4", "pizza", "10"][(i % 3) as usize];
                format!(
                    "2024-03-04 {hour:02}:00:00,{delivered},{drive},{},{items},{category},{}",
                    1000 + i * 13,
                    i % 6
                )
            })
            .collect();
        table_from_rows(HEADER, &rows)
    }

    #[test]
    fn test_missing_columns_are_reported_before_touching_the_model() {
        let table = table_from_rows(
            "created_at,subtotal,total_items",
            &[String::from("2024-01-01 12:00:00,2500,3")],
        );

        let err = orchestrator()
            .predict_batch(&table, BatchMode::Auto)
            .expect_err("missing columns");

        match err {
            PredictionError::MissingColumns(columns) => assert_eq!(
                columns,
                vec![
                    "estimated_store_to_consumer_driving_duration",
                    "store_primary_category"
                ]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_all_null_targets_without_model_is_no_model_available() {
        let orchestrator = orchestrator();

        let err = orchestrator
            .predict_batch(&orders(10, false), BatchMode::Auto)
            .expect_err("no model saved");

        assert!(matches!(err, PredictionError::NoModelAvailable { .. }));
        assert!(orchestrator.store().load_latest().is_err());
    }

    #[test]
    fn test_train_then_load_is_deterministic() {
        let orchestrator = orchestrator();
        let labeled = orders(40, true);

        let trained = orchestrator
            .predict_batch(&labeled, BatchMode::Auto)
            .expect("train branch");
        assert_eq!(trained.branch, Branch::Train);
        assert_eq!(trained.model.version, 1);
        assert_eq!(trained.predictions.len(), 40);

        let loaded = orchestrator
            .predict_batch(&labeled, BatchMode::Predict)
            .expect("load branch");
        assert_eq!(loaded.branch, Branch::Load);
        assert_eq!(loaded.predictions, trained.predictions);

        // A fresh store trained on the same data reproduces the same outputs.
        let again = self::orchestrator()
            .predict_batch(&labeled, BatchMode::Auto)
            .expect("train branch");
        assert_eq!(again.predictions, trained.predictions);
    }

    #[test]
    fn test_unlabeled_upload_uses_stored_model() {
        let orchestrator = orchestrator();
        orchestrator
            .predict_batch(&orders(30, true), BatchMode::Auto)
            .expect("train branch");

        let outcome = orchestrator
            .predict_batch(&orders(12, false), BatchMode::Auto)
            .expect("load branch");

        assert_eq!(outcome.branch, Branch::Load);
        assert_eq!(outcome.predictions.len(), 12);
        assert!(outcome.predictions.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_training_overwrites_and_bumps_version() {
        let orchestrator = orchestrator();
        orchestrator
            .predict_batch(&orders(20, true), BatchMode::Auto)
            .expect("first training");
        let second = orchestrator
            .predict_batch(&orders(25, true), BatchMode::Train)
            .expect("second training");

        assert_eq!(second.model.version, 2);
        assert_eq!(orchestrator.store().latest_version(), Some(2));
        assert_eq!(second.model.training_rows, 25);
    }

    #[test]
    fn test_large_labeled_upload_is_subsampled_to_cap() {
        let orchestrator = orchestrator();

        let outcome = orchestrator
            .predict_batch(&orders(80, true), BatchMode::Auto)
            .expect("train branch");

        assert_eq!(outcome.model.training_rows, 50);
        assert_eq!(outcome.labeled_rows, 80);
        assert!(outcome.was_sampled());
        // Every row is still scored.
        assert_eq!(outcome.predictions.len(), 80);
    }

    #[test]
    fn test_sparse_targets_train_on_labeled_rows_only() {
        let labeled = orders(6, true);
        let unlabeled = orders(6, false);
        let mut rows: Vec<Vec<String>> = labeled.rows()[..2].to_vec();
        rows.extend_from_slice(unlabeled.rows());
        let table = OrderTable::new(labeled.headers().to_vec(), rows);

        let outcome = orchestrator()
            .predict_batch(&table, BatchMode::Auto)
            .expect("train branch");

        assert_eq!(outcome.branch, Branch::Train);
        assert_eq!(outcome.model.training_rows, 2);
        assert_eq!(outcome.predictions.len(), 8);
    }

    #[test]
    fn test_forced_training_without_targets_fails() {
        let err = orchestrator()
            .predict_batch(&orders(5, false), BatchMode::Train)
            .expect_err("nothing to train on");

        assert!(matches!(err, PredictionError::NoTrainingTargets));
    }

    #[test]
    fn test_unparseable_created_at_aborts() {
        let table = table_from_rows(
            HEADER,
            &[String::from("soon,,600,2500,3,4,1")],
        );

        let err = orchestrator()
            .predict_batch(&table, BatchMode::Auto)
            .expect_err("bad timestamp");

        assert!(matches!(
            err,
            PredictionError::Feature(FeatureError::UnparseableRequiredTimestamp { row: 0, .. })
        ));
    }

    #[test]
    fn test_single_order_requires_model() {
        let orchestrator = orchestrator();

        let err = orchestrator
            .predict_single(&SingleOrder::default())
            .expect_err("no model saved");
        assert!(matches!(err, PredictionError::NoModelAvailable { .. }));

        orchestrator
            .predict_batch(&orders(30, true), BatchMode::Auto)
            .expect("train branch");

        let unseen = SingleOrder {
            store_primary_category: String::from("martian-cuisine"),
            ..SingleOrder::default()
        };
        let prediction = orchestrator.predict_single(&unseen).expect("model saved");
        assert!(prediction.eta_minutes.is_finite());
        assert_eq!(prediction.model_version, 1);
    }

    #[test]
    fn test_single_order_matches_equivalent_batch_row() {
        let orchestrator = orchestrator();
        orchestrator
            .predict_batch(&orders(30, true), BatchMode::Auto)
            .expect("train branch");

        // 2024-01-01 is a Monday.
        let table = table_from_rows(
            HEADER,
            &[String::from("2024-01-01 12:00:00,,600,2500,3,4.0,1")],
        );
        let batch = orchestrator
            .predict_batch(&table, BatchMode::Auto)
            .expect("load branch");
        let single = orchestrator
            .predict_single(&SingleOrder::default())
            .expect("model saved");

        assert_relative_eq!(batch.predictions[0], single.eta_minutes);
    }

    #[test]
    fn test_summary() {
        let summary = PredictionSummary::from_predictions(&[10.0, 20.0, 45.0]).expect("non-empty");

        assert_eq!(summary.count, 3);
        assert_relative_eq!(summary.mean, 25.0);
        assert_relative_eq!(summary.min, 10.0);
        assert_relative_eq!(summary.max, 45.0);
        assert!(PredictionSummary::from_predictions(&[]).is_none());
    }

    #[test]
    fn test_batch_mode_from_str() {
        assert_eq!("Train".parse::<BatchMode>(), Ok(BatchMode::Train));
        assert_eq!("".parse::<BatchMode>(), Ok(BatchMode::Auto));
        assert!("retrain".parse::<BatchMode>().is_err());
    }
}
