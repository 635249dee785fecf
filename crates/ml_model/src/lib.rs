//! ML model crate for delivery time prediction.
//!
//! This crate fits a preprocessing + random forest pipeline that maps an
//! order's Feature Vector to a predicted delivery time in minutes, and
//! persists the fitted pipeline in a single-slot model store.

use order_structs::FeatureVector;
use serde::{Deserialize, Serialize};

mod error;
pub mod forest;
pub mod preprocess;
pub mod store;
pub mod training;

pub use error::{ModelError, StoreError};
pub use forest::{FeatureMatrix, ForestConfig, RandomForest};
pub use preprocess::Preprocessor;
pub use store::{FsModelStore, MemoryModelStore, ModelMetadata, ModelStore, StoredModel};
pub use training::{build_model, sample_rows};

/// Fitted pipeline: preprocessing followed by the forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryTimeModel {
    preprocessor: Preprocessor,
    forest: RandomForest,
}

impl DeliveryTimeModel {
    #[must_use]
    pub const fn new(preprocessor: Preprocessor, forest: RandomForest) -> Self {
        Self {
            preprocessor,
            forest,
        }
    }

    /// Predicts delivery minutes for every Feature Vector, in input order.
    #[must_use]
    pub fn predict(&self, features: &[FeatureVector]) -> Vec<f64> {
        let x = self.preprocessor.transform_all(features);
        self.forest.predict(&x)
    }

    /// Predicts delivery minutes for one order.
    #[must_use]
    pub fn predict_one(&self, features: &FeatureVector) -> f64 {
        self.forest
            .predict_row(&self.preprocessor.transform(features))
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.forest.n_trees()
    }

    /// Store categories seen during training.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        self.preprocessor.encoder().categories()
    }
}
