use feature_extractor::FeatureError;
use ml_model::{ModelError, StoreError};
use thiserror::Error;

/// Reasons a prediction request is aborted.
///
/// Every variant is terminal for the current request only.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Missing columns in your data: {0:?}")]
    MissingColumns(Vec<String>),

    #[error(
        "No target column found and no pre-trained model available. \
         Upload a CSV with delivery times to train a model first."
    )]
    NoModelAvailable {
        #[source]
        source: StoreError,
    },

    #[error("Training was requested but no row has a parseable actual_delivery_time")]
    NoTrainingTargets,

    /// Unparseable `created_at`, invalid feature values, or an invalid single order.
    #[error(transparent)]
    Feature(FeatureError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Failed to save the trained model")]
    Save(#[source] StoreError),
}

impl From<FeatureError> for PredictionError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::MissingColumns(columns) => Self::MissingColumns(columns),
            other => Self::Feature(other),
        }
    }
}

impl PredictionError {
    /// Returns true if the request failed because of what the user sent.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MissingColumns(_) | Self::NoTrainingTargets | Self::Feature(_)
        )
    }
}
