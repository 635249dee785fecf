use thiserror::Error;

/// Errors raised while deriving features from order rows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeatureError {
    /// Required input columns are absent from the table header.
    #[error("Missing columns in your data: {0:?}")]
    MissingColumns(Vec<String>),

    /// A `created_at` value could not be parsed; the whole request fails.
    #[error("Unparseable created_at timestamp {value:?} on row {row}")]
    UnparseableRequiredTimestamp { row: usize, value: String },

    /// A Feature Vector field is empty or not a finite number.
    #[error("Invalid value {value:?} in column {column} on row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Invalid single order: {0}")]
    InvalidSingleOrder(String),
}
