//! Column preprocessing: standardized numeric features followed by a one-hot
//! block for the store category.

use order_structs::{FeatureVector, NUMERIC_FEATURE_COUNT};
use serde::{Deserialize, Serialize};

use crate::forest::FeatureMatrix;

/// Zero-mean, unit-variance scaling fit on the training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: [f64; NUMERIC_FEATURE_COUNT],
    scales: [f64; NUMERIC_FEATURE_COUNT],
}

impl StandardScaler {
    /// Fits population mean and standard deviation per column.
    ///
    /// Constant columns keep a scale of 1 so they map to zero.
    #[must_use]
    pub fn fit(rows: &[[f64; NUMERIC_FEATURE_COUNT]]) -> Self {
        let mut means = [0.0; NUMERIC_FEATURE_COUNT];
        let mut scales = [1.0; NUMERIC_FEATURE_COUNT];
        if rows.is_empty() {
            return Self { means, scales };
        }

        let n = rows.len() as f64;
        for (j, (mean, scale)) in means.iter_mut().zip(scales.iter_mut()).enumerate() {
            *mean = rows.iter().map(|r| r[j]).sum::<f64>() / n;
            let variance = rows.iter().map(|r| (r[j] - *mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            if std > f64::EPSILON * mean.abs().max(1.0) {
                *scale = std;
            }
        }

        Self { means, scales }
    }

    #[must_use]
    pub fn transform(&self, row: &[f64; NUMERIC_FEATURE_COUNT]) -> [f64; NUMERIC_FEATURE_COUNT] {
        let mut out = [0.0; NUMERIC_FEATURE_COUNT];
        for (j, value) in out.iter_mut().enumerate() {
            *value = (row[j] - self.means[j]) / self.scales[j];
        }
        out
    }
}

/// One-hot encoding over the categories seen during fit.
///
/// Unknown categories encode as all zeros instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Sorted, deduplicated.
    categories: Vec<String>,
}

impl OneHotEncoder {
    #[must_use]
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut categories: Vec<String> = values.into_iter().map(str::to_string).collect();
        categories.sort_unstable();
        categories.dedup();
        Self { categories }
    }

    /// Number of indicator columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Appends the indicator block for `value` to `out`.
    pub fn encode_into(&self, value: &str, out: &mut Vec<f64>) {
        let start = out.len();
        out.resize(start + self.width(), 0.0);
        if let Ok(idx) = self.categories.binary_search_by(|c| c.as_str().cmp(value)) {
            out[start + idx] = 1.0;
        }
    }
}

/// Preprocessing applied to every Feature Vector before the forest sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    scaler: StandardScaler,
    encoder: OneHotEncoder,
}

impl Preprocessor {
    /// Fits the scaler and encoder on the training features.
    #[must_use]
    pub fn fit(features: &[FeatureVector]) -> Self {
        let numeric: Vec<_> = features.iter().map(FeatureVector::numeric).collect();

        Self {
            scaler: StandardScaler::fit(&numeric),
            encoder: OneHotEncoder::fit(
                features.iter().map(|f| f.store_primary_category.as_str()),
            ),
        }
    }

    /// Number of model inputs produced per row.
    #[must_use]
    pub fn output_width(&self) -> usize {
        NUMERIC_FEATURE_COUNT + self.encoder.width()
    }

    #[must_use]
    pub const fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    /// Transforms one Feature Vector into model inputs.
    #[must_use]
    pub fn transform(&self, features: &FeatureVector) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.output_width());
        row.extend_from_slice(&self.scaler.transform(&features.numeric()));
        self.encoder
            .encode_into(&features.store_primary_category, &mut row);
        row
    }

    /// Transforms a batch of Feature Vectors into a matrix.
    #[must_use]
    pub fn transform_all(&self, features: &[FeatureVector]) -> FeatureMatrix {
        let mut matrix = FeatureMatrix::new(self.output_width());
        for f in features {
            matrix.push_row(&self.transform(f));
        }
        matrix
    }
}
