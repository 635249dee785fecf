use serde::{Deserialize, Serialize};

/// Number of numeric (standardized) features.
pub const NUMERIC_FEATURE_COUNT: usize = 5;

/// The fields fed to the model for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Estimated store-to-consumer driving duration, in seconds.
    pub estimated_store_to_consumer_driving_duration: f64,

    /// Order subtotal, in minor currency units.
    pub subtotal: f64,

    pub total_items: f64,

    /// Hour of day the order was created (0-23).
    pub order_hour: u32,

    /// Day of week the order was created (0 = Monday).
    pub order_dayofweek: u32,

    /// Normalized store category code.
    pub store_primary_category: String,
}

impl FeatureVector {
    /// Returns the numeric features in model order.
    #[must_use]
    pub fn numeric(&self) -> [f64; NUMERIC_FEATURE_COUNT] {
        [
            self.estimated_store_to_consumer_driving_duration,
            self.subtotal,
            self.total_items,
            f64::from(self.order_hour),
            f64::from(self.order_dayofweek),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_order() {
        let features = FeatureVector {
            estimated_store_to_consumer_driving_duration: 600.0,
            subtotal: 2500.0,
            total_items: 3.0,
            order_hour: 12,
            order_dayofweek: 4,
            store_primary_category: String::from("4"),
        };

        assert_eq!(features.numeric(), [600.0, 2500.0, 3.0, 12.0, 4.0]);
    }
}
