use serde::{Deserialize, Serialize};

/// A single order entered by hand, as submitted by the single-order form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleOrder {
    /// Estimated store-to-consumer driving duration, in seconds.
    pub estimated_store_to_consumer_driving_duration: f64,

    /// Order subtotal, in minor currency units.
    pub subtotal: f64,

    pub total_items: f64,

    /// Hour of day (0-23).
    pub order_hour: u32,

    /// Day of week (0 = Monday).
    pub order_dayofweek: u32,

    pub store_primary_category: String,
}

impl Default for SingleOrder {
    fn default() -> Self {
        Self {
            estimated_store_to_consumer_driving_duration: 600.0,
            subtotal: 2500.0,
            total_items: 3.0,
            order_hour: 12,
            order_dayofweek: 0,
            store_primary_category: String::from("4"),
        }
    }
}
