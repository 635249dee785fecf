//! Column names of the uploaded order table.

pub const CREATED_AT: &str = "created_at";
pub const ACTUAL_DELIVERY_TIME: &str = "actual_delivery_time";
pub const DRIVE_DURATION: &str = "estimated_store_to_consumer_driving_duration";
pub const SUBTOTAL: &str = "subtotal";
pub const TOTAL_ITEMS: &str = "total_items";
pub const STORE_CATEGORY: &str = "store_primary_category";

/// Column appended to batch results.
pub const PREDICTION_COLUMN: &str = "Predicted_Delivery_Time_Minutes";

/// File name offered for the batch results download.
pub const PREDICTIONS_FILE_NAME: &str = "delivery_eta_predictions.csv";

/// Raw columns that must be present before any feature can be derived.
pub const REQUIRED_INPUT_COLUMNS: [&str; 5] = [
    CREATED_AT,
    DRIVE_DURATION,
    SUBTOTAL,
    TOTAL_ITEMS,
    STORE_CATEGORY,
];

