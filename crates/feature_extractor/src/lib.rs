//! Feature extractor crate for the delivery time model.
//!
//! This crate turns uploaded order rows into the derived attributes
//! (target duration, order hour, day of week) and the Feature Vectors the
//! model consumes.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use order_structs::{
    ACTUAL_DELIVERY_TIME, CREATED_AT, DRIVE_DURATION, DayOfWeek, FeatureVector, OrderTable,
    REQUIRED_INPUT_COLUMNS, STORE_CATEGORY, SUBTOTAL, SingleOrder, TOTAL_ITEMS,
};

mod error;

pub use error::FeatureError;

/// Naive timestamp layouts accepted besides RFC 3339.
const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
];

/// Attributes derived from one order row.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedOrder {
    /// Minutes between creation and actual delivery; `None` when the delivery
    /// timestamp is missing or unparseable. May be negative.
    pub delivery_time_minutes: Option<f64>,
    pub order_hour: u32,
    /// Monday = 0.
    pub order_dayofweek: u32,
}

/// Derived attributes for a whole table, one entry per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedTable {
    pub orders: Vec<DerivedOrder>,
}

impl DerivedTable {
    /// Returns the number of rows with a training target.
    #[must_use]
    pub fn labeled_count(&self) -> usize {
        self.orders
            .iter()
            .filter(|o| o.delivery_time_minutes.is_some())
            .count()
    }

    /// Returns true if at least one row has a training target.
    #[must_use]
    pub fn has_targets(&self) -> bool {
        self.orders
            .iter()
            .any(|o| o.delivery_time_minutes.is_some())
    }
}

/// Parses a timestamp the way the upload pipeline expects.
///
/// Offsets are kept so hour and weekday come from the wall clock as written;
/// naive values are read as UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Normalizes a store category so numeric-looking and text codes compare equal.
///
/// Integral numbers lose their fractional part (`"4.0"` becomes `"4"`);
/// everything else is only trimmed.
#[must_use]
pub fn normalize_category(value: &str) -> String {
    let trimmed = value.trim();

    match trimmed.parse::<f64>() {
        Ok(number) if number.is_finite() && number.fract() == 0.0 && number.abs() < 1e15 => {
            #[allow(clippy::cast_possible_truncation)]
            let integral = number as i64;
            integral.to_string()
        }
        _ => trimmed.to_string(),
    }
}

/// Returns the required input columns missing from the table, in canonical order.
#[must_use]
pub fn missing_columns(table: &OrderTable) -> Vec<String> {
    REQUIRED_INPUT_COLUMNS
        .iter()
        .filter(|name| !table.has_column(name))
        .map(|name| (*name).to_string())
        .collect()
}

/// Derives target, hour and day of week for every row.
///
/// # Errors
///
/// Returns an error if the `created_at` column is missing or any row has an
/// unparseable creation timestamp.
pub fn derive_features(table: &OrderTable) -> Result<DerivedTable, FeatureError> {
    let created_idx = table
        .column_index(CREATED_AT)
        .ok_or_else(|| FeatureError::MissingColumns(vec![CREATED_AT.to_string()]))?;
    let delivered_idx = table.column_index(ACTUAL_DELIVERY_TIME);

    let mut orders = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        let raw_created = table.cell(row, created_idx).unwrap_or_default();
        let created = parse_timestamp(raw_created).ok_or_else(|| {
            FeatureError::UnparseableRequiredTimestamp {
                row,
                value: raw_created.to_string(),
            }
        })?;

        let delivered = delivered_idx
            .and_then(|idx| table.cell(row, idx))
            .and_then(parse_timestamp);

        let delivery_time_minutes = delivered.map(|actual| {
            let elapsed = actual.signed_duration_since(created);
            let micros = elapsed
                .num_microseconds()
                .map_or_else(|| elapsed.num_milliseconds() as f64 * 1000.0, |us| us as f64);
            micros / 1_000_000.0 / 60.0
        });

        let local = created.naive_local();
        orders.push(DerivedOrder {
            delivery_time_minutes,
            order_hour: local.hour(),
            order_dayofweek: local.weekday().num_days_from_monday(),
        });
    }

    Ok(DerivedTable { orders })
}

/// Builds the Feature Vector of every row.
///
/// # Errors
///
/// Returns an error if a required column is missing or a row has an empty or
/// non-numeric feature value.
pub fn feature_vectors(
    table: &OrderTable,
    derived: &DerivedTable,
) -> Result<Vec<FeatureVector>, FeatureError> {
    let missing = missing_columns(table);
    if !missing.is_empty() {
        return Err(FeatureError::MissingColumns(missing));
    }

    let column = |name: &str| {
        table
            .column_index(name)
            .ok_or_else(|| FeatureError::MissingColumns(vec![name.to_string()]))
    };
    let drive_idx = column(DRIVE_DURATION)?;
    let subtotal_idx = column(SUBTOTAL)?;
    let items_idx = column(TOTAL_ITEMS)?;
    let category_idx = column(STORE_CATEGORY)?;

    derived
        .orders
        .iter()
        .enumerate()
        .map(|(row, order)| {
            let numeric = |idx: usize, name: &str| {
                parse_number(table.cell(row, idx).unwrap_or_default(), row, name)
            };

            let category = normalize_category(table.cell(row, category_idx).unwrap_or_default());
            if category.is_empty() {
                return Err(FeatureError::InvalidValue {
                    row,
                    column: STORE_CATEGORY.to_string(),
                    value: String::new(),
                });
            }

            Ok(FeatureVector {
                estimated_store_to_consumer_driving_duration: numeric(drive_idx, DRIVE_DURATION)?,
                subtotal: numeric(subtotal_idx, SUBTOTAL)?,
                total_items: numeric(items_idx, TOTAL_ITEMS)?,
                order_hour: order.order_hour,
                order_dayofweek: order.order_dayofweek,
                store_primary_category: category,
            })
        })
        .collect()
}

/// Builds the Feature Vector for a hand-entered order.
///
/// # Errors
///
/// Returns an error if the hour or day is out of range, a numeric field is not
/// finite or below its minimum, or the category is empty.
pub fn single_order_features(order: &SingleOrder) -> Result<FeatureVector, FeatureError> {
    if order.order_hour > 23 {
        return Err(FeatureError::InvalidSingleOrder(format!(
            "order hour must be between 0 and 23, got {}",
            order.order_hour
        )));
    }
    let day = DayOfWeek::try_from(order.order_dayofweek).map_err(|day| {
        FeatureError::InvalidSingleOrder(format!("day of week must be between 0 and 6, got {day}"))
    })?;

    // (column, value, smallest accepted value)
    let numeric = [
        (DRIVE_DURATION, order.estimated_store_to_consumer_driving_duration, 0.0),
        (SUBTOTAL, order.subtotal, 0.0),
        (TOTAL_ITEMS, order.total_items, 1.0),
    ];
    for (name, value, min) in numeric {
        if !value.is_finite() {
            return Err(FeatureError::InvalidSingleOrder(format!(
                "{name} must be a finite number, got {value}"
            )));
        }
        if value < min {
            return Err(FeatureError::InvalidSingleOrder(format!(
                "{name} must be at least {min}, got {value}"
            )));
        }
    }

    let category = normalize_category(&order.store_primary_category);
    if category.is_empty() {
        return Err(FeatureError::InvalidSingleOrder(String::from(
            "store category must not be empty",
        )));
    }

    Ok(FeatureVector {
        estimated_store_to_consumer_driving_duration: order
            .estimated_store_to_consumer_driving_duration,
        subtotal: order.subtotal,
        total_items: order.total_items,
        order_hour: order.order_hour,
        order_dayofweek: day.index(),
        store_primary_category: category,
    })
}

fn parse_number(value: &str, row: usize, column: &str) -> Result<f64, FeatureError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FeatureError::InvalidValue {
            row,
            column: column.to_string(),
            value: value.to_string(),
        })
}
