//! Single command - predicts one hand-entered order with the stored model.

use anyhow::{Context, Result};
use config::Config;
use order_structs::SingleOrder;
use tracing::info;

use super::file_orchestrator;

/// Runs the single command and returns the predicted minutes.
///
/// # Errors
///
/// Returns an error if the order is invalid or no model has been trained yet.
pub fn run(config: &Config, order: &SingleOrder) -> Result<f64> {
    info!(?order, "Predicting single order");

    let prediction = file_orchestrator(config)
        .predict_single(order)
        .context("Single-order prediction failed")?;

    info!(
        version = prediction.model_version,
        "Predicted Delivery ETA: {:.1} minutes",
        prediction.eta_minutes
    );

    Ok(prediction.eta_minutes)
}
