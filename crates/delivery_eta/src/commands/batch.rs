//! Batch command - scores every order in a CSV file, training first when the
//! file carries delivery times.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use config::Config;
use order_parser::{parse_orders_file, write_predictions};
use tracing::info;

use super::file_orchestrator;
use crate::orchestrator::{BatchMode, Branch};

/// Number of predictions echoed to the log after a run.
const PREVIEW_ROWS: usize = 5;

/// Runs the batch command.
///
/// # Arguments
///
/// * `config` - Application configuration
/// * `input` - CSV file with one order per row
/// * `output` - Where to write the table with the prediction column
/// * `mode` - Train/load selection
///
/// # Errors
///
/// Returns an error if the file cannot be read, the orchestrator rejects it,
/// or the output cannot be written.
pub fn run(config: &Config, input: &Path, output: &Path, mode: BatchMode) -> Result<()> {
    info!(input = %input.display(), ?mode, "Running batch prediction");

    let table = parse_orders_file(input)?;
    info!(rows = table.len(), "Loaded orders");

    let orchestrator = file_orchestrator(config);
    let outcome = orchestrator
        .predict_batch(&table, mode)
        .context("Batch prediction failed")?;

    match outcome.branch {
        Branch::Train => info!(
            version = outcome.model.version,
            training_rows = outcome.model.training_rows,
            path = %config.model_path.display(),
            "Model trained on uploaded data and saved for future predictions"
        ),
        Branch::Load => info!(
            version = outcome.model.version,
            "Used pre-trained model for prediction"
        ),
    }

    if let Some(summary) = outcome.summary() {
        info!(
            count = summary.count,
            mean = summary.mean,
            min = summary.min,
            max = summary.max,
            "Predicted delivery times (minutes)"
        );
    }

    for (row, minutes) in outcome.predictions.iter().take(PREVIEW_ROWS).enumerate() {
        info!(row, "Predicted {minutes:.1} minutes");
    }

    let file = File::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    write_predictions(&table, &outcome.predictions, BufWriter::new(file))
        .with_context(|| format!("Failed to write predictions to {}", output.display()))?;

    info!(output = %output.display(), "Saved predictions");
    Ok(())
}
