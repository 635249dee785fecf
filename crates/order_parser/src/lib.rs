//! Order parser crate for delivery order uploads.
//!
//! This crate wraps the `csv` library to read uploaded order files into an
//! [`OrderTable`] and to write the table back out with a prediction column.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Writer};
use order_structs::{OrderTable, PREDICTION_COLUMN};
use tracing::debug;

/// Parses an order table from CSV text with a header row.
///
/// # Errors
///
/// Returns an error if the input is not valid CSV.
pub fn parse_orders<R: Read>(reader: R) -> Result<OrderTable> {
    let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse CSV row {}", i + 1))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!(columns = headers.len(), rows = rows.len(), "Parsed order table");

    Ok(OrderTable::new(headers, rows))
}

/// Parses an order table from a file on disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn parse_orders_file(path: &Path) -> Result<OrderTable> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    parse_orders(file)
}

/// Writes the table with one appended prediction column.
///
/// # Errors
///
/// Returns an error if the prediction count does not match the row count or
/// writing fails.
pub fn write_predictions<W: Write>(
    table: &OrderTable,
    predictions: &[f64],
    writer: W,
) -> Result<()> {
    anyhow::ensure!(
        predictions.len() == table.len(),
        "Got {} predictions for {} rows",
        predictions.len(),
        table.len()
    );

    let mut writer = Writer::from_writer(writer);

    let mut header: Vec<&str> = table.headers().iter().map(String::as_str).collect();
    header.push(PREDICTION_COLUMN);
    writer.write_record(&header)?;

    for (row, prediction) in table.rows().iter().zip(predictions) {
        let prediction = prediction.to_string();
        writer.write_record(row.iter().map(String::as_str).chain([prediction.as_str()]))?;
    }

    writer.flush()?;
    Ok(())
}

/// Renders the table with predictions as CSV bytes.
///
/// # Errors
///
/// Returns an error if the prediction count does not match the row count.
pub fn predictions_to_csv(table: &OrderTable, predictions: &[f64]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_predictions(table, predictions, &mut buffer)?;
    Ok(buffer)
}
