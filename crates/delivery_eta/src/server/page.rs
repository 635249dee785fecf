//! The single HTML page served by the UI.

use order_structs::{DayOfWeek, PREDICTIONS_FILE_NAME, SingleOrder};
use strum::IntoEnumIterator;

use crate::orchestrator::{BatchOutcome, Branch};

/// Predictions listed on the results page.
const PREVIEW_ROWS: usize = 5;

/// What the page shows besides the two forms.
#[derive(Debug, Default)]
pub struct PageView {
    /// Values pre-filled in the single-order form.
    pub order: SingleOrder,
    pub eta_minutes: Option<f64>,
    pub batch: Option<BatchView>,
    pub error: Option<String>,
}

/// A scored upload: the outcome plus the CSV offered for download.
#[derive(Debug)]
pub struct BatchView {
    pub outcome: BatchOutcome,
    pub csv: String,
}

pub fn render(view: &PageView) -> String {
    let order = &view.order;

    let notice = match (&view.error, view.eta_minutes) {
        (Some(error), _) => format!("<p class=\"error\">{}</p>", escape(error)),
        (None, Some(eta)) => format!("<p class=\"eta\">Predicted Delivery ETA: {eta:.1} minutes</p>"),
        (None, None) => String::new(),
    };

    let results = view.batch.as_ref().map(render_batch).unwrap_or_default();

    let days: String = DayOfWeek::iter()
        .map(|day| {
            let selected = if day.index() == order.order_dayofweek {
                " selected"
            } else {
                ""
            };
            format!("<option value=\"{}\"{selected}>{day}</option>", day.index())
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Delivery ETA Predictor</title>
</head>
<body>
<h1>Delivery ETA Predictor</h1>
{notice}
{results}
<h2>Batch prediction</h2>
<p>Upload a CSV with created_at, estimated_store_to_consumer_driving_duration,
subtotal, total_items and store_primary_category. Files that include
actual_delivery_time train a new model first.</p>
<form action="/batch" method="post" enctype="multipart/form-data">
<input type="file" name="file" accept=".csv" required>
<select name="mode">
<option value="auto" selected>Auto</option>
<option value="train">Train</option>
<option value="predict">Predict</option>
</select>
<button type="submit">Predict</button>
</form>
<h2>Single order</h2>
<form action="/single" method="post">
<label>Driving duration (seconds) <input type="number" step="any" name="estimated_store_to_consumer_driving_duration" value="{drive}"></label>
<label>Subtotal <input type="number" step="any" name="subtotal" value="{subtotal}"></label>
<label>Total items <input type="number" step="any" name="total_items" value="{items}"></label>
<label>Order hour <input type="range" min="0" max="23" name="order_hour" value="{hour}"></label>
<label>Day of week <select name="order_dayofweek">{days}</select></label>
<label>Store category <input type="text" name="store_primary_category" value="{category}"></label>
<button type="submit">Predict</button>
</form>
</body>
</html>
"#,
        drive = order.estimated_store_to_consumer_driving_duration,
        subtotal = order.subtotal,
        items = order.total_items,
        hour = order.order_hour,
        category = escape(&order.store_primary_category),
    )
}

fn render_batch(batch: &BatchView) -> String {
    let outcome = &batch.outcome;
    let version = outcome.model.version;

    let mut notices = Vec::new();
    if outcome.was_sampled() {
        notices.push(format!(
            "Training on a random sample of {} rows out of {} labeled rows.",
            outcome.model.training_rows, outcome.labeled_rows
        ));
    }
    notices.push(match outcome.branch {
        Branch::Train => format!(
            "Model trained on uploaded data and saved for future predictions (version {version})."
        ),
        Branch::Load => format!("Using pre-trained model (version {version}) for prediction."),
    });
    let notices: String = notices
        .iter()
        .map(|n| format!("<p class=\"notice\">{n}</p>\n"))
        .collect();

    let summary = outcome
        .summary()
        .map(|s| {
            format!(
                "<table>\n<tr><th>Orders</th><th>Mean</th><th>Min</th><th>Max</th></tr>\n\
                 <tr><td>{}</td><td>{:.1}</td><td>{:.1}</td><td>{:.1}</td></tr>\n</table>\n",
                s.count, s.mean, s.min, s.max
            )
        })
        .unwrap_or_default();

    let preview: String = outcome
        .predictions
        .iter()
        .take(PREVIEW_ROWS)
        .map(|minutes| format!("<li>{minutes:.1} minutes</li>"))
        .collect();

    format!(
        r#"<h2>Results</h2>
{notices}{summary}<h3>First predictions</h3>
<ol start="0">{preview}</ol>
<form action="/batch/download" method="post">
<textarea name="csv" hidden>{csv}</textarea>
<button type="submit">Download {PREDICTIONS_FILE_NAME}</button>
</form>
"#,
        csv = escape(&batch.csv),
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eta_and_selected_day() {
        let view = PageView {
            order: SingleOrder {
                order_dayofweek: 4,
                ..SingleOrder::default()
            },
            eta_minutes: Some(37.24),
            ..PageView::default()
        };

        let html = render(&view);
        assert!(html.contains("Predicted Delivery ETA: 37.2 minutes"));
        assert!(html.contains("<option value=\"4\" selected>Fri</option>"));
    }

    #[test]
    fn test_user_text_is_escaped() {
        let view = PageView {
            order: SingleOrder {
                store_primary_category: String::from("\"><script>"),
                ..SingleOrder::default()
            },
            error: Some(String::from("bad <input>")),
            ..PageView::default()
        };

        let html = render(&view);
        assert!(!html.contains("<script>"));
        assert!(html.contains("bad &lt;input&gt;"));
    }
}
