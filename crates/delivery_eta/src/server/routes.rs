//! Route handlers.

use axum::Json;
use axum::extract::{Form, Multipart, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use order_parser::{parse_orders, predictions_to_csv};
use order_structs::{OrderTable, PREDICTIONS_FILE_NAME, SingleOrder};
use serde::Deserialize;
use tracing::info;

use super::page::{BatchView, PageView, render};
use super::{ApiError, AppState};
use crate::orchestrator::{BatchMode, BatchOutcome, SinglePrediction};

#[derive(Debug, Default, Deserialize)]
pub struct ModeQuery {
    #[serde(default)]
    pub mode: BatchMode,
}

/// Scored CSV posted back by the results page's download button.
#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    pub csv: String,
}

/// Landing page with the upload form and the single-order form.
pub async fn index() -> Html<String> {
    Html(render(&PageView::default()))
}

/// Liveness plus the version of the stored model, if any.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let model_version = state
        .run(|o| o.store().latest_version())
        .await
        .ok()
        .flatten();

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model_version": model_version,
    }))
}

/// Browser upload: multipart `file` plus optional `mode`.
///
/// Answers with the page showing the outcome, a preview and a download
/// button, or the error.
pub async fn batch_upload(State(state): State<AppState>, multipart: Multipart) -> Response {
    let result = async {
        let (csv, mode) = read_upload(multipart).await?;
        let (table, outcome) = score_table(&state, &csv, mode).await?;
        let scored = predictions_to_csv(&table, &outcome.predictions)
            .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
        let csv = String::from_utf8(scored)
            .map_err(|e| ApiError::Internal(format!("Scored CSV is not UTF-8: {e}")))?;
        Ok::<_, ApiError>(BatchView { outcome, csv })
    }
    .await;

    match result {
        Ok(batch) => {
            let view = PageView {
                batch: Some(batch),
                ..PageView::default()
            };
            Html(render(&view)).into_response()
        }
        Err(err) => {
            let status = err.report();
            let view = PageView {
                error: Some(err.to_string()),
                ..PageView::default()
            };
            (status, Html(render(&view))).into_response()
        }
    }
}

/// Download button of the results page: hands the scored CSV back as a file.
pub async fn batch_download(Form(form): Form<DownloadForm>) -> Response {
    csv_attachment(form.csv.into_bytes())
}

/// Browser single-order form.
pub async fn single_form(
    State(state): State<AppState>,
    Form(order): Form<SingleOrder>,
) -> (StatusCode, Html<String>) {
    let job_order = order.clone();
    let result = state.run(move |o| o.predict_single(&job_order)).await;

    let (status, view) = match result.and_then(|r| r.map_err(ApiError::from)) {
        Ok(prediction) => (
            StatusCode::OK,
            PageView {
                order,
                eta_minutes: Some(prediction.eta_minutes),
                ..PageView::default()
            },
        ),
        Err(err) => (
            err.report(),
            PageView {
                order,
                error: Some(err.to_string()),
                ..PageView::default()
            },
        ),
    };

    (status, Html(render(&view)))
}

/// API batch: CSV request body, CSV response.
pub async fn api_batch(
    State(state): State<AppState>,
    Query(query): Query<ModeQuery>,
    body: String,
) -> Result<Response, ApiError> {
    let (table, outcome) = score_table(&state, &body, query.mode).await?;
    let bytes = predictions_to_csv(&table, &outcome.predictions)
        .map_err(|e| ApiError::Internal(format!("{e:#}")))?;
    Ok(csv_attachment(bytes))
}

/// API single order.
pub async fn api_single(
    State(state): State<AppState>,
    Json(order): Json<SingleOrder>,
) -> Result<Json<SinglePrediction>, ApiError> {
    let prediction = state.run(move |o| o.predict_single(&order)).await??;
    Ok(Json(prediction))
}

async fn read_upload(mut multipart: Multipart) -> Result<(String, BatchMode), ApiError> {
    let mut csv = None;
    let mut mode = BatchMode::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.body_text()))?
    {
        match field.name() {
            Some("file") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidUpload(e.body_text()))?;
                csv = Some(text);
            }
            Some("mode") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::InvalidUpload(e.body_text()))?;
                mode = text.parse().map_err(ApiError::InvalidUpload)?;
            }
            _ => {}
        }
    }

    let csv = csv.ok_or_else(|| ApiError::InvalidUpload(String::from("No file was uploaded")))?;
    Ok((csv, mode))
}

async fn score_table(
    state: &AppState,
    csv: &str,
    mode: BatchMode,
) -> Result<(OrderTable, BatchOutcome), ApiError> {
    let table = read_table(csv)?;
    info!(rows = table.len(), ?mode, "Received orders");

    let (table, outcome) = state
        .run(move |o| {
            let outcome = o.predict_batch(&table, mode);
            (table, outcome)
        })
        .await?;
    let outcome = outcome?;

    if let Some(summary) = outcome.summary() {
        info!(
            branch = %outcome.branch,
            version = outcome.model.version,
            count = summary.count,
            mean = summary.mean,
            "Scored upload"
        );
    }

    Ok((table, outcome))
}

fn csv_attachment(bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, String::from("text/csv; charset=utf-8")),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{PREDICTIONS_FILE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn read_table(csv: &str) -> Result<OrderTable, ApiError> {
    parse_orders(csv.as_bytes()).map_err(|e| ApiError::InvalidUpload(format!("{e:#}")))
}
