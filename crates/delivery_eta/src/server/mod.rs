//! Web UI and JSON API.
//!
//! Handlers hand the CPU-bound work to the blocking pool and take the
//! orchestrator lock there, so at most one training or prediction runs at a
//! time.

use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ml_model::ModelStore;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::PredictionError;
use crate::orchestrator::Orchestrator;

mod page;
mod routes;

/// Largest accepted upload, matching the usual 200 MB browser upload limit.
const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

pub type SharedStore = Arc<dyn ModelStore>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Mutex<Orchestrator<SharedStore>>>,
}

impl AppState {
    #[must_use]
    pub fn new(orchestrator: Orchestrator<SharedStore>) -> Self {
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
        }
    }

    /// Runs `job` on the blocking pool with exclusive access to the orchestrator.
    async fn run<T, F>(&self, job: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Orchestrator<SharedStore>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::task::spawn_blocking(move || {
            let guard = orchestrator.lock().unwrap_or_else(PoisonError::into_inner);
            job(&guard)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Prediction task failed: {e}")))
    }
}

/// Builds the router with every route and middleware layer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/batch", post(routes::batch_upload))
        .route("/batch/download", post(routes::batch_download))
        .route("/single", post(routes::single_form))
        .route("/health", get(routes::health))
        .route("/api/v1/predict/batch", post(routes::api_batch))
        .route("/api/v1/predict/single", post(routes::api_single))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Prediction(#[from] PredictionError),

    /// The upload could not be read as an order table.
    #[error("{0}")]
    InvalidUpload(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Prediction(PredictionError::NoModelAvailable { .. }) => StatusCode::NOT_FOUND,
            Self::Prediction(err) if err.is_input_error() => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidUpload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Prediction(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Logs the failure and returns its status code.
    fn report(&self) -> StatusCode {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, %status, "Request rejected");
        }
        status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.report();
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use ml_model::{ForestConfig, MemoryModelStore};
    use order_structs::PREDICTION_COLUMN;
    use tower::ServiceExt;

    use super::*;
    use crate::orchestrator::OrchestratorSettings;

    const LABELED: &str = "\
created_at,actual_delivery_time,estimated_store_to_consumer_driving_duration,subtotal,total_items,store_primary_category
2024-01-01 12:00:00,2024-01-01 12:30:00,600,2500,3,4
2024-01-01 13:00:00,2024-01-01 13:45:00,1500,1800,2,pizza
2024-01-02 18:00:00,2024-01-02 18:25:00,420,3100,4,4
2024-01-03 19:00:00,2024-01-03 19:50:00,1800,900,1,pizza
2024-01-04 08:00:00,2024-01-04 08:20:00,300,1500,2,sushi
";

    fn app() -> Router {
        app_with_sample_cap(OrchestratorSettings::default().sample_cap)
    }

    fn app_with_sample_cap(sample_cap: usize) -> Router {
        let store: SharedStore = Arc::new(MemoryModelStore::new());
        let settings = OrchestratorSettings {
            sample_cap,
            forest: ForestConfig {
                n_trees: 3,
                ..ForestConfig::default()
            },
            ..OrchestratorSettings::default()
        };
        router(AppState::new(Orchestrator::new(store, settings)))
    }

    fn upload(csv: &str) -> Request<Body> {
        let body = format!(
            "--XBOUNDARY\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"orders.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {csv}\r\n\
             --XBOUNDARY--\r\n"
        );
        post("/batch", "multipart/form-data; boundary=XBOUNDARY", body)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.expect("infallible");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8(body.to_vec()).expect("utf-8 body"))
    }

    fn post(uri: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(body.into())
            .expect("valid request")
    }

    fn single_json() -> String {
        serde_json::to_string(&order_structs::SingleOrder::default()).expect("serializable")
    }

    #[tokio::test]
    async fn test_health_without_model() {
        let app = app();
        let (status, body) = send(
            &app,
            Request::get("/health").body(Body::empty()).expect("valid request"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["status"], "ok");
        assert!(json["model_version"].is_null());
    }

    #[tokio::test]
    async fn test_index_page() {
        let app = app();
        let (status, body) = send(
            &app,
            Request::get("/").body(Body::empty()).expect("valid request"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("<option value=\"6\">Sun</option>"));
    }

    #[tokio::test]
    async fn test_single_without_model_is_not_found() {
        let app = app();
        let (status, body) = send(
            &app,
            post("/api/v1/predict/single", "application/json", single_json()),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("no pre-trained model"));
    }

    #[tokio::test]
    async fn test_batch_then_single() {
        let app = app();

        let request = Request::post("/api/v1/predict/batch?mode=train")
            .header(header::CONTENT_TYPE, "text/csv")
            .body(Body::from(LABELED))
            .expect("valid request");
        let response = app.clone().oneshot(request).await.expect("infallible");
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(disposition.contains("delivery_eta_predictions.csv"));
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let csv = String::from_utf8(body.to_vec()).expect("utf-8 body");
        assert!(csv.lines().next().is_some_and(|h| h.ends_with(PREDICTION_COLUMN)));
        assert_eq!(csv.lines().count(), 6);

        let (status, body) = send(
            &app,
            post("/api/v1/predict/single", "application/json", single_json()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(json["model_version"], 1);
        assert!(json["eta_minutes"].as_f64().is_some_and(f64::is_finite));
    }

    #[tokio::test]
    async fn test_batch_missing_columns_is_unprocessable() {
        let app = app();
        let (status, body) = send(
            &app,
            post(
                "/api/v1/predict/batch",
                "text/csv",
                "created_at,subtotal\n2024-01-01 12:00:00,2500\n",
            ),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("Missing columns in your data"));
        assert!(body.contains("store_primary_category"));
    }

    #[tokio::test]
    async fn test_upload_renders_results_page() {
        let app = app_with_sample_cap(3);

        let (status, page) = send(&app, upload(LABELED)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("<h2>Results</h2>"));
        assert!(page.contains("Training on a random sample of 3 rows out of 5 labeled rows."));
        assert!(page.contains("saved for future predictions (version 1)"));
        assert!(page.contains("<th>Mean</th>"));
        assert!(page.contains("<tr><td>5</td>"));
        assert_eq!(page.matches(" minutes</li>").count(), 5);
        assert!(page.contains("action=\"/batch/download\""));
        assert!(page.contains("Download delivery_eta_predictions.csv"));
        assert!(page.contains(PREDICTION_COLUMN));

        let unlabeled = "\
created_at,estimated_store_to_consumer_driving_duration,subtotal,total_items,store_primary_category
2024-01-05 09:00:00,700,2100,2,pizza
";
        let (status, page) = send(&app, upload(unlabeled)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("Using pre-trained model (version 1) for prediction."));
        assert!(!page.contains("random sample"));
        assert!(page.contains("<tr><td>1</td>"));
    }

    #[tokio::test]
    async fn test_upload_error_renders_page() {
        let app = app();

        let (status, page) = send(&app, upload("created_at\n2024-01-05 09:00:00\n")).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(page.contains("Missing columns in your data"));
        assert!(!page.contains("<h2>Results</h2>"));
    }

    #[tokio::test]
    async fn test_download_returns_attachment() {
        let app = app();
        let request = post(
            "/batch/download",
            "application/x-www-form-urlencoded",
            "csv=a%2Cb%0A1%2C2%0A",
        );

        let response = app.clone().oneshot(request).await.expect("infallible");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("delivery_eta_predictions.csv"))
        );
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        assert_eq!(&body[..], b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_single_form_without_model_renders_error() {
        let app = app();
        let form = "estimated_store_to_consumer_driving_duration=600&subtotal=2500\
                    &total_items=3&order_hour=12&order_dayofweek=0&store_primary_category=4";

        let (status, body) = send(
            &app,
            post("/single", "application/x-www-form-urlencoded", form),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("<html"));
        assert!(body.contains("no pre-trained model"));
    }
}
