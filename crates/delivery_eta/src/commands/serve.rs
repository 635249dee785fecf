//! Serve command - runs the web UI and JSON API.

use std::sync::Arc;

use anyhow::{Context, Result};
use config::Config;
use ml_model::{FsModelStore, ModelStore};
use tokio::net::TcpListener;
use tracing::info;

use crate::orchestrator::{Orchestrator, OrchestratorSettings};
use crate::server::{AppState, router};

/// Runs the serve command until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn run(config: &Config) -> Result<()> {
    let store: Arc<dyn ModelStore> = Arc::new(FsModelStore::new(&config.model_path));
    let orchestrator = Orchestrator::new(store, OrchestratorSettings::from_config(config));
    let app = router(AppState::new(orchestrator));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        %addr,
        model_path = %config.model_path.display(),
        "delivery-eta v{} listening",
        env!("CARGO_PKG_VERSION")
    );

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
