//! CLI command implementations.

pub mod batch;
pub mod serve;
pub mod single;

use config::Config;
use ml_model::FsModelStore;

use crate::orchestrator::{Orchestrator, OrchestratorSettings};

/// Builds an orchestrator over the on-disk model named by `config`.
pub(crate) fn file_orchestrator(config: &Config) -> Orchestrator<FsModelStore> {
    Orchestrator::new(
        FsModelStore::new(&config.model_path),
        OrchestratorSettings::from_config(config),
    )
}
