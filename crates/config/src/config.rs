use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

/// File name of the persisted model, relative to the working directory.
pub const DEFAULT_MODEL_FILE: &str = "delivery_time_advanced_model.json";

/// Returns the path of the persisted model artifact.
#[must_use]
pub fn get_model_path() -> PathBuf {
    dotenvy::dotenv().ok();

    std::env::var("DELIVERY_ETA_MODEL_PATH")
        .map_or_else(|_| PathBuf::from(DEFAULT_MODEL_FILE), PathBuf::from)
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Location of the single persisted model
    pub model_path: PathBuf,

    /// Maximum number of labeled rows used for one training run
    pub sample_cap: usize,

    /// Inputs above this row count get a "large file" warning
    pub large_input_rows: usize,

    /// Number of trees in the forest
    pub n_trees: usize,

    /// Seed for subsampling and tree bootstrapping
    pub seed: u64,

    /// Address the web UI binds to
    pub host: String,

    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_FILE),
            sample_cap: 10_000,
            large_input_rows: 20_000,
            n_trees: 20,
            seed: 42,
            host: String::from("0.0.0.0"),
            port: 8501,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `DELIVERY_ETA_MODEL_PATH`: model artifact path (default: `delivery_time_advanced_model.json`)
    /// - `DELIVERY_ETA_SAMPLE_CAP`: training subsample size (default: `10000`)
    /// - `DELIVERY_ETA_LARGE_INPUT_ROWS`: large upload warning threshold (default: `20000`)
    /// - `DELIVERY_ETA_TREES`: forest size (default: `20`)
    /// - `DELIVERY_ETA_SEED`: random seed (default: `42`)
    /// - `HOST` / `PORT`: web UI address (default: `0.0.0.0:8501`)
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            model_path: get_model_path(),
            sample_cap: parse_var("DELIVERY_ETA_SAMPLE_CAP", defaults.sample_cap)?,
            large_input_rows: parse_var("DELIVERY_ETA_LARGE_INPUT_ROWS", defaults.large_input_rows)?,
            n_trees: parse_var("DELIVERY_ETA_TREES", defaults.n_trees)?,
            seed: parse_var("DELIVERY_ETA_SEED", defaults.seed)?,
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
        })
    }
}

/// Reads `name` from the environment, falling back to `default` when unset.
fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(name: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{name} must be a valid number, got {raw:?}"))
}
