//! Delivery ETA Predictor
//!
//! Predicts order delivery times from a CSV upload, a single hand-entered
//! order, or the web UI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Config;
use delivery_eta::commands;
use delivery_eta::orchestrator::BatchMode;
use order_structs::{PREDICTIONS_FILE_NAME, SingleOrder};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Delivery ETA Predictor
#[derive(Parser)]
#[command(name = "delivery-eta")]
#[command(about = "Train-or-load delivery time prediction for order CSVs")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict delivery times for every order in a CSV file
    Batch {
        /// Path to the CSV file with one order per row
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the orders with the prediction column
        #[arg(short, long, default_value = PREDICTIONS_FILE_NAME)]
        output: PathBuf,

        /// Train on the file's delivery times, use the stored model, or decide automatically
        #[arg(short, long, value_enum, default_value_t = BatchMode::Auto)]
        mode: BatchMode,
    },

    /// Predict the delivery time of one order with the stored model
    Single {
        /// Estimated store-to-consumer driving duration in seconds
        #[arg(long, default_value = "600")]
        drive_duration: f64,

        /// Order subtotal in minor currency units
        #[arg(long, default_value = "2500")]
        subtotal: f64,

        #[arg(long, default_value = "3")]
        total_items: f64,

        /// Hour of day the order was placed (0-23)
        #[arg(long, default_value = "12")]
        hour: u32,

        /// Day of week the order was placed (0 = Monday)
        #[arg(long, default_value = "0")]
        day: u32,

        /// Store primary category
        #[arg(long, default_value = "4")]
        category: String,
    },

    /// Run the web UI
    Serve {
        /// Address to bind (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::from_env()?;
    debug!(?config, "Loaded configuration");

    match cli.command {
        Commands::Batch {
            input,
            output,
            mode,
        } => {
            commands::batch::run(&config, &input, &output, mode)?;
        }
        Commands::Single {
            drive_duration,
            subtotal,
            total_items,
            hour,
            day,
            category,
        } => {
            let order = SingleOrder {
                estimated_store_to_consumer_driving_duration: drive_duration,
                subtotal,
                total_items,
                order_hour: hour,
                order_dayofweek: day,
                store_primary_category: category,
            };
            commands::single::run(&config, &order)?;
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            commands::serve::run(&config).await?;
        }
    }

    Ok(())
}
