//! appkit service runner.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                              APP                                  │
//!   │                                                                   │
//!   │  ┌──────────┐   ┌──────────────┐   ┌───────────────┐             │
//!   │  │  config  │──▶│     net      │──▶│  serve loops  │◀── traffic  │
//!   │  │ (toml)   │   │ ListenerSet  │   │ rpc/http/admin│             │
//!   │  └──────────┘   └──────────────┘   └───────┬───────┘             │
//!   │                                            │ handlers            │
//!   │                                            ▼                     │
//!   │                                   ┌────────────────┐             │
//!   │                                   │   dispatcher   │             │
//!   │                                   │ fan-out + async│             │
//!   │                                   └────────┬───────┘             │
//!   │                                            │ tracker             │
//!   │  SIGTERM/SIGINT ──┐                        ▼                     │
//!   │  endpoint failure ┴──▶ ┌─────────────────────────────┐           │
//!   │                        │  lifecycle::shutdown        │           │
//!   │                        │  grace → stop → force → drain│          │
//!   │                        └─────────────────────────────┘           │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exits non-zero when the shutdown report carries failures.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use appkit::config::{load_config, AppConfig};
use appkit::dispatcher::{self, Processor};
use appkit::lifecycle::{AppStarted, APP_STARTED};
use appkit::observability::logging;
use appkit::App;

#[derive(Parser)]
#[command(name = "appkit")]
#[command(about = "Run an appkit service from a TOML configuration", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (defaults are used when omitted).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    logging::init(&config.observability)?;

    tracing::info!(
        name = %config.name,
        version = %config.version,
        env = %config.env,
        "Configuration loaded"
    );

    dispatcher::global().add_processor(
        APP_STARTED,
        Processor::new(|_, payload| async move {
            if let Some(started) = payload.downcast_ref::<AppStarted>() {
                for (endpoint, addr) in &started.endpoints {
                    tracing::info!(%endpoint, %addr, "Listening");
                }
            }
            Ok(())
        }),
    );

    let app = App::new(config).await?;

    let report = app.run().await?;
    if report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        for failure in &report.failures {
            tracing::error!(error = %failure, "Shutdown failure");
        }
        Ok(ExitCode::FAILURE)
    }
}
