//! Mirante - live dashboard feed for Opa Suite
//!
//! Fetches the raw queue state from an Opa Suite instance, reconciles it
//! into the canonical model, and prints the resulting feed as JSON on
//! stdout. With `MIRANTE_POLL_SECS` set, the cycle repeats at a fixed
//! interval, emitting a full replacement snapshot each time.
//!
//! # Configuration
//!
//! Set the following environment variables (or use a `.env` file):
//!
//! - `OPA_BASE_URL`: Base URL of the Opa Suite instance
//! - `OPA_API_TOKEN`: API token for authentication
//!
//! # Usage
//!
//! ```bash
//! # One snapshot
//! ./mirante
//!
//! # Continuous polling
//! MIRANTE_POLL_SECS=15 ./mirante
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use mirante::config::Config;
use mirante::models::DashboardStats;
use mirante::opa_client::OpaClient;
use mirante::reconcile::clock::SystemClock;
use mirante::reconcile::{reconcile, ReconcileOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    dotenvy::dotenv().ok();

    // Initialize logging to stderr; stdout is reserved for the JSON feed
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mirante=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting Mirante v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::debug!("Configuration loaded, base_url: {}", config.base_url);

    let client = OpaClient::new(&config).context("Failed to create Opa client")?;

    // Probe connectivity before the first cycle
    tracing::info!("Testing connection to Opa Suite...");
    if let Err(e) = client.test_connection().await {
        tracing::error!(error = %e, "Connection test failed");
        // Continue anyway - the server might become available later
        tracing::warn!(
            "Mirante will start but may not be able to reach Opa Suite. \
             Check configuration and network connectivity."
        );
    }

    let options = config.reconcile_options();

    match config.poll_secs {
        None => emit_snapshot(&client, &options).await?,
        Some(secs) => {
            tracing::info!(interval_secs = secs, "Polling continuously");
            let mut interval = tokio::time::interval(Duration::from_secs(secs));
            loop {
                interval.tick().await;
                // Each cycle replaces the previous feed wholesale;
                // snapshots are never merged.
                if let Err(e) = emit_snapshot(&client, &options).await {
                    tracing::error!(error = %e, "Cycle failed");
                }
            }
        }
    }

    Ok(())
}

/// Runs one fetch-reconcile cycle and prints the feed to stdout.
async fn emit_snapshot(client: &OpaClient, options: &ReconcileOptions) -> Result<()> {
    let snapshot = client.fetch_snapshot().await;

    tracing::debug!(
        tickets = snapshot.tickets.len(),
        attendants = snapshot.attendants.len(),
        "Snapshot fetched"
    );

    let output = reconcile(&snapshot, options, &SystemClock);
    let stats = DashboardStats::compute(&output.tickets, &output.attendants, &SystemClock);

    let feed = serde_json::json!({
        "tickets": output.tickets,
        "attendants": output.attendants,
        "stats": stats,
    });

    println!(
        "{}",
        serde_json::to_string_pretty(&feed).context("Failed to serialize feed")?
    );

    tracing::info!(
        tickets = output.tickets.len(),
        attendants = output.attendants.len(),
        "Feed emitted"
    );

    Ok(())
}
