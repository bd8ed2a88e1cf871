//! MeteoSwiss cache - serve current conditions per Swiss postal code
//!
//! An HTTP server that answers `GET /{code}` with a normalized weather report,
//! fetching from the MeteoSwiss product API on a cache miss.

use clap::Parser;

use meteo_cache::cli::{Cli, ServerConfig};
use meteo_cache::server;

/// Initialize tracing with `filter`, letting `RUST_LOG` style directives through
fn init_tracing(filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ServerConfig::from_cli(&cli)?;

    init_tracing(&config.log_filter);

    if let Err(err) = server::run(config).await {
        tracing::error!(error = %err, "http server failed");
        return Err(err.into());
    }

    Ok(())
}
