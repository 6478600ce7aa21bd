//! # kinerja-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the Kinerja API.
//! Binds to the configured port (default 4000).

use clap::Parser;
use kinerja_api::config::Cli;
use kinerja_api::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load().map_err(|e| {
        tracing::error!("Configuration failed: {e}");
        e
    })?;

    if config.auth_secret.is_none() {
        tracing::warn!("KINERJA_AUTH_SECRET not set; authentication is disabled and every request runs as ADMIN");
    }

    let port = config.port;
    let app = kinerja_api::app(AppState::with_config(config));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Kinerja API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
