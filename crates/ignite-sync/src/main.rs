//! Ignite sync service: mirrors recent chat messages into a spreadsheet.

mod api;
mod auth;
mod config;
mod error;
mod export;
mod sheets;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::SyncConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ignite_sync=debug")),
        )
        .init();

    info!("Starting Ignite sync service v{}", env!("CARGO_PKG_VERSION"));

    let config = SyncConfig::from_env();
    info!(
        http_addr = %config.http_addr,
        database = ?config.database_path,
        sheet = %config.sheet_name,
        configured = config.has_credentials() && config.spreadsheet_id.is_some(),
        "Configuration loaded"
    );

    let http_addr = config.http_addr;
    let state = AppState::new(config);

    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
