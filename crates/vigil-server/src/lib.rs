//! Vigil backup server
//!
//! Serves the per-user mirror behind an authenticated HTTP API: digest
//! probes, folder reconciliation, uploads and deletions, all scoped to a
//! per-user sandbox directory.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod mirror;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use mirror::Mirror;
pub use state::AppState;

/// Prepare the environment and serve until terminated.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    config.prepare_environment()?;
    let state = AppState::new(&config).await?;
    let app = api::router(state);

    let addr = format!("{}:{}", config.address, config.port);
    tracing::info!("vigil-server listening on http://{}", addr);
    tracing::info!("mirror root: {}", config.backuppath.display());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
