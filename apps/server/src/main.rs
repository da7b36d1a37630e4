//! helpsync HTTP server — fire-and-forget import triggers.
//!
//! Exposes the import pipeline over a small JSON API: one-shot imports,
//! cron-scheduled recurring imports, and a status endpoint for polling
//! the current run.

mod routes;

use std::net::SocketAddr;

use color_eyre::eyre::{Result, eyre};
use tracing::info;

use helpsync_shared::load_config;

const DEFAULT_PORT: u16 = 8080;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let config = load_config()?;
    let state = routes::AppState::new(config);
    let app = routes::build_router(state);

    let port = std::env::var("HELPSYNC_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| eyre!("failed to bind {addr}: {e}"))?;
    info!(%addr, "helpsync server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| eyre!("server error: {e}"))?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("helpsync=info,tower_http=info"));
    fmt().with_env_filter(env_filter).init();
}
