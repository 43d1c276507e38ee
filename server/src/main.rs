//! Relay server entry point: parses configuration, loads credentials,
//! installs logging, and serves the two WebSocket endpoints until an
//! interrupt requests a graceful shutdown.

use anyhow::Context;
use clap::Parser;
use tracing::info;

use relay_server::cli::Args;
use relay_server::credentials::Credentials;
use relay_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_server=info".into()),
        )
        .init();

    let args = Args::parse();

    let credentials = Credentials::load(&args.credentials_file).with_context(|| {
        format!(
            "could not load credentials from {}",
            args.credentials_file.display()
        )
    })?;
    let state = AppState::new(credentials);
    let app = relay_server::build_router(state);

    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("could not bind to {addr}"))?;
    info!("relay listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server stopped unexpectedly")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, draining connections");
}
