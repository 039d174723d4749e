use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use burrow_gateway::cli::CLI;
use burrow_gateway::{App, AppState};
use burrow_storage::{open_store, StoreConfig};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CLI::parse();
    init_tracing(config.json_logs);

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.backend,
        "starting gateway server"
    );

    let store_config = StoreConfig::builder()
        .backend(config.backend.into())
        .location(config.location.clone())
        .build();
    let store = open_store(&store_config)
        .await
        .context("failed to open store")?;

    let state = AppState::new(Arc::clone(&store), config.base_url.clone());
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        App::router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    store.close().await.context("failed to close store")?;
    info!("gateway stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received Ctrl-C, shutting down"),
        Err(e) => {
            // Without a signal handler the server runs until killed.
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    }
}
