//! Sune proxy binary entry point.
//!
//! Reads configuration from the environment, wires the store, notifier,
//! coordinator, and sweeper, and runs the axum server with graceful
//! shutdown on ctrl-c.

use anyhow::Result;
use notify::Notifier;
use std::sync::Arc;
use store::KvStore;
use sune_gateway::{AppState, Config, Coordinator, DeltaLog, HttpDriver, feature::sweep};
use tokio::{signal, sync::broadcast};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing from RUST_LOG (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    if config.ntfy_url.is_none() {
        tracing::info!("NTFY_URL not set, notifications disabled");
    }

    let client = llm::Client::new();
    let store = Arc::new(KvStore::new());
    let notifier = Notifier::new(client.clone(), config.ntfy_url.clone());
    let coordinator = Coordinator::new(
        HttpDriver::new(client),
        DeltaLog::new(Arc::clone(&store)),
        notifier,
    );

    // Background sweeper: store pruning, overdue runs, eviction.
    let (shutdown_tx, _) = broadcast::channel(1);
    let sweeper = sweep::start(coordinator.clone(), store, shutdown_tx.subscribe());

    let state = AppState { coordinator };
    let app = sune_gateway::protocol::ws::router(state);

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("proxy listening on {bind_address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(());
    let _ = sweeper.await;
    tracing::info!("proxy shut down");
    Ok(())
}

/// Wait for ctrl-c signal for graceful shutdown.
async fn shutdown_signal() {
    signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    tracing::info!("received shutdown signal");
}
