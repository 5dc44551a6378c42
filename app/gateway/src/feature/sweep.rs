//! Periodic maintenance sweep.
//!
//! Every minute: drop expired key-value entries, force-fail overdue runs
//! the timeout timer somehow missed, and evict terminal runs nobody is
//! connected to. The sweeper stops when `shutdown` is received or the
//! handle is aborted.

use crate::dispatch::Driver;
use crate::run::Coordinator;
use std::{sync::Arc, time::Duration};
use store::KvStore;
use tokio::{sync::broadcast, task::JoinHandle, time};

/// Interval between sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Start the sweeper. Returns its [`JoinHandle`].
pub fn start<D: Driver>(
    coordinator: Coordinator<D>,
    store: Arc<KvStore>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("sweeper started");
        loop {
            tokio::select! {
                _ = time::sleep(SWEEP_INTERVAL) => {
                    store.prune();
                    coordinator.sweep().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("sweeper shutting down");
                    return;
                }
            }
        }
    })
}
