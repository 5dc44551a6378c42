//! Shared application state for the proxy server.

use crate::dispatch::Driver;
use crate::run::Coordinator;

/// Shared state available to all request handlers.
pub struct AppState<D: Driver> {
    /// The run coordinator.
    pub coordinator: Coordinator<D>,
}

impl<D: Driver> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
        }
    }
}
