//! Shared application state for the Axum API server.

use subscribe_notifier::Coordinator;

use crate::catalog::PlanCatalog;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Coordinator,
    pub catalog: PlanCatalog,
}

impl AppState {
    pub fn new(coordinator: Coordinator, catalog: PlanCatalog) -> Self {
        Self {
            coordinator,
            catalog,
        }
    }
}
