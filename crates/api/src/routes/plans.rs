//! Plan listing.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use subscribe_common::types::Plan;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/plans", get(list_plans))
}

/// GET /api/plans: all purchasable plans.
async fn list_plans(State(state): State<AppState>) -> Json<Vec<Plan>> {
    Json(state.catalog.all().to_vec())
}
