//! Subscribe endpoint, the only route that starts fulfillment work.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use subscribe_common::error::AppError;
use subscribe_common::types::Subscriber;
use subscribe_notifier::NotifierError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/subscriptions", post(subscribe))
}

/// Subscriber details as supplied by the signed-in session.
#[derive(Debug, Deserialize)]
pub struct SubscriberParams {
    pub id: Option<Uuid>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeParams {
    pub plan_id: i64,
    pub subscriber: SubscriberParams,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub status: &'static str,
    pub subscriber_id: Uuid,
    pub plan_id: i64,
}

/// POST /api/subscriptions: subscribe to a plan.
///
/// Answers `202 Accepted` as soon as fulfillment is scheduled; invoice and
/// manual are sent in the background and their failures never reach the
/// caller.
async fn subscribe(
    State(state): State<AppState>,
    Json(params): Json<SubscribeParams>,
) -> Result<(StatusCode, Json<SubscribeResponse>), AppError> {
    let plan = state
        .catalog
        .get(params.plan_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", params.plan_id)))?;

    if !params.subscriber.email.contains('@') {
        return Err(AppError::Validation(format!(
            "Invalid email address: {}",
            params.subscriber.email
        )));
    }

    let subscriber = Subscriber {
        id: params.subscriber.id.unwrap_or_else(Uuid::new_v4),
        email: params.subscriber.email,
        first_name: params.subscriber.first_name,
        last_name: params.subscriber.last_name,
    };
    let subscriber_id = subscriber.id;

    state
        .coordinator
        .fulfill(subscriber, plan)
        .map_err(|e| match e {
            NotifierError::Draining => AppError::ShuttingDown,
            other => AppError::Internal(other.to_string()),
        })?;

    tracing::info!(subscriber_id = %subscriber_id, plan_id = params.plan_id, "Subscription accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(SubscribeResponse {
            status: "accepted",
            subscriber_id,
            plan_id: params.plan_id,
        }),
    ))
}
