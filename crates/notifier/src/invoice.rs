use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use subscribe_common::types::{Plan, Subscriber};

use crate::error::NotifierError;

/// Invoice for the first billing period of a subscription.
#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub number: String,
    pub subscriber_id: Uuid,
    pub plan_name: String,
    /// Display amount, e.g. `$10.00`
    pub amount: String,
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    pub fn issue(subscriber: &Subscriber, plan: &Plan) -> Result<Self, NotifierError> {
        if plan.amount_cents < 0 {
            return Err(NotifierError::Invoice(format!(
                "plan {} has negative amount {}",
                plan.id, plan.amount_cents
            )));
        }
        if plan.name.trim().is_empty() {
            return Err(NotifierError::Invoice(format!("plan {} has no name", plan.id)));
        }

        let issued_at = Utc::now();
        let number = format!(
            "INV-{}-{}",
            issued_at.format("%Y%m%d"),
            &subscriber.id.simple().to_string()[..8]
        );

        Ok(Self {
            number,
            subscriber_id: subscriber.id,
            plan_name: plan.name.clone(),
            amount: plan.amount_for_display(),
            issued_at,
        })
    }
}
