use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;

/// Result of writing the subscription row for a completed checkout.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSubscriptionOutcome {
    Inserted(SubscriptionEntity),
    /// A row for the same Stripe subscription already exists (replay or concurrent delivery).
    AlreadyExists(SubscriptionEntity),
}

/// Dashboard row: a subscription joined with its game and plan names.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionSummaryDto {
    pub id: Uuid,
    pub game_id: i32,
    pub game_name: String,
    pub plan_id: i32,
    pub plan_name: String,
    pub status: String,
    pub server_identifier: String,
    pub created_at: DateTime<Utc>,
}
