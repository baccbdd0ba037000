use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity};
use crate::domain::value_objects::{
    enums::subscription_statuses::SubscriptionStatus,
    subscriptions::{InsertSubscriptionOutcome, SubscriptionSummaryDto},
};

#[async_trait]
#[automock]
pub trait SubscriptionRepository {
    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<SubscriptionEntity>>;

    /// Writes the row inside one transaction; a row with the same Stripe subscription id wins.
    async fn insert_after_checkout(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
    ) -> Result<InsertSubscriptionOutcome>;

    /// Returns the number of rows touched (0 when the subscription is unknown).
    async fn update_status_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<usize>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionSummaryDto>>;

    async fn user_owns_server(&self, user_id: Uuid, server_identifier: &str) -> Result<bool>;

    async fn latest_customer_id_for_user(&self, user_id: Uuid) -> Result<Option<String>>;
}
