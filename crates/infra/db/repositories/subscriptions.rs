use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{
    Connection, OptionalExtension, RunQueryDsl, dsl::exists, insert_into, prelude::*, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{games, plans, subscriptions},
    },
};
use domain::{
    entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus,
        subscriptions::{InsertSubscriptionOutcome, SubscriptionSummaryDto},
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription = subscriptions::table
            .filter(subscriptions::stripe_subscription_id.eq(stripe_subscription_id))
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(subscription)
    }

    async fn insert_after_checkout(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
    ) -> Result<InsertSubscriptionOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let outcome = conn.transaction::<InsertSubscriptionOutcome, diesel::result::Error, _>(
            |tx| {
                let inserted = insert_into(subscriptions::table)
                    .values(&insert_subscription_entity)
                    .on_conflict(subscriptions::stripe_subscription_id)
                    .do_nothing()
                    .returning(SubscriptionEntity::as_returning())
                    .get_result::<SubscriptionEntity>(tx)
                    .optional()?;

                if let Some(row) = inserted {
                    return Ok(InsertSubscriptionOutcome::Inserted(row));
                }

                let existing = subscriptions::table
                    .filter(
                        subscriptions::stripe_subscription_id
                            .eq(&insert_subscription_entity.stripe_subscription_id),
                    )
                    .select(SubscriptionEntity::as_select())
                    .first::<SubscriptionEntity>(tx)?;

                Ok(InsertSubscriptionOutcome::AlreadyExists(existing))
            },
        )?;

        Ok(outcome)
    }

    async fn update_status_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(subscriptions::table)
            .filter(subscriptions::stripe_subscription_id.eq(stripe_subscription_id))
            .set((
                subscriptions::status.eq(status.to_string()),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(affected)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionSummaryDto>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = subscriptions::table
            .inner_join(games::table.on(games::id.eq(subscriptions::game_id)))
            .inner_join(plans::table.on(plans::id.eq(subscriptions::plan_id)))
            .filter(subscriptions::user_id.eq(user_id))
            .order(subscriptions::created_at.desc())
            .select((SubscriptionEntity::as_select(), games::name, plans::name))
            .load::<(SubscriptionEntity, String, String)>(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|(subscription, game_name, plan_name)| SubscriptionSummaryDto {
                id: subscription.id,
                game_id: subscription.game_id,
                game_name,
                plan_id: subscription.plan_id,
                plan_name,
                status: subscription.status,
                server_identifier: subscription.panel_server_identifier,
                created_at: subscription.created_at,
            })
            .collect())
    }

    async fn user_owns_server(&self, user_id: Uuid, server_identifier: &str) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let owns = diesel::select(exists(
            subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .filter(subscriptions::panel_server_identifier.eq(server_identifier)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(owns)
    }

    async fn latest_customer_id_for_user(&self, user_id: Uuid) -> Result<Option<String>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let customer_id = subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::stripe_customer_id.is_not_null())
            .order(subscriptions::created_at.desc())
            .select(subscriptions::stripe_customer_id)
            .first::<Option<String>>(&mut conn)
            .optional()?;

        Ok(customer_id.flatten())
    }
}
