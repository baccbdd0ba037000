use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::subscriptions;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, PartialEq)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub game_id: i32,
    pub plan_id: i32,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub panel_server_id: i32,
    pub panel_server_identifier: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, PartialEq)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub user_id: Uuid,
    pub game_id: i32,
    pub plan_id: i32,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub panel_server_id: i32,
    pub panel_server_identifier: String,
    pub status: String,
}
