use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::users;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = users)]
pub struct UserEntity {
    pub id: Uuid,
    pub discord_id: String,
    pub username: String,
    pub email: Option<String>,
    pub pterodactyl_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Local mapping between an OAuth identity and its panel account.
#[derive(Debug, Clone, Insertable, PartialEq)]
#[diesel(table_name = users)]
pub struct InsertUserEntity {
    pub discord_id: String,
    pub username: String,
    pub email: Option<String>,
    pub pterodactyl_id: Option<i32>,
}
