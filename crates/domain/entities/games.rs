use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::games;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = games)]
pub struct GameEntity {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    /// Panel nest holding the server template.
    pub nest_id: i32,
    /// Panel egg (server template) inside `nest_id`.
    pub egg_id: i32,
    pub created_at: DateTime<Utc>,
}
