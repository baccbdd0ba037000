use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::{
    domain::value_objects::plans::{PlanFeatures, ResourceLimits},
    infra::db::postgres::schema::plans,
};

#[derive(Debug, Clone)]
pub struct PlanEntity {
    pub id: i32,
    pub game_id: i32,
    pub name: String,
    pub price_id: Option<String>,
    pub price_minor: i32,
    pub limits: ResourceLimits,
    pub features: PlanFeatures,
    pub created_at: DateTime<Utc>,
}

/// Raw row used for Diesel queries. Features stay as JSON and are parsed into PlanFeatures.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanRow {
    pub id: i32,
    pub game_id: i32,
    pub name: String,
    pub price_id: Option<String>,
    pub price_minor: i32,
    pub cpu: i32,
    pub ram: i32,
    pub disk: i32,
    pub databases: i32,
    pub backups: i32,
    pub features: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<PlanRow> for PlanEntity {
    fn from(value: PlanRow) -> Self {
        let features = serde_json::from_value(value.features).unwrap_or_default();

        Self {
            id: value.id,
            game_id: value.game_id,
            name: value.name,
            price_id: value.price_id,
            price_minor: value.price_minor,
            limits: ResourceLimits {
                cpu: value.cpu,
                ram: value.ram,
                disk: value.disk,
                databases: value.databases,
                backups: value.backups,
            },
            features,
            created_at: value.created_at,
        }
    }
}
