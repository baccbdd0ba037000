use serde::Serialize;

use crate::domain::{
    entities::{games::GameEntity, plans::PlanEntity},
    value_objects::plans::{PlanFeatures, ResourceLimits},
};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanDto {
    pub id: i32,
    pub name: String,
    pub price_minor: i32,
    pub purchasable: bool,
    pub limits: ResourceLimits,
    pub features: PlanFeatures,
}

impl From<PlanEntity> for PlanDto {
    fn from(value: PlanEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            price_minor: value.price_minor,
            purchasable: value.price_id.is_some(),
            limits: value.limits,
            features: value.features,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GameDto {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub plans: Vec<PlanDto>,
}

impl GameDto {
    pub fn new(game: GameEntity, plans: Vec<PlanEntity>) -> Self {
        Self {
            id: game.id,
            name: game.name,
            description: game.description,
            image_url: game.image_url,
            plans: plans
                .into_iter()
                .filter(|plan| plan.game_id == game.id)
                .map(PlanDto::from)
                .collect(),
        }
    }
}
