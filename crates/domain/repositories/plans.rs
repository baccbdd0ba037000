use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::plans::PlanEntity;

#[async_trait]
#[automock]
pub trait PlanRepository {
    async fn find_by_id(&self, plan_id: i32) -> Result<Option<PlanEntity>>;
    async fn find_by_price_id(&self, price_id: &str) -> Result<Option<PlanEntity>>;
    async fn list_by_game(&self, game_id: i32) -> Result<Vec<PlanEntity>>;
    async fn list_all(&self) -> Result<Vec<PlanEntity>>;
}
