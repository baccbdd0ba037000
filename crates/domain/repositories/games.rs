use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::games::GameEntity;

#[async_trait]
#[automock]
pub trait GameRepository {
    async fn list_games(&self) -> Result<Vec<GameEntity>>;
    async fn find_by_id(&self, game_id: i32) -> Result<Option<GameEntity>>;
}
