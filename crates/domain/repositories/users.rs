use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::users::{InsertUserEntity, UserEntity};

#[async_trait]
#[automock]
pub trait UserRepository {
    async fn find_by_discord_id(&self, discord_id: &str) -> Result<Option<UserEntity>>;

    /// Inserts the mapping, or refreshes it when a row for the same Discord id exists.
    async fn save_panel_mapping(&self, insert_user_entity: InsertUserEntity)
    -> Result<UserEntity>;
}
