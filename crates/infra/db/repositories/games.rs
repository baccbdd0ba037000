use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;

use crate::domain;
use crate::infra::db::postgres::{postgres_connection::PgPoolSquad, schema::games};
use domain::{entities::games::GameEntity, repositories::games::GameRepository};

pub struct GamePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl GamePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl GameRepository for GamePostgres {
    async fn list_games(&self) -> Result<Vec<GameEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = games::table
            .order(games::name.asc())
            .select(GameEntity::as_select())
            .load::<GameEntity>(&mut conn)?;

        Ok(results)
    }

    async fn find_by_id(&self, game_id: i32) -> Result<Option<GameEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let game = games::table
            .filter(games::id.eq(game_id))
            .select(GameEntity::as_select())
            .first::<GameEntity>(&mut conn)
            .optional()?;

        Ok(game)
    }
}
