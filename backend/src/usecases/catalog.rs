use std::{collections::HashMap, sync::Arc};

use crates::domain::{
    entities::plans::PlanEntity,
    repositories::{games::GameRepository, plans::PlanRepository},
    value_objects::catalog::GameDto,
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("game not found")]
    GameNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CatalogError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CatalogError::GameNotFound => StatusCode::NOT_FOUND,
            CatalogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub struct CatalogUseCase<G, P>
where
    G: GameRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
{
    game_repo: Arc<G>,
    plan_repo: Arc<P>,
}

impl<G, P> CatalogUseCase<G, P>
where
    G: GameRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
{
    pub fn new(game_repo: Arc<G>, plan_repo: Arc<P>) -> Self {
        Self {
            game_repo,
            plan_repo,
        }
    }

    pub async fn list_games(&self) -> Result<Vec<GameDto>, CatalogError> {
        let games = self.game_repo.list_games().await.map_err(|err| {
            error!(db_error = ?err, "catalog: failed to list games");
            CatalogError::Internal(err)
        })?;
        let plans = self.plan_repo.list_all().await.map_err(|err| {
            error!(db_error = ?err, "catalog: failed to list plans");
            CatalogError::Internal(err)
        })?;

        let mut by_game: HashMap<i32, Vec<PlanEntity>> = HashMap::new();
        for plan in plans {
            by_game.entry(plan.game_id).or_default().push(plan);
        }

        Ok(games
            .into_iter()
            .map(|game| {
                let plans = by_game.remove(&game.id).unwrap_or_default();
                GameDto::new(game, plans)
            })
            .collect())
    }

    pub async fn get_game(&self, game_id: i32) -> Result<GameDto, CatalogError> {
        let game = self
            .game_repo
            .find_by_id(game_id)
            .await
            .map_err(|err| {
                error!(game_id, db_error = ?err, "catalog: failed to load game");
                CatalogError::Internal(err)
            })?
            .ok_or(CatalogError::GameNotFound)?;

        let plans = self.plan_repo.list_by_game(game_id).await.map_err(|err| {
            error!(game_id, db_error = ?err, "catalog: failed to list plans");
            CatalogError::Internal(err)
        })?;

        Ok(GameDto::new(game, plans))
    }
}
