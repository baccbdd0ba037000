use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
};
use crates::{
    domain::repositories::{games::GameRepository, plans::PlanRepository},
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{games::GamePostgres, plans::PlanPostgres},
    },
};

use crate::{axum_http::error_responses::usecase_error, usecases::catalog::CatalogUseCase};

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let game_repository = GamePostgres::new(Arc::clone(&db_pool));
    let plan_repository = PlanPostgres::new(Arc::clone(&db_pool));
    let usecase = CatalogUseCase::new(Arc::new(game_repository), Arc::new(plan_repository));

    router(Arc::new(usecase))
}

pub fn router<G, P>(usecase: Arc<CatalogUseCase<G, P>>) -> Router
where
    G: GameRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
{
    Router::new()
        .route("/games", get(list_games::<G, P>))
        .route("/games/:game_id", get(get_game::<G, P>))
        .with_state(usecase)
}

pub async fn list_games<G, P>(State(usecase): State<Arc<CatalogUseCase<G, P>>>) -> Response
where
    G: GameRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
{
    match usecase.list_games().await {
        Ok(games) => Json(games).into_response(),
        Err(err) => usecase_error("catalog", err.status_code(), &err),
    }
}

pub async fn get_game<G, P>(
    State(usecase): State<Arc<CatalogUseCase<G, P>>>,
    Path(game_id): Path<i32>,
) -> Response
where
    G: GameRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
{
    match usecase.get_game(game_id).await {
        Ok(game) => Json(game).into_response(),
        Err(err) => usecase_error("catalog", err.status_code(), &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use crates::domain::{
        entities::games::GameEntity,
        repositories::{games::MockGameRepository, plans::MockPlanRepository},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn game_is_served_with_its_plans() {
        let mut games = MockGameRepository::new();
        let mut plans = MockPlanRepository::new();

        games
            .expect_find_by_id()
            .withf(|game_id| *game_id == 3)
            .returning(|_| {
                Box::pin(async {
                    Ok(Some(GameEntity {
                        id: 3,
                        name: "Terraria".to_string(),
                        description: "2D sandbox".to_string(),
                        image_url: None,
                        nest_id: 1,
                        egg_id: 16,
                        created_at: Utc::now(),
                    }))
                })
            });
        plans
            .expect_list_by_game()
            .returning(|_| Box::pin(async { Ok(Vec::new()) }));

        let app = router(Arc::new(CatalogUseCase::new(Arc::new(games), Arc::new(plans))));
        let response = app
            .oneshot(Request::builder().uri("/games/3").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["name"], "Terraria");
    }

    #[tokio::test]
    async fn non_numeric_game_id_is_rejected() {
        let app = router(Arc::new(CatalogUseCase::new(
            Arc::new(MockGameRepository::new()),
            Arc::new(MockPlanRepository::new()),
        )));
        let response = app
            .oneshot(Request::builder().uri("/games/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
