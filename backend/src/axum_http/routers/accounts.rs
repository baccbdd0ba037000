use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::repositories::users::UserRepository,
    infra::db::{postgres::postgres_connection::PgPoolSquad, repositories::users::UserPostgres},
    panel::client::PanelClient,
};
use tracing::info;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::usecase_error,
    usecases::{accounts::AccountUseCase, gateways::PanelGateway},
};

pub fn routes(db_pool: Arc<PgPoolSquad>, panel_client: Arc<PanelClient>) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let usecase = AccountUseCase::new(Arc::new(user_repository), panel_client);

    router(Arc::new(usecase))
}

pub fn router<U, Panel>(usecase: Arc<AccountUseCase<U, Panel>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    Router::new()
        .route("/provision", post(provision::<U, Panel>))
        .with_state(usecase)
}

pub async fn provision<U, Panel>(
    State(usecase): State<Arc<AccountUseCase<U, Panel>>>,
    auth: AuthUser,
) -> Response
where
    U: UserRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    info!(discord_id = %auth.discord_id, "accounts: provision request received");

    match usecase.get_or_create(&auth).await {
        Ok(account) => {
            let status = if account.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(account)).into_response()
        }
        Err(err) => usecase_error("accounts", err.status_code(), &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{SessionClaims, SessionKeys},
        usecases::gateways::MockPanelGateway,
    };
    use axum::{
        Extension,
        body::{Body, to_bytes},
        http::Request,
    };
    use chrono::Utc;
    use crates::domain::{entities::users::UserEntity, repositories::users::MockUserRepository};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "test-session-secret";

    fn token() -> String {
        let claims = SessionClaims {
            sub: "271828182845904523".to_string(),
            name: "Steve".to_string(),
            email: Some("steve@example.com".to_string()),
            exp: (Utc::now().timestamp() + 600) as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn app(users: MockUserRepository, panel: MockPanelGateway) -> Router {
        let usecase = AccountUseCase::new(Arc::new(users), Arc::new(panel));
        router(Arc::new(usecase)).layer(Extension(Arc::new(SessionKeys::from_secret(SECRET))))
    }

    #[tokio::test]
    async fn linked_account_is_returned_without_a_password() {
        let mut users = MockUserRepository::new();
        let mut panel = MockPanelGateway::new();

        users
            .expect_find_by_discord_id()
            .withf(|discord_id| discord_id == "271828182845904523")
            .returning(|_| {
                Box::pin(async {
                    Ok(Some(UserEntity {
                        id: Uuid::from_u128(7),
                        discord_id: "271828182845904523".to_string(),
                        username: "steve_4523".to_string(),
                        email: Some("steve@example.com".to_string()),
                        pterodactyl_id: Some(42),
                        created_at: Utc::now(),
                        updated_at: Utc::now(),
                    }))
                })
            });
        panel.expect_create_user().never();

        let response = app(users, panel)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/provision")
                    .header("authorization", format!("Bearer {}", token()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["panel_user_id"], 42);
        assert_eq!(json["created"], false);
        assert!(json.get("password").is_none());
    }

    #[tokio::test]
    async fn anonymous_callers_are_unauthorized() {
        let response = app(MockUserRepository::new(), MockPanelGateway::new())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/provision")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
