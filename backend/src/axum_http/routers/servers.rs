use std::{sync::Arc, time::Duration};

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use crates::{
    domain::repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{subscriptions::SubscriptionPostgres, users::UserPostgres},
    },
    panel::client::PanelClient,
};
use tracing::info;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::usecase_error,
    config::config_model::DotEnvyConfig,
    usecases::{
        console::{BrowserChannel, ConsoleRelay},
        dashboard::DashboardUseCase,
        gateways::PanelGateway,
    },
};

pub struct ServersState<U, S, Panel>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    pub dashboard: DashboardUseCase<U, S, Panel>,
    pub relay: ConsoleRelay<Panel>,
}

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    panel_client: Arc<PanelClient>,
) -> Router {
    let dashboard = DashboardUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::clone(&panel_client),
    );
    let relay = ConsoleRelay::new(
        panel_client,
        config.panel.url.clone(),
        Duration::from_secs(config.console.reconnect_delay_secs),
    );

    router(Arc::new(ServersState { dashboard, relay }))
}

pub fn router<U, S, Panel>(state: Arc<ServersState<U, S, Panel>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    Router::new()
        .route("/:identifier/ws-token", get(ws_token::<U, S, Panel>))
        .route("/:identifier/console", get(console::<U, S, Panel>))
        .with_state(state)
}

pub async fn ws_token<U, S, Panel>(
    State(state): State<Arc<ServersState<U, S, Panel>>>,
    auth: AuthUser,
    Path(identifier): Path<String>,
) -> Response
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    match state.dashboard.console_credentials(&auth, &identifier).await {
        Ok(credentials) => Json(credentials).into_response(),
        Err(err) => usecase_error("servers", err.status_code(), &err),
    }
}

pub async fn console<U, S, Panel>(
    State(state): State<Arc<ServersState<U, S, Panel>>>,
    auth: AuthUser,
    Path(identifier): Path<String>,
    ws: WebSocketUpgrade,
) -> Response
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    if let Err(err) = state.dashboard.authorize_server(&auth, &identifier).await {
        return usecase_error("servers", err.status_code(), &err);
    }

    info!(discord_id = %auth.discord_id, identifier = %identifier, "servers: console upgrade accepted");
    ws.on_upgrade(move |socket| async move {
        let mut browser = AxumBrowser { socket };
        state.relay.run(&identifier, &mut browser).await;
    })
}

struct AxumBrowser {
    socket: WebSocket,
}

#[async_trait]
impl BrowserChannel for AxumBrowser {
    async fn recv(&mut self) -> Option<String> {
        while let Some(message) = self.socket.recv().await {
            match message {
                Ok(Message::Text(text)) => return Some(text),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    }

    async fn send(&mut self, text: String) -> AnyResult<()> {
        self.socket.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.socket.send(Message::Close(None)).await;
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
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use crates::{
        domain::{
            entities::users::UserEntity,
            repositories::{subscriptions::MockSubscriptionRepository, users::MockUserRepository},
        },
        panel::models::WebsocketCredentials,
    };
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tower::ServiceExt;
    use uuid::Uuid;

    const SECRET: &str = "servers-router-secret";

    fn bearer() -> String {
        let claims = SessionClaims {
            sub: "U1".to_string(),
            name: "Steve".to_string(),
            email: None,
            exp: (Utc::now().timestamp() + 600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        format!("Bearer {token}")
    }

    fn app(owns: bool, panel: MockPanelGateway) -> Router {
        let mut users = MockUserRepository::new();
        let mut subscriptions = MockSubscriptionRepository::new();

        users.expect_find_by_discord_id().returning(|_| {
            Box::pin(async {
                Ok(Some(UserEntity {
                    id: Uuid::from_u128(1),
                    discord_id: "U1".to_string(),
                    username: "steve_00u1".to_string(),
                    email: None,
                    pterodactyl_id: Some(42),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                }))
            })
        });
        subscriptions
            .expect_user_owns_server()
            .returning(move |_, _| Box::pin(async move { Ok(owns) }));

        let panel = Arc::new(panel);
        let state = ServersState {
            dashboard: DashboardUseCase::new(
                Arc::new(users),
                Arc::new(subscriptions),
                Arc::clone(&panel),
            ),
            relay: ConsoleRelay::new(
                panel,
                "https://panel.example".to_string(),
                Duration::from_secs(5),
            ),
        };

        router(Arc::new(state)).layer(Extension(Arc::new(SessionKeys::from_secret(SECRET))))
    }

    fn ws_token_request() -> Request<Body> {
        Request::builder()
            .uri("/1a7ce997/ws-token")
            .header("authorization", bearer())
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn owner_receives_console_credentials() {
        let mut panel = MockPanelGateway::new();
        panel
            .expect_websocket_credentials()
            .withf(|identifier| identifier == "1a7ce997")
            .returning(|_| {
                Ok(WebsocketCredentials {
                    token: "jwt".to_string(),
                    socket: "wss://node.example:8080/api/servers/1a7ce997/ws".to_string(),
                })
            });

        let response = app(true, panel).oneshot(ws_token_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["token"], "jwt");
        assert_eq!(json["socket"], "wss://node.example:8080/api/servers/1a7ce997/ws");
    }

    #[tokio::test]
    async fn strangers_are_forbidden() {
        let mut panel = MockPanelGateway::new();
        panel.expect_websocket_credentials().never();

        let response = app(false, panel).oneshot(ws_token_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
