use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
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

use crate::{
    auth::AuthUser,
    axum_http::error_responses::usecase_error,
    usecases::{dashboard::DashboardUseCase, gateways::PanelGateway},
};

pub fn routes(db_pool: Arc<PgPoolSquad>, panel_client: Arc<PanelClient>) -> Router {
    let usecase = DashboardUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        panel_client,
    );

    router(Arc::new(usecase))
}

pub fn router<U, S, Panel>(usecase: Arc<DashboardUseCase<U, S, Panel>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    Router::new()
        .route("/", get(list_subscriptions::<U, S, Panel>))
        .with_state(usecase)
}

pub async fn list_subscriptions<U, S, Panel>(
    State(usecase): State<Arc<DashboardUseCase<U, S, Panel>>>,
    auth: AuthUser,
) -> Response
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    match usecase.list_subscriptions(&auth).await {
        Ok(subscriptions) => Json(subscriptions).into_response(),
        Err(err) => usecase_error("subscriptions", err.status_code(), &err),
    }
}
