use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::repositories::{
        plans::PlanRepository, subscriptions::SubscriptionRepository, users::UserRepository,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            plans::PlanPostgres, subscriptions::SubscriptionPostgres, users::UserPostgres,
        },
    },
    payments::stripe_client::StripeClient,
};
use tracing::info;

use crate::{
    auth::AuthUser,
    axum_http::error_responses::usecase_error,
    usecases::{
        checkout::{CheckoutUseCase, CreateCheckoutRequest},
        gateways::StripeGateway,
    },
};

pub fn routes(db_pool: Arc<PgPoolSquad>, stripe_client: Arc<StripeClient>) -> Router {
    let usecase = CheckoutUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        stripe_client,
    );

    router(Arc::new(usecase))
}

pub fn router<U, P, S, Stripe>(usecase: Arc<CheckoutUseCase<U, P, S, Stripe>>) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
{
    Router::new()
        .route("/checkout", post(create_checkout::<U, P, S, Stripe>))
        .route("/billing/portal", post(billing_portal::<U, P, S, Stripe>))
        .with_state(usecase)
}

pub async fn create_checkout<U, P, S, Stripe>(
    State(usecase): State<Arc<CheckoutUseCase<U, P, S, Stripe>>>,
    auth: AuthUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> Response
where
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
{
    info!(
        discord_id = %auth.discord_id,
        game_id = request.game_id,
        plan_id = request.plan_id,
        "checkout: session requested"
    );

    match usecase.create_checkout_session(&auth, request).await {
        Ok(redirect) => Json(redirect).into_response(),
        Err(err) => usecase_error("checkout", err.status_code(), &err),
    }
}

pub async fn billing_portal<U, P, S, Stripe>(
    State(usecase): State<Arc<CheckoutUseCase<U, P, S, Stripe>>>,
    auth: AuthUser,
) -> Response
where
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
{
    match usecase.create_portal_session(&auth).await {
        Ok(redirect) => Json(redirect).into_response(),
        Err(err) => usecase_error("checkout", err.status_code(), &err),
    }
}
