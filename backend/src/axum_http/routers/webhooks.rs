use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::repositories::{
        games::GameRepository, plans::PlanRepository, subscriptions::SubscriptionRepository,
        users::UserRepository,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            games::GamePostgres, plans::PlanPostgres, subscriptions::SubscriptionPostgres,
            users::UserPostgres,
        },
    },
    panel::client::PanelClient,
    payments::stripe_client::StripeClient,
};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    axum_http::error_responses::{error_response, usecase_error},
    config::config_model::DotEnvyConfig,
    usecases::{
        gateways::{PanelGateway, StripeGateway},
        provisioning::ProvisioningUseCase,
    },
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    config: Arc<DotEnvyConfig>,
    stripe_client: Arc<StripeClient>,
    panel_client: Arc<PanelClient>,
) -> Router {
    let usecase = ProvisioningUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(GamePostgres::new(Arc::clone(&db_pool))),
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        stripe_client,
        panel_client,
        config.panel.default_location_id,
    );

    router(Arc::new(usecase))
}

pub fn router<U, G, P, S, Stripe, Panel>(
    usecase: Arc<ProvisioningUseCase<U, G, P, S, Stripe, Panel>>,
) -> Router
where
    U: UserRepository + Send + Sync + 'static,
    G: GameRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
    Panel: PanelGateway + 'static,
{
    Router::new()
        .route("/stripe", post(stripe_webhook::<U, G, P, S, Stripe, Panel>))
        .with_state(usecase)
}

pub async fn stripe_webhook<U, G, P, S, Stripe, Panel>(
    State(usecase): State<Arc<ProvisioningUseCase<U, G, P, S, Stripe, Panel>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    U: UserRepository + Send + Sync + 'static,
    G: GameRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
    Panel: PanelGateway + 'static,
{
    let Some(signature) = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        warn!("webhooks: stripe request without signature header");
        return error_response(StatusCode::BAD_REQUEST, "missing Stripe-Signature header");
    };

    match usecase.handle_stripe_webhook(&body, signature).await {
        Ok(outcome) => {
            info!(outcome = ?outcome, "webhooks: stripe event handled");
            (StatusCode::OK, Json(json!({ "received": true }))).into_response()
        }
        Err(err) => usecase_error("webhooks", err.status_code(), &err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::gateways::{MockPanelGateway, MockStripeGateway};
    use anyhow::anyhow;
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use crates::{
        domain::repositories::{
            games::MockGameRepository, plans::MockPlanRepository,
            subscriptions::MockSubscriptionRepository, users::MockUserRepository,
        },
        payments::{
            stripe_client::WebhookVerifyError,
            stripe_events::{StripeEvent, StripeEventData},
        },
    };
    use tower::ServiceExt;

    fn app(stripe: MockStripeGateway) -> Router {
        let usecase = ProvisioningUseCase::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockGameRepository::new()),
            Arc::new(MockPlanRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(stripe),
            Arc::new(MockPanelGateway::new()),
            1,
        );
        router(Arc::new(usecase))
    }

    fn request(signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/stripe");
        if let Some(signature) = signature {
            builder = builder.header(STRIPE_SIGNATURE_HEADER, signature);
        }
        builder
            .body(Body::from(r#"{"id":"evt_1","type":"invoice.paid","data":{"object":{}}}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected_before_verification() {
        let mut stripe = MockStripeGateway::new();
        stripe.expect_verify_webhook_signature().never();

        let response = app(stripe).oneshot(request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_signature_is_a_client_error() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .returning(|_, _| {
                Err(WebhookVerifyError::Signature(anyhow!(
                    "no matching v1 signature"
                )))
            });

        let response = app(stripe)
            .oneshot(request(Some("t=1,v1=deadbeef")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unhandled_event_types_are_acknowledged() {
        let mut stripe = MockStripeGateway::new();
        stripe
            .expect_verify_webhook_signature()
            .withf(|_, signature| signature == "t=1,v1=good")
            .returning(|_, _| {
                Ok(StripeEvent {
                    id: "evt_1".to_string(),
                    type_: "invoice.paid".to_string(),
                    data: StripeEventData {
                        object: serde_json::json!({}),
                    },
                })
            });

        let response = app(stripe)
            .oneshot(request(Some("t=1,v1=good")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&body).unwrap(),
            json!({ "received": true })
        );
    }
}
