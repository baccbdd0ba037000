use std::sync::Arc;

use crates::{
    domain::{
        repositories::{
            plans::PlanRepository, subscriptions::SubscriptionRepository, users::UserRepository,
        },
        value_objects::checkout::CheckoutMetadata,
    },
    payments::stripe_client::CheckoutSessionRequest,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::AuthUser;

use super::gateways::StripeGateway;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckoutRequest {
    pub game_id: i32,
    pub plan_id: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RedirectUrl {
    pub url: String,
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("plan not found")]
    PlanNotFound,
    #[error("plan {plan_id} is not offered for game {game_id}")]
    PlanNotInGame { plan_id: i32, game_id: i32 },
    #[error("plan is not available for purchase")]
    NotPurchasable,
    #[error("log in once to create your game panel account before purchasing")]
    AccountNotProvisioned,
    #[error("no billing account found")]
    NoBillingAccount,
    #[error("payment provider is unavailable")]
    PaymentProvider(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CheckoutError::PlanNotFound | CheckoutError::NoBillingAccount => StatusCode::NOT_FOUND,
            CheckoutError::PlanNotInGame { .. } | CheckoutError::NotPurchasable => {
                StatusCode::BAD_REQUEST
            }
            CheckoutError::AccountNotProvisioned => StatusCode::CONFLICT,
            CheckoutError::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, CheckoutError>;

pub struct CheckoutUseCase<U, P, S, Stripe>
where
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
{
    user_repo: Arc<U>,
    plan_repo: Arc<P>,
    subscription_repo: Arc<S>,
    stripe_client: Arc<Stripe>,
}

impl<U, P, S, Stripe> CheckoutUseCase<U, P, S, Stripe>
where
    U: UserRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        plan_repo: Arc<P>,
        subscription_repo: Arc<S>,
        stripe_client: Arc<Stripe>,
    ) -> Self {
        Self {
            user_repo,
            plan_repo,
            subscription_repo,
            stripe_client,
        }
    }

    pub async fn create_checkout_session(
        &self,
        auth: &AuthUser,
        request: CreateCheckoutRequest,
    ) -> UseCaseResult<RedirectUrl> {
        let plan = self
            .plan_repo
            .find_by_id(request.plan_id)
            .await
            .map_err(|err| {
                error!(plan_id = request.plan_id, db_error = ?err, "checkout: failed to load plan");
                CheckoutError::Internal(err)
            })?
            .ok_or(CheckoutError::PlanNotFound)?;

        if plan.game_id != request.game_id {
            return Err(CheckoutError::PlanNotInGame {
                plan_id: plan.id,
                game_id: request.game_id,
            });
        }

        let price_id = plan.price_id.clone().ok_or_else(|| {
            warn!(plan_id = plan.id, "checkout: plan has no price id");
            CheckoutError::NotPurchasable
        })?;

        let user = self
            .user_repo
            .find_by_discord_id(&auth.discord_id)
            .await
            .map_err(|err| {
                error!(discord_id = %auth.discord_id, db_error = ?err, "checkout: failed to load user");
                CheckoutError::Internal(err)
            })?
            .filter(|user| user.pterodactyl_id.is_some())
            .ok_or(CheckoutError::AccountNotProvisioned)?;

        let metadata = CheckoutMetadata {
            discord_id: auth.discord_id.clone(),
            game_id: plan.game_id,
            plan_id: plan.id,
        };

        let session = self
            .stripe_client
            .create_checkout_session(CheckoutSessionRequest {
                price_id,
                client_reference_id: auth.discord_id.clone(),
                customer_email: auth.email.clone().or(user.email.clone()),
                metadata: metadata.to_map(),
            })
            .await
            .map_err(|err| {
                error!(discord_id = %auth.discord_id, plan_id = plan.id, error = %err, "checkout: stripe session creation failed");
                CheckoutError::PaymentProvider(err)
            })?;

        info!(
            discord_id = %auth.discord_id,
            user_id = %user.id,
            plan_id = plan.id,
            session_id = %session.id,
            "checkout: session created"
        );

        Ok(RedirectUrl { url: session.url })
    }

    pub async fn create_portal_session(&self, auth: &AuthUser) -> UseCaseResult<RedirectUrl> {
        let user = self
            .user_repo
            .find_by_discord_id(&auth.discord_id)
            .await
            .map_err(|err| {
                error!(discord_id = %auth.discord_id, db_error = ?err, "checkout: failed to load user");
                CheckoutError::Internal(err)
            })?
            .ok_or(CheckoutError::NoBillingAccount)?;

        let customer_id = self
            .subscription_repo
            .latest_customer_id_for_user(user.id)
            .await
            .map_err(|err| {
                error!(user_id = %user.id, db_error = ?err, "checkout: failed to load stripe customer");
                CheckoutError::Internal(err)
            })?
            .ok_or(CheckoutError::NoBillingAccount)?;

        let url = self
            .stripe_client
            .create_portal_session(&customer_id)
            .await
            .map_err(|err| {
                error!(user_id = %user.id, error = %err, "checkout: billing portal session failed");
                CheckoutError::PaymentProvider(err)
            })?;

        Ok(RedirectUrl { url })
    }
}
