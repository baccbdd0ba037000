use std::sync::Arc;

use crates::{
    domain::{
        entities::{
            games::GameEntity, plans::PlanEntity, subscriptions::InsertSubscriptionEntity,
        },
        repositories::{
            games::GameRepository, plans::PlanRepository, subscriptions::SubscriptionRepository,
            users::UserRepository,
        },
        value_objects::{
            checkout::{CheckoutMetadata, CheckoutMetadataError},
            enums::subscription_statuses::SubscriptionStatus,
            subscriptions::InsertSubscriptionOutcome,
        },
    },
    panel::models::{
        NewPanelServer, PanelEgg, PanelError, PanelServer, ServerDeploy, ServerFeatureLimits,
        ServerLimits,
    },
    payments::{
        stripe_client::WebhookVerifyError,
        stripe_events::{
            CheckoutSessionObject, Expandable, SubscriptionChange, SubscriptionObject,
            WebhookEvent,
        },
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::gateways::{PanelGateway, StripeGateway};

const SERVER_SWAP_MIB: i32 = 0;
const SERVER_IO_WEIGHT: i32 = 500;
const SERVER_ALLOCATIONS: i32 = 1;

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error("checkout metadata rejected: {0}")]
    InvalidMetadata(#[from] CheckoutMetadataError),
    #[error("user {0} has no game panel account yet; they must log in once before purchasing")]
    UserNotProvisioned(String),
    #[error("game panel request failed")]
    Panel(#[source] PanelError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ProvisioningError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            ProvisioningError::InvalidSignature
            | ProvisioningError::InvalidWebhook(_)
            | ProvisioningError::InvalidMetadata(_) => StatusCode::BAD_REQUEST,
            ProvisioningError::UserNotProvisioned(_) => StatusCode::CONFLICT,
            ProvisioningError::Panel(_) => StatusCode::BAD_GATEWAY,
            ProvisioningError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ProvisioningError>;

/// What a delivered event ended up doing; every variant is acknowledged with 200.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Provisioned {
        subscription_id: Uuid,
        server_identifier: String,
    },
    AlreadyProvisioned {
        subscription_id: Uuid,
    },
    StatusUpdated {
        status: SubscriptionStatus,
        rows: usize,
    },
    Ignored {
        event_type: String,
    },
}

pub struct ProvisioningUseCase<U, G, P, S, Stripe, Panel>
where
    U: UserRepository + Send + Sync + 'static,
    G: GameRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
    Panel: PanelGateway + 'static,
{
    user_repo: Arc<U>,
    game_repo: Arc<G>,
    plan_repo: Arc<P>,
    subscription_repo: Arc<S>,
    stripe_client: Arc<Stripe>,
    panel: Arc<Panel>,
    location_id: i32,
}

impl<U, G, P, S, Stripe, Panel> ProvisioningUseCase<U, G, P, S, Stripe, Panel>
where
    U: UserRepository + Send + Sync + 'static,
    G: GameRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Stripe: StripeGateway + 'static,
    Panel: PanelGateway + 'static,
{
    pub fn new(
        user_repo: Arc<U>,
        game_repo: Arc<G>,
        plan_repo: Arc<P>,
        subscription_repo: Arc<S>,
        stripe_client: Arc<Stripe>,
        panel: Arc<Panel>,
        location_id: i32,
    ) -> Self {
        Self {
            user_repo,
            game_repo,
            plan_repo,
            subscription_repo,
            stripe_client,
            panel,
            location_id,
        }
    }

    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> UseCaseResult<WebhookOutcome> {
        let event = self
            .stripe_client
            .verify_webhook_signature(payload, signature)
            .map_err(|err| match err {
                WebhookVerifyError::Signature(err) => {
                    warn!(error = %err, "provisioning: stripe webhook verification failed");
                    ProvisioningError::InvalidSignature
                }
                WebhookVerifyError::Payload(err) => {
                    warn!(error = %err, "provisioning: signed webhook body is not a stripe event");
                    ProvisioningError::InvalidWebhook(err.to_string())
                }
            })?;

        let event_type = event.type_.clone();
        info!(event_id = %event.id, event_type = %event_type, "provisioning: stripe webhook verified");

        let event = event.into_webhook_event().map_err(|err| {
            warn!(event_type = %event_type, error = %err, "provisioning: webhook payload shape mismatch");
            ProvisioningError::InvalidWebhook(err.to_string())
        })?;

        match event {
            WebhookEvent::CheckoutCompleted { event_id, session } => {
                self.handle_checkout_completed(&event_id, session).await
            }
            WebhookEvent::SubscriptionChanged {
                event_id,
                change,
                subscription,
            } => {
                self.handle_subscription_changed(&event_id, change, subscription)
                    .await
            }
            WebhookEvent::Ignored {
                event_id,
                event_type,
            } => {
                debug!(%event_id, %event_type, "provisioning: unhandled stripe event type");
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }

    async fn handle_checkout_completed(
        &self,
        event_id: &str,
        session: CheckoutSessionObject,
    ) -> UseCaseResult<WebhookOutcome> {
        let metadata = CheckoutMetadata::from_map(&session.metadata).map_err(|err| {
            warn!(event_id, session_id = %session.id, error = %err, "provisioning: checkout metadata rejected");
            ProvisioningError::InvalidMetadata(err)
        })?;

        let stripe_subscription_id = session
            .subscription
            .as_ref()
            .map(|subscription| subscription.id().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                warn!(event_id, session_id = %session.id, "provisioning: checkout session has no subscription");
                ProvisioningError::InvalidWebhook(
                    "checkout session has no subscription".to_string(),
                )
            })?;
        let stripe_customer_id = session.customer.as_ref().map(|c| Expandable::id(c).to_string());

        // Replays of an already processed checkout stop here.
        let existing = self
            .subscription_repo
            .find_by_stripe_subscription_id(&stripe_subscription_id)
            .await
            .map_err(|err| {
                error!(%stripe_subscription_id, db_error = ?err, "provisioning: failed to check existing subscription");
                ProvisioningError::Internal(err)
            })?;
        if let Some(existing) = existing {
            info!(
                event_id,
                %stripe_subscription_id,
                subscription_id = %existing.id,
                "provisioning: checkout already provisioned; replay acknowledged"
            );
            return Ok(WebhookOutcome::AlreadyProvisioned {
                subscription_id: existing.id,
            });
        }

        let user = self
            .user_repo
            .find_by_discord_id(&metadata.discord_id)
            .await
            .map_err(|err| {
                error!(discord_id = %metadata.discord_id, db_error = ?err, "provisioning: failed to load user");
                ProvisioningError::Internal(err)
            })?;
        let (user, panel_user_id) = match user {
            Some(user) => match user.pterodactyl_id {
                Some(panel_user_id) => (user, panel_user_id),
                None => {
                    warn!(discord_id = %metadata.discord_id, "provisioning: user has no panel account");
                    return Err(ProvisioningError::UserNotProvisioned(metadata.discord_id));
                }
            },
            None => {
                warn!(discord_id = %metadata.discord_id, "provisioning: checkout for unknown user");
                return Err(ProvisioningError::UserNotProvisioned(metadata.discord_id));
            }
        };

        let (game, plan) = self.load_game_and_plan(&metadata).await?;

        let (server, created_now) = self
            .ensure_server(&stripe_subscription_id, &game, &plan, panel_user_id, &user.username)
            .await?;

        let insert = InsertSubscriptionEntity {
            user_id: user.id,
            game_id: game.id,
            plan_id: plan.id,
            stripe_subscription_id: stripe_subscription_id.clone(),
            stripe_customer_id,
            panel_server_id: server.id,
            panel_server_identifier: server.identifier.clone(),
            status: SubscriptionStatus::Active.as_str().to_string(),
        };

        match self.subscription_repo.insert_after_checkout(insert).await {
            Ok(InsertSubscriptionOutcome::Inserted(row)) => {
                info!(
                    event_id,
                    user_id = %user.id,
                    subscription_id = %row.id,
                    %stripe_subscription_id,
                    panel_server_id = server.id,
                    server_identifier = %server.identifier,
                    "provisioning: subscription provisioned"
                );
                Ok(WebhookOutcome::Provisioned {
                    subscription_id: row.id,
                    server_identifier: row.panel_server_identifier,
                })
            }
            Ok(InsertSubscriptionOutcome::AlreadyExists(row)) => {
                warn!(
                    event_id,
                    %stripe_subscription_id,
                    subscription_id = %row.id,
                    "provisioning: concurrent delivery already recorded this subscription"
                );
                if created_now && row.panel_server_id != server.id {
                    self.compensate_server(&server, &stripe_subscription_id).await;
                }
                Ok(WebhookOutcome::AlreadyProvisioned {
                    subscription_id: row.id,
                })
            }
            Err(err) => {
                error!(
                    event_id,
                    %stripe_subscription_id,
                    panel_server_id = server.id,
                    db_error = ?err,
                    "provisioning: failed to insert subscription"
                );
                if created_now {
                    self.compensate_server(&server, &stripe_subscription_id).await;
                }
                Err(ProvisioningError::Internal(err))
            }
        }
    }

    async fn load_game_and_plan(
        &self,
        metadata: &CheckoutMetadata,
    ) -> UseCaseResult<(GameEntity, PlanEntity)> {
        let game = self
            .game_repo
            .find_by_id(metadata.game_id)
            .await
            .map_err(|err| {
                error!(game_id = metadata.game_id, db_error = ?err, "provisioning: failed to load game");
                ProvisioningError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(game_id = metadata.game_id, "provisioning: checkout references unknown game");
                ProvisioningError::InvalidWebhook(format!("unknown game {}", metadata.game_id))
            })?;

        let plan = self
            .plan_repo
            .find_by_id(metadata.plan_id)
            .await
            .map_err(|err| {
                error!(plan_id = metadata.plan_id, db_error = ?err, "provisioning: failed to load plan");
                ProvisioningError::Internal(err)
            })?
            .ok_or_else(|| {
                warn!(plan_id = metadata.plan_id, "provisioning: checkout references unknown plan");
                ProvisioningError::InvalidWebhook(format!("unknown plan {}", metadata.plan_id))
            })?;

        if plan.game_id != game.id {
            warn!(
                game_id = game.id,
                plan_id = plan.id,
                plan_game_id = plan.game_id,
                "provisioning: plan does not belong to game"
            );
            return Err(ProvisioningError::InvalidWebhook(format!(
                "plan {} does not belong to game {}",
                plan.id, game.id
            )));
        }

        Ok((game, plan))
    }

    /// Reuses the server already tagged with this subscription, otherwise creates one.
    /// The flag is true only when this call created it.
    async fn ensure_server(
        &self,
        stripe_subscription_id: &str,
        game: &GameEntity,
        plan: &PlanEntity,
        panel_user_id: i32,
        username: &str,
    ) -> UseCaseResult<(PanelServer, bool)> {
        let existing = self
            .panel
            .get_server_by_external_id(stripe_subscription_id)
            .await
            .map_err(|err| {
                error!(stripe_subscription_id, error = %err, "provisioning: panel server lookup failed");
                ProvisioningError::Panel(err)
            })?;
        if let Some(server) = existing {
            info!(
                stripe_subscription_id,
                panel_server_id = server.id,
                "provisioning: reusing panel server from an earlier attempt"
            );
            return Ok((server, false));
        }

        let egg = self
            .panel
            .get_egg(game.nest_id, game.egg_id)
            .await
            .map_err(|err| {
                error!(
                    nest_id = game.nest_id,
                    egg_id = game.egg_id,
                    error = %err,
                    "provisioning: failed to load server template"
                );
                ProvisioningError::Panel(err)
            })?;

        let request = server_request(
            stripe_subscription_id,
            game,
            plan,
            &egg,
            panel_user_id,
            username,
            self.location_id,
        );

        let server = self.panel.create_server(request).await.map_err(|err| {
            error!(
                stripe_subscription_id,
                panel_user_id,
                plan_id = plan.id,
                error = %err,
                "provisioning: panel server creation failed"
            );
            ProvisioningError::Panel(err)
        })?;

        info!(
            stripe_subscription_id,
            panel_server_id = server.id,
            server_identifier = %server.identifier,
            "provisioning: panel server created"
        );
        Ok((server, true))
    }

    async fn compensate_server(&self, server: &PanelServer, stripe_subscription_id: &str) {
        match self.panel.delete_server(server.id).await {
            Ok(()) => info!(
                stripe_subscription_id,
                panel_server_id = server.id,
                "provisioning: compensating server delete succeeded"
            ),
            Err(err) => error!(
                stripe_subscription_id,
                panel_server_id = server.id,
                server_identifier = %server.identifier,
                error = %err,
                "provisioning: compensating server delete failed; orphaned panel server"
            ),
        }
    }

    async fn handle_subscription_changed(
        &self,
        event_id: &str,
        change: SubscriptionChange,
        subscription: SubscriptionObject,
    ) -> UseCaseResult<WebhookOutcome> {
        let status = SubscriptionStatus::from_str(&subscription.status).ok_or_else(|| {
            warn!(
                event_id,
                stripe_subscription_id = %subscription.id,
                status = %subscription.status,
                "provisioning: unrecognised subscription status"
            );
            ProvisioningError::InvalidWebhook(format!(
                "unrecognised subscription status `{}`",
                subscription.status
            ))
        })?;

        let rows = self
            .subscription_repo
            .update_status_by_stripe_subscription_id(&subscription.id, status)
            .await
            .map_err(|err| {
                error!(
                    event_id,
                    stripe_subscription_id = %subscription.id,
                    db_error = ?err,
                    "provisioning: failed to update subscription status"
                );
                ProvisioningError::Internal(err)
            })?;

        if rows == 0 {
            info!(
                event_id,
                stripe_subscription_id = %subscription.id,
                %status,
                "provisioning: status change for unknown subscription acknowledged"
            );
        } else {
            info!(
                event_id,
                stripe_subscription_id = %subscription.id,
                %status,
                deleted = change == SubscriptionChange::Deleted,
                "provisioning: subscription status updated"
            );
        }

        Ok(WebhookOutcome::StatusUpdated { status, rows })
    }
}

/// Server sized by the plan, built from the game's egg, owned by the panel user.
pub fn server_request(
    stripe_subscription_id: &str,
    game: &GameEntity,
    plan: &PlanEntity,
    egg: &PanelEgg,
    panel_user_id: i32,
    username: &str,
    location_id: i32,
) -> NewPanelServer {
    NewPanelServer {
        external_id: stripe_subscription_id.to_string(),
        name: format!("{} {} ({})", game.name, plan.name, username),
        user: panel_user_id,
        egg: egg.id,
        docker_image: egg.docker_image.clone(),
        startup: egg.startup.clone(),
        environment: egg.default_environment(),
        limits: ServerLimits {
            memory: plan.limits.ram,
            swap: SERVER_SWAP_MIB,
            disk: plan.limits.disk,
            io: SERVER_IO_WEIGHT,
            cpu: plan.limits.cpu,
        },
        feature_limits: ServerFeatureLimits {
            databases: plan.limits.databases,
            backups: plan.limits.backups,
            allocations: SERVER_ALLOCATIONS,
        },
        deploy: ServerDeploy {
            locations: vec![location_id],
            dedicated_ip: false,
            port_range: vec![],
        },
        start_on_completion: true,
    }
}
