use std::sync::Arc;

use crates::{
    domain::{
        entities::users::UserEntity,
        repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
        value_objects::subscriptions::SubscriptionSummaryDto,
    },
    panel::models::{PanelError, WebsocketCredentials},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::auth::AuthUser;

use super::gateways::PanelGateway;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("you do not have access to this server")]
    NotServerOwner,
    #[error("server not found on the game panel")]
    ServerNotFound,
    #[error("game panel is unavailable")]
    PanelUnavailable(#[source] PanelError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DashboardError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            DashboardError::NotServerOwner => StatusCode::FORBIDDEN,
            DashboardError::ServerNotFound => StatusCode::NOT_FOUND,
            DashboardError::PanelUnavailable(_) => StatusCode::BAD_GATEWAY,
            DashboardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, DashboardError>;

pub struct DashboardUseCase<U, S, Panel>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    panel: Arc<Panel>,
}

impl<U, S, Panel> DashboardUseCase<U, S, Panel>
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    Panel: PanelGateway + 'static,
{
    pub fn new(user_repo: Arc<U>, subscription_repo: Arc<S>, panel: Arc<Panel>) -> Self {
        Self {
            user_repo,
            subscription_repo,
            panel,
        }
    }

    pub async fn list_subscriptions(
        &self,
        auth: &AuthUser,
    ) -> UseCaseResult<Vec<SubscriptionSummaryDto>> {
        let Some(user) = self.load_user(auth).await? else {
            return Ok(Vec::new());
        };

        self.subscription_repo
            .list_for_user(user.id)
            .await
            .map_err(|err| {
                error!(user_id = %user.id, db_error = ?err, "dashboard: failed to list subscriptions");
                DashboardError::Internal(err)
            })
    }

    /// Succeeds only when one of the caller's subscriptions references the server.
    pub async fn authorize_server(&self, auth: &AuthUser, identifier: &str) -> UseCaseResult<()> {
        let user = self
            .load_user(auth)
            .await?
            .ok_or(DashboardError::NotServerOwner)?;

        let owns = self
            .subscription_repo
            .user_owns_server(user.id, identifier)
            .await
            .map_err(|err| {
                error!(user_id = %user.id, identifier, db_error = ?err, "dashboard: ownership check failed");
                DashboardError::Internal(err)
            })?;

        if !owns {
            warn!(user_id = %user.id, identifier, "dashboard: server access denied");
            return Err(DashboardError::NotServerOwner);
        }
        Ok(())
    }

    pub async fn console_credentials(
        &self,
        auth: &AuthUser,
        identifier: &str,
    ) -> UseCaseResult<WebsocketCredentials> {
        self.authorize_server(auth, identifier).await?;

        self.panel
            .websocket_credentials(identifier)
            .await
            .map_err(|err| match err {
                PanelError::NotFound => DashboardError::ServerNotFound,
                other => {
                    error!(identifier, error = %other, "dashboard: failed to fetch console credentials");
                    DashboardError::PanelUnavailable(other)
                }
            })
    }

    async fn load_user(&self, auth: &AuthUser) -> UseCaseResult<Option<UserEntity>> {
        self.user_repo
            .find_by_discord_id(&auth.discord_id)
            .await
            .map_err(|err| {
                error!(discord_id = %auth.discord_id, db_error = ?err, "dashboard: failed to load user");
                DashboardError::Internal(err)
            })
    }
}
