use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::{
    panel::{
        client::PanelClient,
        models::{
            NewPanelServer, NewPanelUser, PanelEgg, PanelError, PanelServer, PanelUser,
            WebsocketCredentials,
        },
    },
    payments::{
        stripe_client::{
            CheckoutSessionCreated, CheckoutSessionRequest, StripeClient, WebhookVerifyError,
        },
        stripe_events::StripeEvent,
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StripeGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AnyResult<CheckoutSessionCreated>;

    async fn create_portal_session(&self, customer_id: &str) -> AnyResult<String>;

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookVerifyError>;
}

#[async_trait]
impl StripeGateway for StripeClient {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> AnyResult<CheckoutSessionCreated> {
        self.create_checkout_session(request).await
    }

    async fn create_portal_session(&self, customer_id: &str) -> AnyResult<String> {
        self.create_portal_session(customer_id).await
    }

    fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<StripeEvent, WebhookVerifyError> {
        self.verify_webhook_signature(payload, signature)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PanelGateway: Send + Sync {
    async fn get_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PanelUser>, PanelError>;

    async fn create_user(&self, user: NewPanelUser) -> Result<PanelUser, PanelError>;

    async fn delete_user(&self, user_id: i32) -> Result<(), PanelError>;

    async fn get_egg(&self, nest_id: i32, egg_id: i32) -> Result<PanelEgg, PanelError>;

    async fn get_server_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PanelServer>, PanelError>;

    async fn create_server(&self, server: NewPanelServer) -> Result<PanelServer, PanelError>;

    async fn delete_server(&self, server_id: i32) -> Result<(), PanelError>;

    async fn websocket_credentials(
        &self,
        identifier: &str,
    ) -> Result<WebsocketCredentials, PanelError>;
}

#[async_trait]
impl PanelGateway for PanelClient {
    async fn get_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PanelUser>, PanelError> {
        self.get_user_by_external_id(external_id).await
    }

    async fn create_user(&self, user: NewPanelUser) -> Result<PanelUser, PanelError> {
        self.create_user(&user).await
    }

    async fn delete_user(&self, user_id: i32) -> Result<(), PanelError> {
        self.delete_user(user_id).await
    }

    async fn get_egg(&self, nest_id: i32, egg_id: i32) -> Result<PanelEgg, PanelError> {
        self.get_egg(nest_id, egg_id).await
    }

    async fn get_server_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PanelServer>, PanelError> {
        self.get_server_by_external_id(external_id).await
    }

    async fn create_server(&self, server: NewPanelServer) -> Result<PanelServer, PanelError> {
        self.create_server(&server).await
    }

    async fn delete_server(&self, server_id: i32) -> Result<(), PanelError> {
        self.delete_server(server_id).await
    }

    async fn websocket_credentials(
        &self,
        identifier: &str,
    ) -> Result<WebsocketCredentials, PanelError> {
        self.websocket_credentials(identifier).await
    }
}
