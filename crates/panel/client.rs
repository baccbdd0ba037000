use reqwest::{
    Method, RequestBuilder, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::models::{
    Envelope, NewPanelServer, NewPanelUser, PanelEgg, PanelError, PanelErrorBody, PanelServer,
    PanelUser, RawEgg, WebsocketCredentials, WebsocketCredentialsResponse,
};

const PANEL_ACCEPT: &str = "Application/vnd.pterodactyl.v1+json";

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub base_url: String,
    pub application_key: String,
    pub client_key: String,
}

#[derive(Debug, Clone, Copy)]
enum ApiKey {
    Application,
    Client,
}

/// Thin REST wrapper over the panel application and client APIs. Never retries.
pub struct PanelClient {
    http: reqwest::Client,
    config: PanelConfig,
}

impl PanelClient {
    pub fn new(config: PanelConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn request(&self, method: Method, key: ApiKey, path: &str) -> RequestBuilder {
        let token = match key {
            ApiKey::Application => &self.config.application_key,
            ApiKey::Client => &self.config.client_key,
        };

        self.http
            .request(method, format!("{}{}", self.base_url(), path))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, PANEL_ACCEPT)
            .header(CONTENT_TYPE, "application/json")
    }

    async fn check(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response, PanelError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::NOT_FOUND {
            debug!(context = %context, "panel: resource not found");
            return Err(PanelError::NotFound);
        }

        let body = resp.text().await.unwrap_or_default();
        let errors = serde_json::from_str::<PanelErrorBody>(&body)
            .map(|parsed| parsed.errors)
            .unwrap_or_default();

        warn!(
            status = %status,
            context = %context,
            panel_errors = ?errors,
            "panel: request rejected"
        );

        Err(PanelError::Rejected {
            status: status.as_u16(),
            errors,
        })
    }

    async fn decode<T: DeserializeOwned>(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<T, PanelError> {
        let resp = Self::check(resp, context).await?;
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| PanelError::Decode(format!("{context}: {err}")))
    }

    /// `None` when the panel has no user with this external id.
    pub async fn get_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PanelUser>, PanelError> {
        let resp = self
            .request(
                Method::GET,
                ApiKey::Application,
                &format!("/api/application/users/external/{}", external_id),
            )
            .send()
            .await?;

        match Self::decode::<Envelope<PanelUser>>(resp, "get user by external id").await {
            Ok(envelope) => Ok(Some(envelope.attributes)),
            Err(PanelError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn create_user(&self, user: &NewPanelUser) -> Result<PanelUser, PanelError> {
        let resp = self
            .request(Method::POST, ApiKey::Application, "/api/application/users")
            .json(user)
            .send()
            .await?;

        let envelope: Envelope<PanelUser> = Self::decode(resp, "create user").await?;
        Ok(envelope.attributes)
    }

    pub async fn delete_user(&self, user_id: i32) -> Result<(), PanelError> {
        let resp = self
            .request(
                Method::DELETE,
                ApiKey::Application,
                &format!("/api/application/users/{}", user_id),
            )
            .send()
            .await?;

        Self::check(resp, "delete user").await?;
        Ok(())
    }

    pub async fn get_egg(&self, nest_id: i32, egg_id: i32) -> Result<PanelEgg, PanelError> {
        let resp = self
            .request(
                Method::GET,
                ApiKey::Application,
                &format!(
                    "/api/application/nests/{}/eggs/{}?include=variables",
                    nest_id, egg_id
                ),
            )
            .send()
            .await?;

        let envelope: Envelope<RawEgg> = Self::decode(resp, "get egg").await?;
        Ok(envelope.attributes.into())
    }

    pub async fn get_server_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<PanelServer>, PanelError> {
        let resp = self
            .request(
                Method::GET,
                ApiKey::Application,
                &format!("/api/application/servers/external/{}", external_id),
            )
            .send()
            .await?;

        match Self::decode::<Envelope<PanelServer>>(resp, "get server by external id").await {
            Ok(envelope) => Ok(Some(envelope.attributes)),
            Err(PanelError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn create_server(&self, server: &NewPanelServer) -> Result<PanelServer, PanelError> {
        let resp = self
            .request(Method::POST, ApiKey::Application, "/api/application/servers")
            .json(server)
            .send()
            .await?;

        let envelope: Envelope<PanelServer> = Self::decode(resp, "create server").await?;
        Ok(envelope.attributes)
    }

    pub async fn delete_server(&self, server_id: i32) -> Result<(), PanelError> {
        let resp = self
            .request(
                Method::DELETE,
                ApiKey::Application,
                &format!("/api/application/servers/{}", server_id),
            )
            .send()
            .await?;

        Self::check(resp, "delete server").await?;
        Ok(())
    }

    /// Console token and socket url for one server, issued through the client API.
    pub async fn websocket_credentials(
        &self,
        identifier: &str,
    ) -> Result<WebsocketCredentials, PanelError> {
        let resp = self
            .request(
                Method::GET,
                ApiKey::Client,
                &format!("/api/client/servers/{}/websocket", identifier),
            )
            .send()
            .await?;

        let parsed: WebsocketCredentialsResponse =
            Self::decode(resp, "websocket credentials").await?;
        Ok(parsed.data)
    }
}
