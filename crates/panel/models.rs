use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Application API resources come wrapped as `{ "object": "...", "attributes": {...} }`.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub object: String,
    pub attributes: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListEnvelope<T> {
    pub object: String,
    pub data: Vec<Envelope<T>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PanelUser {
    pub id: i32,
    #[serde(default)]
    pub external_id: Option<String>,
    pub uuid: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewPanelUser {
    pub external_id: String,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EggVariable {
    pub env_variable: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawEgg {
    pub id: i32,
    pub nest: i32,
    pub docker_image: String,
    pub startup: String,
    #[serde(default)]
    pub relationships: Option<RawEggRelationships>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawEggRelationships {
    pub variables: ListEnvelope<EggVariable>,
}

/// Server template resolved from a nest/egg pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelEgg {
    pub id: i32,
    pub nest: i32,
    pub docker_image: String,
    pub startup: String,
    pub variables: Vec<EggVariable>,
}

impl From<RawEgg> for PanelEgg {
    fn from(raw: RawEgg) -> Self {
        let variables = raw
            .relationships
            .map(|rel| {
                rel.variables
                    .data
                    .into_iter()
                    .map(|item| item.attributes)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: raw.id,
            nest: raw.nest,
            docker_image: raw.docker_image,
            startup: raw.startup,
            variables,
        }
    }
}

impl PanelEgg {
    /// Environment populated with each variable's default value.
    pub fn default_environment(&self) -> HashMap<String, String> {
        self.variables
            .iter()
            .map(|var| {
                (
                    var.env_variable.clone(),
                    var.default_value.clone().unwrap_or_default(),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PanelServer {
    pub id: i32,
    #[serde(default)]
    pub external_id: Option<String>,
    pub uuid: String,
    pub identifier: String,
    pub name: String,
    pub user: i32,
    #[serde(default)]
    pub suspended: bool,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ServerLimits {
    pub memory: i32,
    pub swap: i32,
    pub disk: i32,
    pub io: i32,
    pub cpu: i32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ServerFeatureLimits {
    pub databases: i32,
    pub backups: i32,
    pub allocations: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ServerDeploy {
    pub locations: Vec<i32>,
    pub dedicated_ip: bool,
    pub port_range: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewPanelServer {
    pub external_id: String,
    pub name: String,
    pub user: i32,
    pub egg: i32,
    pub docker_image: String,
    pub startup: String,
    pub environment: HashMap<String, String>,
    pub limits: ServerLimits,
    pub feature_limits: ServerFeatureLimits,
    pub deploy: ServerDeploy,
    pub start_on_completion: bool,
}

/// Short-lived console credentials from the client API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebsocketCredentials {
    pub token: String,
    pub socket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WebsocketCredentialsResponse {
    pub data: WebsocketCredentials,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PanelErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PanelErrorBody {
    #[serde(default)]
    pub errors: Vec<PanelErrorDetail>,
}

const TAKEN_MARKER: &str = "has already been taken";

#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("panel resource not found")]
    NotFound,
    #[error("panel rejected request with status {status}: {}", summarize(.errors))]
    Rejected {
        status: u16,
        errors: Vec<PanelErrorDetail>,
    },
    #[error("panel request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected panel response: {0}")]
    Decode(String),
}

impl PanelError {
    /// True when the panel refused a create because a unique field is already taken.
    /// Other 422s are plain validation failures.
    pub fn is_conflict(&self) -> bool {
        match self {
            PanelError::Rejected { status: 409, .. } => true,
            PanelError::Rejected {
                status: 422,
                errors,
            } => errors
                .iter()
                .any(|err| err.detail.to_ascii_lowercase().contains(TAKEN_MARKER)),
            _ => false,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, PanelError::Rejected { status: 422, .. }) && !self.is_conflict()
    }
}

fn summarize(errors: &[PanelErrorDetail]) -> String {
    if errors.is_empty() {
        return "<no error details>".to_string();
    }
    errors
        .iter()
        .map(|err| format!("{} ({})", err.detail, err.code))
        .collect::<Vec<_>>()
        .join("; ")
}
