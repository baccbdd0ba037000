use std::sync::Arc;

use axum::{
    Json, async_trait,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::axum_http::error_responses::ErrorBody;

/// Claims of the session token minted by the Discord OAuth front end.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Discord user id.
    pub sub: String,
    pub name: String,
    pub email: Option<String>,
    pub exp: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub discord_id: String,
    pub display_name: String,
    pub email: Option<String>,
}

/// Verification material, installed on the router as an `Extension`.
#[derive(Clone)]
pub struct SessionKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl SessionKeys {
    pub fn from_secret(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }

        Ok(AuthUser {
            discord_id: claims.sub,
            display_name: claims.name,
            email: claims.email.filter(|email| !email.trim().is_empty()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing session token")]
    MissingToken,
    #[error("Invalid Authorization header format")]
    MalformedHeader,
    #[error("Invalid session token: {0}")]
    InvalidToken(String),
    #[error("Session verification is not configured")]
    KeysMissing,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::KeysMissing => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };

        (
            status,
            Json(ErrorBody {
                code: status.as_u16(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<String>, AuthError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = header.to_str().map_err(|_| AuthError::MalformedHeader)?;
    value
        .strip_prefix("Bearer ")
        .map(|token| Some(token.trim().to_string()))
        .ok_or(AuthError::MalformedHeader)
}

/// Browsers cannot set headers on a WebSocket upgrade, so `?token=` is accepted too.
fn query_token(parts: &Parts) -> Option<String> {
    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("token=")
                .filter(|token| !token.is_empty())
                .map(|token| token.to_string())
        })
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let keys = parts
            .extensions
            .get::<Arc<SessionKeys>>()
            .cloned()
            .ok_or(AuthError::KeysMissing)?;

        let token = match bearer_token(parts)? {
            Some(token) => token,
            None => query_token(parts).ok_or(AuthError::MissingToken)?,
        };

        keys.verify(&token)
    }
}
