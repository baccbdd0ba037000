use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            code: status.as_u16(),
            message: message.into(),
        }),
    )
        .into_response()
}

/// Turns a use-case failure into a JSON error. 500s never echo their source to the client.
pub fn usecase_error<E>(area: &str, status: StatusCode, err: &E) -> Response
where
    E: std::error::Error,
{
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(status = status.as_u16(), error = %err, "{}: request failed", area);
        return error_response(status, "Internal server error");
    }

    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "{}: request failed", area);
    } else {
        warn!(status = status.as_u16(), error = %err, "{}: request rejected", area);
    }
    error_response(status, err.to_string())
}
