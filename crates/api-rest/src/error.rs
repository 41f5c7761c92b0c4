//! Mapping core errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use osler_core::OslerError;

/// Answer given when a provider's clinical roles all point at missing provider types.
pub const PROVIDER_WITHOUT_ROLES: &str =
    "Fatal: your Provider register is corrupted, and lacks ProviderTypes. Report this error!";

#[derive(Debug)]
pub enum ApiError {
    Core(OslerError),
    BadRequest(String),
    /// No `x-osler-user` header on the request.
    Unauthenticated,
    /// The `x-osler-user` header names nobody in the staff store.
    UnknownUser(String),
}

impl From<OslerError> for ApiError {
    fn from(e: OslerError) -> Self {
        Self::Core(e)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            Self::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "Authentication required").into_response()
            }
            Self::UnknownUser(username) => {
                tracing::warn!(username, "request from unknown user");
                (StatusCode::FORBIDDEN, "Unknown user").into_response()
            }
            Self::Core(e) => core_error_response(e),
        }
    }
}

fn core_error_response(e: OslerError) -> Response {
    match e {
        OslerError::NotFound { kind, id } => {
            (StatusCode::NOT_FOUND, format!("{kind} {id} not found")).into_response()
        }
        OslerError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        OslerError::Uuid(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        OslerError::Text(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        OslerError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
        OslerError::ProviderWithoutRoles(provider) => {
            tracing::error!(%provider, "provider has no usable clinical roles");
            (StatusCode::INTERNAL_SERVER_ERROR, PROVIDER_WITHOUT_ROLES).into_response()
        }
        other => {
            tracing::error!("Request error: {:?}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}
