use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use userapp_auth::{AccessDenied, CredentialError, INVALID_CREDENTIALS_MESSAGE, TokenError};
use userapp_core::DomainError;

use crate::app::services::ServiceError;

/// User-facing text for every token failure, whatever the underlying cause.
pub const INVALID_TOKEN_MESSAGE: &str = "token is invalid";

/// User-facing text for an authenticated caller lacking the required role.
pub const FORBIDDEN_MESSAGE: &str = "access denied";

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Login failure. Identical for unknown users, wrong passwords, and
/// unreadable bodies.
pub fn login_failed() -> axum::response::Response {
    json_error(
        StatusCode::UNAUTHORIZED,
        CredentialError::InvalidCredentials.code(),
        INVALID_CREDENTIALS_MESSAGE,
    )
}

pub fn token_error_to_response(err: &TokenError) -> axum::response::Response {
    json_error(StatusCode::UNAUTHORIZED, err.code(), INVALID_TOKEN_MESSAGE)
}

pub fn access_denied_to_response(err: AccessDenied) -> axum::response::Response {
    match err {
        AccessDenied::Unauthenticated => {
            json_error(StatusCode::UNAUTHORIZED, err.code(), INVALID_TOKEN_MESSAGE)
        }
        AccessDenied::Forbidden => json_error(StatusCode::FORBIDDEN, err.code(), FORBIDDEN_MESSAGE),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let code = err.code();
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, code, msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, code, "user not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, code, msg),
    }
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Credential(e) => {
            tracing::error!(error = %e, "password hashing failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, e.code(), "internal error")
        }
        ServiceError::Task(e) => {
            tracing::error!(error = %e, "background task failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
        }
    }
}
