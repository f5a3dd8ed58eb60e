//! Authentication pipeline.
//!
//! Three independent stages, composed in order at startup:
//!
//! 1. [`authentication_stage`] answers the login request itself.
//! 2. [`validation_stage`] turns a bearer token into a [`PrincipalContext`].
//! 3. [`policy_stage`] checks the route's requirement against that context.
//!
//! The login request never reaches stages 2 and 3.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method as HttpMethod, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use userapp_auth::{
    AccessPolicy, CredentialVerifier, Credentials, Method, Principal, Requirement, TokenCodec,
    enforce,
};

use crate::app::dto::LoginResponse;
use crate::app::errors::{access_denied_to_response, json_error, login_failed, token_error_to_response};
use crate::context::PrincipalContext;

/// Largest login body read before giving up.
const LOGIN_BODY_LIMIT: usize = 64 * 1024;

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Clone)]
pub struct AuthState {
    pub codec: Arc<TokenCodec>,
    pub verifier: Arc<CredentialVerifier>,
    pub policy: Arc<AccessPolicy>,
    pub login_path: Arc<str>,
}

impl AuthState {
    fn is_login(&self, req: &Request<Body>) -> bool {
        req.method() == HttpMethod::POST && req.uri().path() == &*self.login_path
    }
}

/// Handle `POST <login_path>`: verify credentials and issue a token.
///
/// Any other request passes straight through.
pub async fn authentication_stage(
    State(state): State<AuthState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.is_login(&req) {
        return next.run(req).await;
    }

    let Some(credentials) = read_credentials(req).await else {
        tracing::debug!("login body could not be read as credentials");
        return login_failed();
    };

    let verifier = state.verifier.clone();
    let outcome =
        tokio::task::spawn_blocking(move || verifier.verify_credentials(&credentials)).await;

    let principal = match outcome {
        Ok(Ok(principal)) => principal,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "login failed");
            return login_failed();
        }
        Err(e) => {
            tracing::error!(error = %e, "credential check did not complete");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error");
        }
    };

    match state.codec.issue(&principal) {
        Ok(token) => login_succeeded(&principal, token),
        Err(e) => {
            tracing::error!(error = %e, "token could not be issued");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, e.code(), "internal error")
        }
    }
}

async fn read_credentials(req: Request<Body>) -> Option<Credentials> {
    let bytes = axum::body::to_bytes(req.into_body(), LOGIN_BODY_LIMIT)
        .await
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn login_succeeded(principal: &Principal, token: String) -> Response {
    let header_value = match HeaderValue::from_str(&format!("{BEARER_PREFIX}{token}")) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "issued token is not a valid header value");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error");
        }
    };

    tracing::info!(username = principal.username(), "login succeeded");

    let body = LoginResponse::new(token, principal.username());
    let mut response = (StatusCode::OK, axum::Json(body)).into_response();
    response.headers_mut().insert(header::AUTHORIZATION, header_value);
    response
}

/// Attach the principal carried by a bearer token, if any.
///
/// No header (or a non-bearer scheme) leaves the request anonymous so public
/// routes stay reachable; a bearer token that fails to decode ends the
/// request with 401.
pub async fn validation_stage(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if state.is_login(&req) {
        return next.run(req).await;
    }

    let token = extract_bearer(req.headers()).map(str::to_owned);
    let Some(token) = token else {
        return next.run(req).await;
    };

    match state.codec.decode(&token) {
        Ok(principal) => {
            req.extensions_mut().insert(PrincipalContext::new(principal));
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "token validation failed");
            token_error_to_response(&e)
        }
    }
}

/// Enforce the access policy for the matched method and path.
pub async fn policy_stage(
    State(state): State<AuthState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if state.is_login(&req) {
        return next.run(req).await;
    }

    let principal = req
        .extensions()
        .get::<PrincipalContext>()
        .map(PrincipalContext::principal);

    let decision = match req.method().as_str().parse::<Method>() {
        Ok(method) => state.policy.check(method, req.uri().path(), principal),
        Err(_) => enforce(&Requirement::AnyAuthenticated, principal),
    };

    match decision {
        Ok(()) => next.run(req).await,
        Err(denied) => {
            tracing::debug!(
                method = %req.method(),
                path = req.uri().path(),
                reason = %denied,
                "request denied by access policy"
            );
            access_denied_to_response(denied)
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer mytoken123"));
        assert_eq!(extract_bearer(&headers), Some("mytoken123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer(&headers), Some(""));
    }
}
