//! HTTP API application wiring (Axum router + auth pipeline).
//!
//! - `services.rs`: user directory and the store the credential check reads
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method, header};
use axum::{Extension, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use userapp_auth::{AccessPolicy, CredentialVerifier, SigningKey, TokenCodec, UserStore};

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
///
/// The auth pipeline wraps every route, including unmatched paths, in the
/// order authentication → validation → policy. CORS sits outside it so
/// preflight requests are answered without a token.
pub fn build_app(config: &ApiConfig, services: Arc<services::AppServices>) -> anyhow::Result<Router> {
    let codec = TokenCodec::new(SigningKey::new(config.jwt_secret.clone()))
        .context("invalid JWT signing key")?;

    let store: Arc<dyn UserStore> = services.users().clone();
    let verifier = CredentialVerifier::new(store, services.encoder())
        .context("failed to prepare credential verifier")?;

    let auth_state = middleware::AuthState {
        codec: Arc::new(codec),
        verifier: Arc::new(verifier),
        policy: Arc::new(AccessPolicy::users_api()),
        login_path: Arc::from(config.login_path.as_str()),
    };

    let pipeline = ServiceBuilder::new()
        .layer(axum::middleware::from_fn_with_state(
            auth_state.clone(),
            middleware::authentication_stage,
        ))
        .layer(axum::middleware::from_fn_with_state(
            auth_state.clone(),
            middleware::validation_stage,
        ))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::policy_stage,
        ));

    let router = routes::router()
        .layer(Extension(services))
        .layer(pipeline);

    if config.cors_origins.is_empty() {
        return Ok(router);
    }
    Ok(router.layer(cors_layer(&config.cors_origins)?))
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {o:?}")))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::AUTHORIZATION])
        .allow_credentials(true))
}
