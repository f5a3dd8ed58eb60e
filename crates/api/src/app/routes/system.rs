use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "username": principal.username(),
        "roles": principal.roles().names(),
        "admin": principal.principal().is_admin(),
    }))
}
