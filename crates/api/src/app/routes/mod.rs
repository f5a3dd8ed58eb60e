use axum::{Router, routing::get};

pub mod system;
pub mod users;

/// Router for every resource endpoint. Access control is applied around it
/// by the auth pipeline, not per route.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/whoami", get(system::whoami))
        .nest("/api/users", users::router())
}
