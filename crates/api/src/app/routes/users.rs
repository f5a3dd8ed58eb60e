use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};

use userapp_core::{DomainError, UserId};

use crate::app::services::{AppServices, PAGE_SIZE};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/page/:page", get(list_users_page))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

fn parse_id(raw: &str) -> Result<UserId, Response> {
    raw.parse::<UserId>().map_err(errors::domain_error_to_response)
}

pub async fn list_users(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let items = services
        .users()
        .list()
        .iter()
        .map(dto::user_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(items)).into_response()
}

pub async fn list_users_page(
    Extension(services): Extension<Arc<AppServices>>,
    Path(page): Path<String>,
) -> Response {
    let number = match page.parse::<usize>() {
        Ok(n) => n,
        Err(_) => {
            return errors::domain_error_to_response(DomainError::validation(
                "page must be a non-negative integer",
            ));
        }
    };
    let page = services.users().page(number, PAGE_SIZE);
    (StatusCode::OK, Json(dto::page_to_json(&page))).into_response()
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.users().get(id) {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateUserRequest>,
) -> Response {
    match services.register_user(body).await {
        Ok(user) => (StatusCode::CREATED, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateUserRequest>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.update_user(id, body) {
        Ok(user) => (StatusCode::OK, Json(dto::user_to_json(&user))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Response {
    let id = match parse_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.delete_user(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
