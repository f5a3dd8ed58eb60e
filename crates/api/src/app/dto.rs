use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::app::services::{UserPage, UserRecord};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub user_name: String,
    pub password: String,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub user_name: String,
    #[serde(default)]
    pub admin: bool,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub message: String,
}

impl LoginResponse {
    pub fn new(token: String, username: &str) -> Self {
        Self {
            token,
            username: username.to_string(),
            message: format!("Hello {username}, you have signed in successfully"),
        }
    }
}

/// Public view of a user. The password hash is never included.
pub fn user_to_json(user: &UserRecord) -> Value {
    json!({
        "id": user.id.get(),
        "name": user.name,
        "lastName": user.last_name,
        "email": user.email,
        "userName": user.username,
        "admin": user.is_admin(),
        "roles": user.roles.names(),
    })
}

pub fn page_to_json(page: &UserPage) -> Value {
    json!({
        "content": page.content.iter().map(user_to_json).collect::<Vec<_>>(),
        "number": page.number,
        "size": page.size,
        "totalElements": page.total_elements,
        "totalPages": page.total_pages(),
        "first": page.number == 0,
        "last": page.number >= page.total_pages().saturating_sub(1),
    })
}
