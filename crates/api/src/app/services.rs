//! User directory backing the resource routes.
//!
//! Doubles as the [`UserStore`] the credential check reads from. Storage is
//! in-memory; persistence is out of scope for this service.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use userapp_auth::{CredentialError, PasswordEncoder, Role, RoleSet, StoredUser, UserStore};
use userapp_core::{DomainError, UserId};

use crate::app::dto::{CreateUserRequest, UpdateUserRequest};
use crate::config::AdminSeed;

/// Default page size for `/api/users/page/{page}`.
pub const PAGE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub roles: RoleSet,
}

impl UserRecord {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::ADMIN)
    }
}

/// One page of users, zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPage {
    pub content: Vec<UserRecord>,
    pub number: usize,
    pub size: usize,
    pub total_elements: usize,
}

impl UserPage {
    pub fn total_pages(&self) -> usize {
        if self.size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(self.size)
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Every user gets `ROLE_USER`; `admin` adds `ROLE_ADMIN`.
fn roles_for(admin: bool) -> RoleSet {
    if admin {
        RoleSet::from([Role::USER, Role::ADMIN])
    } else {
        RoleSet::from([Role::USER])
    }
}

#[derive(Debug)]
struct DirectoryState {
    last_id: UserId,
    users: BTreeMap<UserId, UserRecord>,
}

/// Thread-safe in-memory user directory.
#[derive(Debug)]
pub struct UserDirectory {
    inner: RwLock<DirectoryState>,
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(DirectoryState {
                last_id: UserId::new(0),
                users: BTreeMap::new(),
            }),
        }
    }

    pub fn list(&self) -> Vec<UserRecord> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.users.values().cloned().collect()
    }

    pub fn page(&self, number: usize, size: usize) -> UserPage {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let content = state
            .users
            .values()
            .skip(number.saturating_mul(size))
            .take(size)
            .cloned()
            .collect();

        UserPage {
            content,
            number,
            size,
            total_elements: state.users.len(),
        }
    }

    pub fn get(&self, id: UserId) -> Result<UserRecord, DomainError> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state.users.get(&id).cloned().ok_or(DomainError::NotFound)
    }

    /// Insert a new record, assigning the next id.
    fn insert(&self, mut record: UserRecord) -> Result<UserRecord, DomainError> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if state.users.values().any(|u| u.username == record.username) {
            return Err(DomainError::conflict(format!(
                "username '{}' is already taken",
                record.username
            )));
        }

        let id = state.last_id.next();
        state.last_id = id;
        record.id = id;
        state.users.insert(id, record.clone());
        Ok(record)
    }

    fn update(&self, id: UserId, req: UpdateUserRequest) -> Result<UserRecord, DomainError> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if state
            .users
            .values()
            .any(|u| u.id != id && u.username == req.user_name)
        {
            return Err(DomainError::conflict(format!(
                "username '{}' is already taken",
                req.user_name
            )));
        }

        let record = state.users.get_mut(&id).ok_or(DomainError::NotFound)?;
        record.name = req.name;
        record.last_name = req.last_name;
        record.email = req.email;
        record.username = req.user_name;
        record.roles = roles_for(req.admin);
        Ok(record.clone())
    }

    pub fn delete(&self, id: UserId) -> Result<(), DomainError> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.users.remove(&id).map(|_| ()).ok_or(DomainError::NotFound)
    }
}

impl UserStore for UserDirectory {
    fn find_by_username(&self, username: &str) -> Option<StoredUser> {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        state
            .users
            .values()
            .find(|u| u.username == username)
            .map(|u| StoredUser {
                username: u.username.clone(),
                password_hash: u.password_hash.clone(),
                roles: u.roles.clone(),
            })
    }
}

fn require(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} must not be blank")));
    }
    Ok(())
}

fn validate_profile(name: &str, last_name: &str, email: &str, user_name: &str) -> Result<(), DomainError> {
    require("name", name)?;
    require("lastName", last_name)?;
    require("email", email)?;
    if !email.contains('@') {
        return Err(DomainError::validation("email must be a well-formed address"));
    }
    require("userName", user_name)?;
    if !(4..=12).contains(&user_name.chars().count()) {
        return Err(DomainError::validation("userName must be between 4 and 12 characters"));
    }
    Ok(())
}

/// Application services shared by the handlers.
#[derive(Debug)]
pub struct AppServices {
    users: Arc<UserDirectory>,
    encoder: PasswordEncoder,
}

impl AppServices {
    pub fn new(encoder: PasswordEncoder) -> Self {
        Self {
            users: Arc::new(UserDirectory::new()),
            encoder,
        }
    }

    pub fn users(&self) -> &Arc<UserDirectory> {
        &self.users
    }

    pub fn encoder(&self) -> PasswordEncoder {
        self.encoder
    }

    /// Validate, hash the password off the async runtime, and store.
    pub async fn register_user(&self, req: CreateUserRequest) -> Result<UserRecord, ServiceError> {
        validate_profile(&req.name, &req.last_name, &req.email, &req.user_name)?;
        require("password", &req.password)?;

        let encoder = self.encoder;
        let password = req.password;
        let password_hash = tokio::task::spawn_blocking(move || encoder.encode(&password))
            .await
            .map_err(|e| ServiceError::Task(e.to_string()))??;

        let record = self.users.insert(UserRecord {
            id: UserId::new(0),
            name: req.name,
            last_name: req.last_name,
            email: req.email,
            username: req.user_name,
            password_hash,
            roles: roles_for(req.admin),
        })?;

        tracing::info!(user_id = %record.id, username = %record.username, "user registered");
        Ok(record)
    }

    pub fn update_user(&self, id: UserId, req: UpdateUserRequest) -> Result<UserRecord, ServiceError> {
        validate_profile(&req.name, &req.last_name, &req.email, &req.user_name)?;
        Ok(self.users.update(id, req)?)
    }

    pub fn delete_user(&self, id: UserId) -> Result<(), ServiceError> {
        self.users.delete(id)?;
        tracing::info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Create the configured administrator unless that username exists.
    pub async fn seed_admin(&self, seed: &AdminSeed) -> Result<(), ServiceError> {
        if self.users.find_by_username(&seed.username).is_some() {
            return Ok(());
        }

        self.register_user(CreateUserRequest {
            name: "Administrator".to_string(),
            last_name: "Administrator".to_string(),
            email: format!("{}@localhost", seed.username),
            user_name: seed.username.clone(),
            password: seed.password.clone(),
            admin: true,
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn services() -> AppServices {
        AppServices::new(PasswordEncoder::new(4).unwrap())
    }

    fn request(user_name: &str, admin: bool) -> CreateUserRequest {
        CreateUserRequest {
            name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: format!("{user_name}@example.com"),
            user_name: user_name.to_string(),
            password: "secret".to_string(),
            admin,
        }
    }

    #[tokio::test]
    async fn registration_assigns_roles_and_hashes_password() {
        let services = services();
        let user = services.register_user(request("ada1", false)).await.unwrap();
        let admin = services.register_user(request("root", true)).await.unwrap();

        assert_eq!(user.id, UserId::new(1));
        assert_eq!(admin.id, UserId::new(2));
        assert_eq!(user.roles, RoleSet::from([Role::USER]));
        assert!(admin.is_admin());
        assert_ne!(user.password_hash, "secret");
        assert!(services.encoder().matches("secret", &user.password_hash));
    }

    #[tokio::test]
    async fn duplicate_usernames_conflict() {
        let services = services();
        services.register_user(request("ada1", false)).await.unwrap();
        let err = services.register_user(request("ada1", true)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn invalid_profiles_are_rejected() {
        let services = services();
        let mut bad = request("ada1", false);
        bad.email = "not-an-email".to_string();
        assert!(services.register_user(bad).await.is_err());

        let mut short = request("ada", false);
        short.user_name = "ab".to_string();
        assert!(services.register_user(short).await.is_err());
    }

    #[tokio::test]
    async fn store_lookup_exposes_hash_and_roles() {
        let services = services();
        services.register_user(request("root", true)).await.unwrap();

        let stored = services.users().find_by_username("root").unwrap();
        assert!(stored.roles.contains(&Role::ADMIN));
        assert!(services.users().find_by_username("nobody").is_none());
    }

    #[tokio::test]
    async fn pages_are_zero_based() {
        let services = services();
        for i in 0..7 {
            services
                .register_user(request(&format!("user{i}"), false))
                .await
                .unwrap();
        }

        let first = services.users().page(0, PAGE_SIZE);
        let second = services.users().page(1, PAGE_SIZE);
        assert_eq!(first.content.len(), 5);
        assert_eq!(second.content.len(), 2);
        assert_eq!(second.total_pages(), 2);
        assert!(services.users().page(9, PAGE_SIZE).content.is_empty());
    }

    #[tokio::test]
    async fn update_and_delete_missing_users() {
        let services = services();
        let update = UpdateUserRequest {
            name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            user_name: "ada1".to_string(),
            admin: false,
        };
        assert!(services.update_user(UserId::new(42), update).is_err());
        assert!(services.delete_user(UserId::new(42)).is_err());
    }
}
