//! Username/password verification against the user store.

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::{Principal, UserStore};

/// User-facing text for every login failure.
///
/// Shared by the unknown-user and wrong-password paths so a caller cannot
/// tell which half of the credentials was wrong.
pub const INVALID_CREDENTIALS_MESSAGE: &str =
    "authentication failed: invalid username or password";

/// Lowest cost bcrypt accepts.
pub const MIN_BCRYPT_COST: u32 = 4;

/// Highest cost bcrypt accepts.
pub const MAX_BCRYPT_COST: u32 = 31;

/// Login credentials as submitted. Never persisted.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    #[serde(rename = "userName")]
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{}", INVALID_CREDENTIALS_MESSAGE)]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl CredentialError {
    /// Stable machine-readable code for JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::Hashing(_) => "password_hashing_failed",
        }
    }
}

/// Bcrypt password hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordEncoder {
    cost: u32,
}

impl PasswordEncoder {
    /// Cost used when nothing else is configured.
    pub const DEFAULT_COST: u32 = 10;

    pub fn new(cost: u32) -> Result<Self, CredentialError> {
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
            return Err(CredentialError::Hashing(format!(
                "cost {cost} outside {MIN_BCRYPT_COST}..={MAX_BCRYPT_COST}"
            )));
        }
        Ok(Self { cost })
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn encode(&self, raw: &str) -> Result<String, CredentialError> {
        bcrypt::hash(raw, self.cost).map_err(|e| CredentialError::Hashing(e.to_string()))
    }

    /// False both on mismatch and on a hash that cannot be parsed.
    pub fn matches(&self, raw: &str, hash: &str) -> bool {
        match bcrypt::verify(raw, hash) {
            Ok(matched) => matched,
            Err(e) => {
                tracing::warn!(error = %e, "stored password hash could not be parsed");
                false
            }
        }
    }
}

impl Default for PasswordEncoder {
    fn default() -> Self {
        Self {
            cost: Self::DEFAULT_COST,
        }
    }
}

/// Checks submitted credentials against the [`UserStore`].
pub struct CredentialVerifier {
    store: Arc<dyn UserStore>,
    encoder: PasswordEncoder,
    // Verified against when the username is unknown, so both failure paths
    // pay for one bcrypt comparison.
    dummy_hash: String,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn UserStore>, encoder: PasswordEncoder) -> Result<Self, CredentialError> {
        let dummy_hash = encoder.encode("unknown-user-placeholder")?;
        Ok(Self {
            store,
            encoder,
            dummy_hash,
        })
    }

    /// Returns the principal for valid credentials.
    ///
    /// Blocking: performs a store lookup and a bcrypt comparison.
    pub fn verify(&self, username: &str, password: &str) -> Result<Principal, CredentialError> {
        let Some(user) = self.store.find_by_username(username) else {
            let _ = self.encoder.matches(password, &self.dummy_hash);
            tracing::debug!(username, "login rejected");
            return Err(CredentialError::InvalidCredentials);
        };

        if !self.encoder.matches(password, &user.password_hash) {
            tracing::debug!(username, "login rejected");
            return Err(CredentialError::InvalidCredentials);
        }

        Ok(Principal::new(user.username, user.roles))
    }

    pub fn verify_credentials(&self, credentials: &Credentials) -> Result<Principal, CredentialError> {
        self.verify(&credentials.username, &credentials.password)
    }
}

impl core::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}
