use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Principal, RoleSet};

/// Lifetime of every issued token, in seconds. Tokens are never refreshed,
/// only reissued by a new login.
pub const TOKEN_TTL_SECS: i64 = 3600;

pub fn token_ttl() -> Duration {
    Duration::seconds(TOKEN_TTL_SECS)
}

/// Claims carried in the token payload.
///
/// Timestamps travel as JWT NumericDate (seconds since the epoch), so
/// sub-second precision is dropped on issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the username.
    pub sub: String,

    /// Roles granted to the subject.
    pub authorities: RoleSet,

    /// Convenience flag mirroring `ROLE_ADMIN` membership.
    ///
    /// Written for clients that read it; ignored when decoding.
    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,

    /// Issued-at timestamp.
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl TokenClaims {
    /// Claims for `principal`, valid from `now` for [`token_ttl`].
    pub fn for_principal(principal: &Principal, now: DateTime<Utc>) -> Self {
        Self {
            sub: principal.username().to_string(),
            authorities: principal.roles().clone(),
            is_admin: principal.is_admin(),
            issued_at: now,
            expires_at: now + token_ttl(),
        }
    }

    pub fn into_principal(self) -> Principal {
        Principal::new(self.sub, self.authorities)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    Expired,

    #[error("token could not be signed: {0}")]
    Signing(String),

    #[error("signing key must not be empty")]
    EmptyKey,
}

impl TokenError {
    /// Stable machine-readable code for JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed_token",
            Self::SignatureInvalid => "signature_invalid",
            Self::Expired => "token_expired",
            Self::Signing(_) => "token_signing_failed",
            Self::EmptyKey => "signing_key_missing",
        }
    }
}

/// Deterministically validate the time window of decoded claims.
///
/// Expiry is strict: there is no leeway, so a skewed clock reads as expiry.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenError::Malformed(
            "invalid time window (exp <= iat)".to_string(),
        ));
    }
    if now > claims.expires_at {
        return Err(TokenError::Expired);
    }
    Ok(())
}
