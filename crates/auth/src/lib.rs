//! `userapp-auth`: stateless authentication/authorization core.
//!
//! This crate is intentionally decoupled from HTTP and storage: the API crate
//! wires these pieces into its request pipeline, and user lookups go through
//! the [`UserStore`] trait.

pub mod claims;
pub mod codec;
pub mod credentials;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod store;

pub use claims::{TOKEN_TTL_SECS, TokenClaims, TokenError, token_ttl, validate_claims};
pub use codec::{SigningKey, TokenCodec};
pub use credentials::{
    CredentialError, CredentialVerifier, Credentials, INVALID_CREDENTIALS_MESSAGE, PasswordEncoder,
};
pub use policy::{
    AccessDenied, AccessPolicy, AccessRule, Method, PathPattern, Requirement, UnknownMethod, enforce,
};
pub use principal::Principal;
pub use roles::{Role, RoleSet};
pub use store::{InMemoryUserStore, StoredUser, UserStore};
