use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::RoleSet;

/// What the credential check needs to know about a stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub username: String,
    pub password_hash: String,
    pub roles: RoleSet,
}

/// Lookup-by-username contract consumed by [`crate::CredentialVerifier`].
///
/// Expected to be a fast indexed lookup; it is the only potentially blocking
/// call in the authentication path.
pub trait UserStore: Send + Sync {
    fn find_by_username(&self, username: &str) -> Option<StoredUser>;
}

impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    fn find_by_username(&self, username: &str) -> Option<StoredUser> {
        (**self).find_by_username(username)
    }
}

/// In-memory user store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<HashMap<String, StoredUser>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: StoredUser) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(user.username.clone(), user);
        }
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_username(&self, username: &str) -> Option<StoredUser> {
        let map = self.inner.read().ok()?;
        map.get(username).cloned()
    }
}
