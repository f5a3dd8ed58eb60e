use serde::Serialize;

use crate::{Role, RoleSet};

/// The authenticated identity attached to a request.
///
/// Built either from a verified credential lookup (login) or from a decoded
/// token (every other request). Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    username: String,
    roles: RoleSet,
}

impl Principal {
    pub fn new(username: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            username: username.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Derived from role membership; never stored separately.
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::ADMIN)
    }
}
