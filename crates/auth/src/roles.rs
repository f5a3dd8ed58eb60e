use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role identifier used for route policy.
///
/// Roles are intentionally opaque strings at this layer. There is no hierarchy:
/// `ROLE_ADMIN` does not imply `ROLE_USER`, matching is exact membership.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Granted to every registered user.
    pub const USER: Role = Role(Cow::Borrowed("ROLE_USER"));

    /// Granted to administrators.
    pub const ADMIN: Role = Role(Cow::Borrowed("ROLE_ADMIN"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self(Cow::Borrowed(value))
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self(Cow::Owned(value))
    }
}

/// A set of roles with value equality.
///
/// Ordered so that serialized tokens and JSON bodies are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<Role>);

impl RoleSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.0.contains(role)
    }

    /// True when the two sets share at least one role.
    pub fn intersects(&self, other: &RoleSet) -> bool {
        self.0.iter().any(|r| other.0.contains(r))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(Role::as_str).collect()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[Role; N]> for RoleSet {
    fn from(roles: [Role; N]) -> Self {
        roles.into_iter().collect()
    }
}

impl IntoIterator for RoleSet {
    type Item = Role;
    type IntoIter = std::collections::btree_set::IntoIter<Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a Role;
    type IntoIter = std::collections::btree_set::Iter<'a, Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_compare_by_value() {
        assert_eq!(Role::new(String::from("ROLE_USER")), Role::USER);
        assert_ne!(Role::USER, Role::ADMIN);
    }

    #[test]
    fn intersection_is_exact_membership() {
        let admin_only = RoleSet::from([Role::ADMIN]);
        let user_only = RoleSet::from([Role::USER]);
        let both = RoleSet::from([Role::USER, Role::ADMIN]);

        assert!(!user_only.intersects(&admin_only));
        assert!(both.intersects(&admin_only));
        assert!(user_only.intersects(&both));
        assert!(!RoleSet::new().intersects(&both));
    }

    #[test]
    fn serializes_as_sorted_array() {
        let set = RoleSet::from([Role::USER, Role::ADMIN]);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["ROLE_ADMIN","ROLE_USER"]"#);

        let back: RoleSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
