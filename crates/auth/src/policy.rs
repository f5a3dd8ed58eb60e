//! Route access policy: which requests need which roles.
//!
//! - No IO
//! - No panics
//! - Pure lookups over a table built once at startup

use core::str::FromStr;

use thiserror::Error;

use crate::{Principal, Role, RoleSet};

/// HTTP method a rule applies to.
///
/// Kept local so this crate stays free of any HTTP framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl core::fmt::Display for Method {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported HTTP method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            other => Err(UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
}

/// Path pattern such as `/api/users/{id}`.
///
/// `{name}` segments match exactly one non-empty path segment; everything
/// else must match literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(raw: &str) -> Self {
        let segments = split_path(raw)
            .into_iter()
            .map(|s| {
                if s.starts_with('{') && s.ends_with('}') {
                    Segment::Param
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();

        Self { segments }
    }

    pub fn matches(&self, path: &str) -> bool {
        let mut parts = split_path(path).into_iter();
        for segment in &self.segments {
            match (segment, parts.next()) {
                (Segment::Literal(lit), Some(part)) if lit == part => {}
                (Segment::Param, Some(part)) if !part.is_empty() => {}
                _ => return false,
            }
        }
        parts.next().is_none()
    }
}

// A trailing slash is ignored; interior empty segments are kept so that
// `/api//users` does not match `/api/users`.
fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

/// What a route demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Public,
    AnyAuthenticated,
    AnyOfRoles(RoleSet),
}

/// Single row of the policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub method: Method,
    pub pattern: PathPattern,
    pub requirement: Requirement,
}

impl AccessRule {
    pub fn new(method: Method, pattern: &str, requirement: Requirement) -> Self {
        Self {
            method,
            pattern: PathPattern::parse(pattern),
            requirement,
        }
    }

    pub fn matches(&self, method: Method, path: &str) -> bool {
        self.method == method && self.pattern.matches(path)
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: no matching role")]
    Forbidden,
}

impl AccessDenied {
    /// Stable machine-readable code for JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Forbidden => "forbidden",
        }
    }
}

/// Decide whether `principal` (if any) satisfies `requirement`.
pub fn enforce(requirement: &Requirement, principal: Option<&Principal>) -> Result<(), AccessDenied> {
    match (requirement, principal) {
        (Requirement::Public, _) => Ok(()),
        (_, None) => Err(AccessDenied::Unauthenticated),
        (Requirement::AnyAuthenticated, Some(_)) => Ok(()),
        (Requirement::AnyOfRoles(required), Some(p)) => {
            if p.roles().intersects(required) {
                Ok(())
            } else {
                Err(AccessDenied::Forbidden)
            }
        }
    }
}

/// Ordered rule table, first match wins.
///
/// Requests that match no rule require an authenticated principal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

static DEFAULT_REQUIREMENT: Requirement = Requirement::AnyAuthenticated;

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, method: Method, pattern: &str, requirement: Requirement) -> Self {
        self.rules.push(AccessRule::new(method, pattern, requirement));
        self
    }

    pub fn permit_all(self, method: Method, pattern: &str) -> Self {
        self.rule(method, pattern, Requirement::Public)
    }

    pub fn has_any_role<const N: usize>(self, method: Method, pattern: &str, roles: [Role; N]) -> Self {
        self.rule(method, pattern, Requirement::AnyOfRoles(RoleSet::from(roles)))
    }

    pub fn requirement_for(&self, method: Method, path: &str) -> &Requirement {
        self.rules
            .iter()
            .find(|r| r.matches(method, path))
            .map(|r| &r.requirement)
            .unwrap_or(&DEFAULT_REQUIREMENT)
    }

    pub fn check(
        &self,
        method: Method,
        path: &str,
        principal: Option<&Principal>,
    ) -> Result<(), AccessDenied> {
        enforce(self.requirement_for(method, path), principal)
    }

    /// Policy for the user resource API.
    pub fn users_api() -> Self {
        Self::new()
            .permit_all(Method::Get, "/health")
            .permit_all(Method::Get, "/api/users")
            .permit_all(Method::Get, "/api/users/page/{page}")
            .has_any_role(Method::Get, "/api/users/{id}", [Role::USER, Role::ADMIN])
            .has_any_role(Method::Post, "/api/users", [Role::ADMIN])
            .has_any_role(Method::Put, "/api/users/{id}", [Role::ADMIN])
            .has_any_role(Method::Delete, "/api/users/{id}", [Role::ADMIN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> Principal {
        Principal::new("bob", [Role::USER])
    }

    fn admin() -> Principal {
        Principal::new("alice", [Role::ADMIN])
    }

    fn outsider() -> Principal {
        Principal::new("eve", [Role::new("ROLE_GUEST")])
    }

    #[test]
    fn pattern_params_match_one_segment() {
        let p = PathPattern::parse("/api/users/{id}");
        assert!(p.matches("/api/users/7"));
        assert!(p.matches("/api/users/7/"));
        assert!(!p.matches("/api/users"));
        assert!(!p.matches("/api/users/7/roles"));
        assert!(!p.matches("/api/users//"));
        assert!(!p.matches("/api/people/7"));
    }

    #[test]
    fn literal_patterns_match_exactly() {
        let p = PathPattern::parse("/api/users");
        assert!(p.matches("/api/users"));
        assert!(p.matches("/api/users/"));
        assert!(!p.matches("/api"));
        assert!(!p.matches("/api//users"));

        let root = PathPattern::parse("/");
        assert!(root.matches("/"));
        assert!(!root.matches("/x"));
    }

    #[test]
    fn first_match_wins() {
        let policy = AccessPolicy::new()
            .permit_all(Method::Get, "/api/users/page/{page}")
            .has_any_role(Method::Get, "/api/users/{x}/{y}", [Role::ADMIN]);

        assert_eq!(
            policy.requirement_for(Method::Get, "/api/users/page/2"),
            &Requirement::Public
        );
        assert!(matches!(
            policy.requirement_for(Method::Get, "/api/users/a/b"),
            Requirement::AnyOfRoles(_)
        ));
    }

    #[test]
    fn unmatched_routes_require_authentication() {
        let policy = AccessPolicy::users_api();
        assert_eq!(
            policy.requirement_for(Method::Get, "/whoami"),
            &Requirement::AnyAuthenticated
        );
        assert_eq!(
            policy.requirement_for(Method::Patch, "/api/users/1"),
            &Requirement::AnyAuthenticated
        );
    }

    #[test]
    fn enforcement_outcomes() {
        let admins = Requirement::AnyOfRoles(RoleSet::from([Role::ADMIN]));

        assert_eq!(enforce(&Requirement::Public, None), Ok(()));
        assert_eq!(enforce(&Requirement::AnyAuthenticated, None), Err(AccessDenied::Unauthenticated));
        assert_eq!(enforce(&Requirement::AnyAuthenticated, Some(&outsider())), Ok(()));
        assert_eq!(enforce(&admins, None), Err(AccessDenied::Unauthenticated));
        assert_eq!(enforce(&admins, Some(&user())), Err(AccessDenied::Forbidden));
        assert_eq!(enforce(&admins, Some(&admin())), Ok(()));
    }

    #[test]
    fn users_api_matrix() {
        let policy = AccessPolicy::users_api();
        let (user, admin, outsider) = (user(), admin(), outsider());
        let cases = [
            (Method::Get, "/api/users/1", &outsider, &user),
            (Method::Post, "/api/users", &user, &admin),
            (Method::Put, "/api/users/1", &user, &admin),
            (Method::Delete, "/api/users/1", &user, &admin),
        ];

        for (method, path, wrong, right) in cases {
            assert_eq!(policy.check(method, path, None), Err(AccessDenied::Unauthenticated), "{method} {path}");
            assert_eq!(policy.check(method, path, Some(wrong)), Err(AccessDenied::Forbidden), "{method} {path}");
            assert_eq!(policy.check(method, path, Some(right)), Ok(()), "{method} {path}");
        }

        for path in ["/api/users", "/api/users/page/0", "/health"] {
            assert_eq!(policy.check(Method::Get, path, None), Ok(()));
            assert_eq!(policy.check(Method::Get, path, Some(&outsider)), Ok(()));
        }
    }

    #[test]
    fn admin_can_read_single_user() {
        let policy = AccessPolicy::users_api();
        assert_eq!(policy.check(Method::Get, "/api/users/9", Some(&admin())), Ok(()));
    }

    #[test]
    fn method_round_trips_through_str() {
        for m in [Method::Get, Method::Post, Method::Put, Method::Patch, Method::Delete] {
            assert_eq!(m.as_str().parse::<Method>().unwrap(), m);
        }
        assert!("TRACE".parse::<Method>().is_err());
    }
}
