use userapp_auth::{Principal, RoleSet};

/// Principal context for a request (authenticated identity + roles).
///
/// Inserted into request extensions by the validation stage when a valid
/// bearer token is presented; absent for anonymous requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn username(&self) -> &str {
        self.principal.username()
    }

    pub fn roles(&self) -> &RoleSet {
        self.principal.roles()
    }
}
