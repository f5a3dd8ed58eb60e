//! Process configuration, read once at startup from the environment.

use std::net::SocketAddr;

use anyhow::{Context, bail};

use userapp_auth::PasswordEncoder;
use userapp_auth::credentials::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_LOGIN_PATH: &str = "/login";
const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:4200";

/// Optional administrator created at startup so the API is usable on an
/// empty directory.
#[derive(Clone)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub login_path: String,
    pub bcrypt_cost: u32,
    pub admin_seed: Option<AdminSeed>,
    /// Browser origins allowed by CORS. Empty disables the CORS layer.
    pub cors_origins: Vec<String>,
}

impl core::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("login_path", &self.login_path)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("admin_seed", &self.admin_seed)
            .field("cors_origins", &self.cors_origins)
            .finish()
    }
}

impl ApiConfig {
    /// Defaults for everything except the signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: jwt_secret.into(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            bcrypt_cost: PasswordEncoder::DEFAULT_COST,
            admin_seed: None,
            cors_origins: parse_origins(DEFAULT_CORS_ORIGINS),
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:8080")?;

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                DEV_JWT_SECRET.to_string()
            }
        };

        let login_path = lookup("LOGIN_PATH").unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_string());
        if !login_path.starts_with('/') {
            bail!("LOGIN_PATH must start with '/', got {login_path:?}");
        }

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("BCRYPT_COST must be an integer, got {raw:?}"))?,
            None => PasswordEncoder::DEFAULT_COST,
        };
        if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&bcrypt_cost) {
            bail!("BCRYPT_COST must be within {MIN_BCRYPT_COST}..={MAX_BCRYPT_COST}, got {bcrypt_cost}");
        }

        let admin_seed = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminSeed { username, password }),
            (None, None) => None,
            _ => bail!("ADMIN_USERNAME and ADMIN_PASSWORD must be set together"),
        };

        let cors_origins = parse_origins(
            &lookup("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string()),
        );
        if cors_origins.iter().any(|o| o == "*") {
            bail!("CORS_ALLOWED_ORIGINS must list explicit origins; '*' cannot be combined with credentials");
        }

        Ok(Self {
            bind_addr,
            jwt_secret,
            login_path,
            bcrypt_cost,
            admin_seed,
            cors_origins,
        })
    }
}

/// Comma-separated origin list; blank entries are dropped.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
