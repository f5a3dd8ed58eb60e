use std::sync::Arc;

use anyhow::Context;

use userapp_api::app::{build_app, services::AppServices};
use userapp_api::config::ApiConfig;
use userapp_auth::PasswordEncoder;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    userapp_observability::init();

    let config = ApiConfig::from_env()?;
    tracing::info!(?config, "configuration loaded");

    let encoder = PasswordEncoder::new(config.bcrypt_cost)?;
    let services = Arc::new(AppServices::new(encoder));

    if let Some(seed) = &config.admin_seed {
        services
            .seed_admin(seed)
            .await
            .context("failed to seed admin user")?;
        tracing::info!(username = %seed.username, "admin user seeded");
    }

    let app = build_app(&config, services)?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
