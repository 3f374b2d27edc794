use anyhow::Context;

use stylehub_api::app::{AppServices, build_app};
use stylehub_infra::{AppConfig, bootstrap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("invalid configuration")?;
    stylehub_observability::init(config.log_format);
    tracing::info!(config = ?config, "starting stylehub api");

    let store = bootstrap::connect_store(&config)
        .await
        .context("failed to initialise store")?;

    if let Some(admin) = &config.admin {
        bootstrap::seed_admin(store.as_ref(), admin)
            .await
            .context("failed to seed admin account")?;
    }

    let app = build_app(AppServices::new(&config, store));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
