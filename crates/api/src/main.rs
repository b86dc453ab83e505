use anyhow::Context;

use showcase_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    showcase_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let services = showcase_api::app::services::build_services(&config).await?;
    let app = showcase_api::app::build_app(services, &config.jwt_secret);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
