use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = creditshop_infra::AppConfig::load()?;
    creditshop_observability::init(&config.logging.level, config.logging.json);

    let app = creditshop_api::app::build_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
