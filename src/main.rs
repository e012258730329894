use anyhow::Context;
use screener_proxy::{
    build_router, catalog::ScreenerCatalog, config::AppConfig, utils::init_logger, AppState,
};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = AppConfig::load().context("failed to load configuration")?;

    init_logger();

    // Set a global span with node_name for all subsequent logs
    let _span = tracing::info_span!("node", name = %app_config.node_name).entered();

    tracing::info!("Starting screener-proxy");
    tracing::info!(
        environment = %app_config.environment,
        port = app_config.port,
        endpoint = %app_config.screener_endpoint,
        timezone = %app_config.display_timezone,
        "Loaded configuration"
    );

    let catalog = ScreenerCatalog::load(app_config.screener_catalog_file.as_deref())
        .context("failed to load screener catalog")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    let app = build_router(AppState::new(catalog, app_config));

    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
