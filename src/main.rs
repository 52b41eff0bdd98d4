use market_insights_proxy::{
    AppState, SharedProvider, config::AppConfig, create_router, yahoo::YahooClient,
};
use std::{net::SocketAddr, sync::Arc};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let app_config = AppConfig::load()?;

    // Set a global span with node_name for all subsequent logs
    let _span = tracing::info_span!("node", name = %app_config.node_name).entered();

    tracing::info!("Starting market-insights-proxy");
    tracing::info!(
        environment = %app_config.environment,
        port = app_config.port,
        provider = %app_config.provider.base_url,
        "Loaded configuration"
    );

    let provider: SharedProvider = Arc::new(YahooClient::new(&app_config.provider)?);
    tracing::info!("Market data provider initialized");

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    let app = create_router(AppState::new(provider, app_config));

    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
