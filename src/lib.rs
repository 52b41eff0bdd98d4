pub mod api;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod provider;
pub mod utils;
pub mod yahoo;

use crate::config::AppConfig;
use crate::provider::MarketDataProvider;
use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use price_analyzer::Analyzer;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub type SharedProvider = Arc<dyn MarketDataProvider>;
pub type SharedConfig = Arc<AppConfig>;

#[derive(Clone)]
pub struct AppState {
    provider: SharedProvider,
    config: SharedConfig,
    analyzer: Analyzer,
}

impl AppState {
    pub fn new(provider: SharedProvider, config: AppConfig) -> Self {
        Self {
            analyzer: Analyzer::new(config.analysis.clone()),
            provider,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for SharedProvider {
    fn from_ref(app_state: &AppState) -> SharedProvider {
        app_state.provider.clone()
    }
}

impl FromRef<AppState> for SharedConfig {
    fn from_ref(app_state: &AppState) -> SharedConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for Analyzer {
    fn from_ref(app_state: &AppState) -> Analyzer {
        app_state.analyzer.clone()
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/company-info", get(api::company_info_handler))
        .route("/market-data", get(api::market_data_handler))
        .route("/historical-data", post(api::historical_data_handler))
        .route("/analysis", post(api::analysis_handler));

    Router::new()
        .route("/health", get(api::health_handler))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
