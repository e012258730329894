pub mod api;
pub mod catalog;
pub mod chartink;
pub mod config;
pub mod data_structures;
pub mod normalizer;
pub mod templates;
pub mod utils;

use crate::api::SharedDispatcher;
use crate::chartink::ScanDispatcher;
use crate::config::{AppConfig, SharedConfig};
use crate::data_structures::SharedCatalog;
use axum::{extract::FromRef, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub catalog: SharedCatalog,
    pub dispatcher: SharedDispatcher,
    pub config: SharedConfig,
}

impl AppState {
    pub fn new(catalog: SharedCatalog, config: AppConfig) -> Self {
        let dispatcher = Arc::new(ScanDispatcher::new(catalog.clone(), &config));
        Self {
            catalog,
            dispatcher,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for SharedCatalog {
    fn from_ref(app_state: &AppState) -> SharedCatalog {
        app_state.catalog.clone()
    }
}

impl FromRef<AppState> for SharedDispatcher {
    fn from_ref(app_state: &AppState) -> SharedDispatcher {
        app_state.dispatcher.clone()
    }
}

impl FromRef<AppState> for SharedConfig {
    fn from_ref(app_state: &AppState) -> SharedConfig {
        app_state.config.clone()
    }
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(api::index_handler).post(api::scan_handler))
        .route("/download", get(api::download_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(app_state)
}
