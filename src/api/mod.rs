//! HTTP surface
//!
//! `POST /predict` (text + explanation), `POST /analyze-file` (multipart upload,
//! no explanation) and `GET /health`.

pub mod error;
pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::services::config_store::ServerConfig;
use crate::services::prediction::PredictionService;

pub use error::ApiResult;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(service: Arc<PredictionService>, server: &ServerConfig) -> Self {
        Self {
            service,
            request_timeout: Duration::from_secs(server.request_timeout_secs),
        }
    }
}

/// Create the router with all routes
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/predict", post(handlers::predict))
        .route("/analyze-file", post(handlers::analyze_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
