//! # chatrelay_api
//!
//! HTTP API library for chatrelay.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{any, get};
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::handlers::{chat, health};

/// Path of the relay endpoint.
pub const CHAT_PATH: &str = "/api/chat";

/// Path of the liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay configuration, immutable for the process lifetime.
    pub config: Arc<RelayConfig>,
    /// Pooled HTTP client for upstream calls.
    pub client: reqwest::Client,
}

impl AppState {
    /// Build state from configuration, creating the upstream HTTP client.
    pub fn new(config: RelayConfig) -> reqwest::Result<Self> {
        let client = config.http_client()?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // The access gate runs before method dispatch so that preflights and
    // wrong methods from unauthorized origins still get 403.
    let relay = Router::new()
        .route(CHAT_PATH, any(chat::chat_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::access::enforce_access,
        ));

    Router::new()
        .route(HEALTH_PATH, get(health::health_handler))
        .merge(relay)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
