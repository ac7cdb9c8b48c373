//! Health endpoint: liveness probe for the process host.

use axum::Json;
use serde::Serialize;

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`: reports that the relay is up. Not subject to the access
/// policy.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: chatrelay_core::version(),
    })
}
