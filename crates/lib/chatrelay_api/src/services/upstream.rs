//! Upstream client: one POST per chat message, streaming response expected.

use axum::http::StatusCode;
use chatrelay_core::message::UpstreamRequest;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::UpstreamCredentials;

/// Header carrying the upstream API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-success status.
    #[error("upstream returned status {0}")]
    Rejected(StatusCode),

    /// The request could not be sent or the response headers never arrived.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// POST `body` to the upstream and return the response once its headers
/// arrive with a success status. The body is left unread for streaming.
pub async fn send(
    client: &reqwest::Client,
    url: &str,
    credentials: UpstreamCredentials<'_>,
    body: &UpstreamRequest,
) -> Result<reqwest::Response, UpstreamError> {
    let response = client
        .post(url)
        .header(API_KEY_HEADER, credentials.api_key)
        .json(body)
        .send()
        .await?;

    let upstream_status = response.status();
    if !upstream_status.is_success() {
        let status = StatusCode::from_u16(upstream_status.as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error!(
            status = status.as_u16(),
            reason = upstream_status.canonical_reason().unwrap_or(""),
            "upstream rejected chat message"
        );
        return Err(UpstreamError::Rejected(status));
    }

    debug!(status = upstream_status.as_u16(), "upstream accepted chat message");
    Ok(response)
}
