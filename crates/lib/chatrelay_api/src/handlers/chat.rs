// @zen-component: RELAY-ChatHandler
//
//! Chat handler: validates the message, calls the upstream service and
//! relays its event stream back to the client.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::response::Response;
use chatrelay_core::message::IncomingRequest;
use tracing::{error, info};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::services::relay;
use crate::services::upstream::{self, UpstreamError};

/// `POST /api/chat`: relay one chat message.
///
/// Runs behind [`crate::middleware::access::enforce_access`], which has
/// already answered preflights and set CORS headers.
pub async fn chat_handler(
    State(state): State<AppState>,
    method: Method,
    body: Bytes,
) -> AppResult<Response> {
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let message = IncomingRequest::from_slice(&body)?.validate()?;
    let credentials = state.config.credentials()?;
    let request = message.into_upstream(credentials.domain_name);

    info!(
        user_name = %request.user_name,
        source_name = %request.source_name,
        domain_name = %request.domain_name,
        session_id = %request.session_id,
        "forwarding chat message upstream"
    );

    let response = match upstream::send(
        &state.client,
        &state.config.upstream_url,
        credentials,
        &request,
    )
    .await
    {
        Ok(response) => response,
        Err(UpstreamError::Rejected(status)) => return Err(AppError::UpstreamRejected(status)),
        Err(e @ UpstreamError::Transport(_)) => {
            error!(error = %e, "relay failed before streaming");
            return Ok(relay::unavailable_response());
        }
    };

    Ok(relay::stream_response(
        response.bytes_stream(),
        state.config.max_line_len,
    ))
}
