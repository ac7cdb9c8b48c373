// @zen-component: RELAY-AccessMiddleware
//
//! Access middleware: origin/referer gate, CORS headers and preflight.

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, AsHeaderName, ORIGIN,
            REFERER,
        },
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::AppState;
use crate::error::AppError;

/// Non-standard spelling some clients send instead of `Referer`.
const REFERRER: &str = "referrer";

/// Axum middleware: evaluates the allow-list, rejects unauthorized callers
/// with 403, answers `OPTIONS` preflights, and sets CORS headers on every
/// response that gets past the gate.
pub async fn enforce_access(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let origin = header_str(headers, ORIGIN);
    let referer = header_str(headers, REFERER)
        .filter(|r| !r.is_empty())
        .or_else(|| header_str(headers, REFERRER))
        .unwrap_or("");
    let origin = origin.unwrap_or("");

    let decision = state.config.allow_list.evaluate(origin, referer);
    let Some(cors_origin) = decision.cors_origin() else {
        warn!(origin, referer, "blocked request from unauthorized domain");
        return Err(AppError::Forbidden);
    };

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors(response.headers_mut(), cors_origin);
        return Ok(response);
    }

    let mut response = next.run(request).await;
    apply_cors(response.headers_mut(), cors_origin);
    Ok(response)
}

fn header_str<K: AsHeaderName>(headers: &HeaderMap, name: K) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn apply_cors(headers: &mut HeaderMap, cors_origin: &str) {
    match HeaderValue::from_str(cors_origin) {
        Ok(value) => {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        Err(_) => warn!(cors_origin, "CORS origin is not a valid header value"),
    }
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}
