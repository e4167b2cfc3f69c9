//! Shared API key authentication.
//!
//! The key may arrive as `X-API-Key: <key>` or `Authorization: Bearer <key>`.
//! `X-API-Key` wins when both are present.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::AppState;
use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// The key presented by the caller, trimmed. `None` when absent or blank.
#[must_use]
pub fn presented_key(headers: &HeaderMap) -> Option<&str> {
    let direct = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty());
    if direct.is_some() {
        return direct;
    }

    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(expected: &str, given: &str) -> bool {
    expected.len() == given.len()
        && expected
            .bytes()
            .zip(given.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Route layer rejecting requests without the configured key. A no-op when
/// `server.api_key` is empty.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.server.requires_auth() {
        return next.run(request).await;
    }
    match presented_key(request.headers()) {
        Some(key) if keys_match(&state.server.api_key, key) => next.run(request).await,
        _ => {
            tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
            ApiError::Unauthorized.into_response()
        }
    }
}
