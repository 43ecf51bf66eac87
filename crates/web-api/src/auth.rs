//! Bearer-token authentication for the kill-switch routes.
//!
//! `401` when the `Authorization` header is missing or malformed, `403` when
//! the token is invalid. The invalid-token and missing-config cases share one
//! generic body so callers cannot distinguish them.

use axum::http::{HeaderMap, StatusCode};
use btc_arb_safety::validate_token;
use secrecy::SecretString;

/// Generic failure body. Never names the expected token or why it failed.
pub const FORBIDDEN_BODY: &str = "Forbidden";

/// Validates the `Authorization: Bearer <token>` header.
///
/// # Errors
/// - `401` with no or malformed header.
/// - `403` with an invalid token (or no token configured at all).
pub fn require_bearer(
    headers: &HeaderMap,
    configured: Option<&SecretString>,
) -> Result<(), (StatusCode, &'static str)> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "Missing or invalid Authorization header",
        ))?;

    let token = header.strip_prefix("Bearer ").ok_or((
        StatusCode::UNAUTHORIZED,
        "Missing or invalid Authorization header",
    ))?;

    if !validate_token(token, configured) {
        return Err((StatusCode::FORBIDDEN, FORBIDDEN_BODY));
    }

    Ok(())
}
