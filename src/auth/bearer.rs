//! Bearer credential parsing for the `Authorization` header.

use axum::http::{HeaderMap, header};

/// Scheme prefix required on the `Authorization` header. Matched case-sensitively.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Extract the bearer token from the `Authorization` header.
///
/// Returns `None` when the header is absent, not valid text, or not of the
/// form `Bearer <token>`. The token is the first space-separated segment after
/// the prefix and may be empty; token verification rejects it in that case.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let rest = value.strip_prefix(BEARER_PREFIX)?;
    rest.split(' ').next()
}
