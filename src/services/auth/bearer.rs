//! `Authorization: Bearer <token>` の取り出し (I/O なし・検証なし)
use axum::http::{HeaderMap, header};

/// Returns the raw credential when the header has the form `Bearer <token>`.
///
/// The scheme is matched case-insensitively. Anything else (missing header,
/// non-ASCII value, other scheme, empty token, or any whitespace around or
/// inside the token) is absent.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }

    Some(token)
}
