//! Bearer token header formatting (RFC 6750).

use std::collections::HashMap;

/// Header the token is sent in.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Formats a token into a Bearer authentication header value.
///
/// ```
/// use rest_sequencer::auth::bearer::bearer_token;
///
/// assert_eq!(bearer_token("abc123xyz"), "Bearer abc123xyz");
/// ```
pub fn bearer_token(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Extracts the token from a Bearer header value.
///
/// Returns `None` if the value does not start with `"Bearer "` or the token is
/// empty. The scheme name is case-sensitive.
pub fn parse_bearer_token_header(header: &str) -> Option<String> {
    let token = header.trim().strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        return None;
    }

    Some(token.to_string())
}

/// Normalizes user input into a bare token.
///
/// Accepts either the token itself or a pasted `Bearer <token>` header value.
/// Returns `None` for blank input.
pub fn normalize_token(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(parse_bearer_token_header(trimmed).unwrap_or_else(|| trimmed.to_string()))
}

/// Inserts the `Authorization` header, replacing any header of the same name
/// regardless of case.
pub fn apply_bearer(headers: &mut HashMap<String, String>, token: &str) {
    headers.retain(|name, _| !name.eq_ignore_ascii_case(AUTHORIZATION_HEADER));
    headers.insert(AUTHORIZATION_HEADER.to_string(), bearer_token(token));
}

/// Shortened form for display: first four characters, then an ellipsis.
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    if token.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}…", visible)
    }
}
