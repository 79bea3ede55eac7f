use reqwest::StatusCode;

use crate::application::ports::ProviderError;

/// Maps a non-success provider response onto the shared failure taxonomy.
pub(crate) fn classify_status(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let code = format!("HTTP_{}", status.as_u16());
    let message = format!("{} returned {}: {}", provider, status, truncate(body));

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ProviderError::unavailable(code, message)
    } else {
        ProviderError::rejected(code, message)
    }
}

pub(crate) fn request_failed(provider: &str, error: reqwest::Error) -> ProviderError {
    let code = if error.is_timeout() {
        "TIMEOUT"
    } else {
        "NETWORK_ERROR"
    };
    ProviderError::unavailable(code, format!("{} request failed: {}", provider, error))
}

pub(crate) fn malformed_response(provider: &str, error: impl std::fmt::Display) -> ProviderError {
    ProviderError::rejected(
        "MALFORMED_RESPONSE",
        format!("{} response could not be parsed: {}", provider, error),
    )
}

fn truncate(body: &str) -> &str {
    const LIMIT: usize = 300;
    if body.len() <= LIMIT {
        return body;
    }
    let mut end = LIMIT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

