//! HTTP transport error types.
//!
//! These errors cover everything that can go wrong before an HTTP response
//! arrives. A non-2xx response is not a transport error; the executor turns
//! it into [`StepError::ApiError`].

use crate::error::StepError;
use thiserror::Error;

/// Errors that can occur while sending a request.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Connection failures, DNS resolution errors and other network issues.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The request took longer than the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Certificate validation or handshake failure.
    #[error("TLS/SSL error: {0}")]
    TlsError(String),

    /// The HTTP client or the request could not be constructed.
    #[error("Request build error: {0}")]
    BuildError(String),
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        let text = err.to_string();
        if err.is_timeout() {
            RequestError::Timeout
        } else if err.is_builder() {
            RequestError::BuildError(text)
        } else if text.contains("certificate") || text.contains("TLS") || text.contains("SSL") {
            RequestError::TlsError(text)
        } else if err.is_connect() {
            RequestError::NetworkError(format!("Connection failed: {}", text))
        } else {
            RequestError::NetworkError(text)
        }
    }
}

impl From<url::ParseError> for RequestError {
    fn from(err: url::ParseError) -> Self {
        RequestError::InvalidUrl(err.to_string())
    }
}

impl From<RequestError> for StepError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::NetworkError(msg) => StepError::NetworkFailure(msg),
            other => StepError::NetworkFailure(other.to_string()),
        }
    }
}
