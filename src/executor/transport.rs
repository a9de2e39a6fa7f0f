//! The HTTP seam.
//!
//! The executor only talks to the network through [`HttpTransport`], so the
//! sequence engine can be driven by a scripted transport in tests.

use super::error::RequestError;
use crate::models::{HttpRequest, HttpResponse};
use async_trait::async_trait;

/// Sends one fully-built request and returns the raw response.
///
/// Implementations report any status code as `Ok`; only failures to obtain a
/// response at all are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError>;
}
