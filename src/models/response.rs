//! HTTP response data models.
//!
//! This module defines the raw response returned by a transport and the
//! helpers used to read the API's JSON envelope out of it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Represents an HTTP response received from the target API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponse {
    /// HTTP status code (e.g., 200, 404, 500).
    pub status_code: u16,

    /// HTTP status text (e.g., "OK", "Not Found").
    pub status_text: String,

    /// Response headers as key-value pairs.
    pub headers: HashMap<String, String>,

    /// Response body as raw bytes.
    pub body: Vec<u8>,

    /// Total request duration from send to the last body byte.
    pub duration: Duration,
}

impl HttpResponse {
    /// Creates a new HttpResponse with the given status code and text.
    pub fn new(status_code: u16, status_text: String) -> Self {
        Self {
            status_code,
            status_text,
            headers: HashMap::new(),
            body: Vec::new(),
            duration: Duration::from_secs(0),
        }
    }

    /// Creates a response whose body is the serialized JSON value.
    pub fn json(status_code: u16, body: &Value) -> Self {
        let mut response = Self::new(status_code, String::new());
        response.add_header("Content-Type".to_string(), "application/json".to_string());
        response.set_body(body.to_string().into_bytes());
        response
    }

    /// Checks if the response status indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Gets the Content-Type header value if present.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.as_str())
    }

    /// Attempts to parse the response body as UTF-8 text.
    pub fn body_as_string(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.clone())
    }

    /// Decodes the body as JSON.
    ///
    /// An empty body (e.g. `204 No Content`) decodes to `Value::Null`.
    pub fn body_json(&self) -> Result<Value, serde_json::Error> {
        if self.body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body)
    }

    /// Builds a human-readable message for a failed response.
    ///
    /// Uses the `errors[].message` entries of the API envelope when present,
    /// joined with `"; "`, and falls back to `HTTP <status>`.
    pub fn error_message(&self) -> String {
        let messages: Vec<String> = self
            .body_json()
            .ok()
            .as_ref()
            .and_then(|body| body.get("errors"))
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if messages.is_empty() {
            if self.status_text.is_empty() {
                format!("HTTP {}", self.status_code)
            } else {
                format!("HTTP {} {}", self.status_code, self.status_text)
            }
        } else {
            messages.join("; ")
        }
    }

    /// Adds a header to the response.
    pub fn add_header(&mut self, name: String, value: String) {
        self.headers.insert(name, value);
    }

    /// Sets the response body.
    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }
}
