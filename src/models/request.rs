//! HTTP request data models.
//!
//! This module defines the request side of a call: the HTTP method, the
//! descriptor produced by the parameter builder, and the wire-level request
//! handed to a transport.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP request method.
///
/// Covers the methods an API catalog can declare for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// HTTP GET method - retrieve a resource
    GET,
    /// HTTP POST method - submit data to create a resource
    POST,
    /// HTTP PUT method - replace a resource
    PUT,
    /// HTTP PATCH method - partially modify a resource
    PATCH,
    /// HTTP DELETE method - remove a resource
    DELETE,
    /// HTTP HEAD method - retrieve headers only
    HEAD,
    /// HTTP OPTIONS method - describe communication options
    OPTIONS,
}

impl HttpMethod {
    /// Returns the string representation of the HTTP method.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }

    /// Parses a string into an HttpMethod.
    ///
    /// Matching is case-insensitive. Returns `None` for anything that is not
    /// one of the supported methods.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "PATCH" => Some(HttpMethod::PATCH),
            "DELETE" => Some(HttpMethod::DELETE),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    /// Whether requests with this method conventionally carry a body.
    pub fn allows_body(&self) -> bool {
        matches!(self, HttpMethod::POST | HttpMethod::PUT | HttpMethod::PATCH)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fully resolved call produced by the parameter builder.
///
/// All placeholders have been substituted; the URL already contains the
/// encoded query string. Headers are added later by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// HTTP method taken from the endpoint.
    pub method: HttpMethod,

    /// Path after parameter substitution, e.g. `/projects/123/tasks`.
    pub path: String,

    /// Absolute URL including the query string.
    pub url: String,

    /// Query parameters in the order they were appended to the URL.
    pub query: Vec<(String, String)>,

    /// Validated JSON body text, if any.
    pub body: Option<String>,
}

impl RequestDescriptor {
    /// Looks up a query parameter value by name.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Converts the descriptor into a wire request with the given headers.
    ///
    /// `Content-Type: application/json` is added whenever a body is present.
    pub fn into_http_request(self, mut headers: HashMap<String, String>) -> HttpRequest {
        if self.body.is_some() {
            headers.insert("Content-Type".to_string(), "application/json".to_string());
        }

        HttpRequest {
            method: self.method,
            url: self.url,
            headers,
            body: self.body,
        }
    }
}

/// The request as sent over the wire by an [`HttpTransport`](crate::executor::HttpTransport).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRequest {
    /// HTTP method (GET, POST, PUT, DELETE, etc.).
    pub method: HttpMethod,

    /// Absolute target URL.
    pub url: String,

    /// Request headers as key-value pairs.
    pub headers: HashMap<String, String>,

    /// Optional request body.
    pub body: Option<String>,
}

impl HttpRequest {
    /// Creates a new HttpRequest without headers or body.
    pub fn new(method: HttpMethod, url: String) -> Self {
        Self {
            method,
            url,
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Adds a header to the request.
    pub fn add_header(&mut self, name: String, value: String) {
        self.headers.insert(name, value);
    }

    /// Checks if the request has a non-empty body.
    pub fn has_body(&self) -> bool {
        self.body.as_ref().map_or(false, |b| !b.is_empty())
    }

    /// Gets a header value, matching the name case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
