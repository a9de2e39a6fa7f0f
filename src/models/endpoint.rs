//! Endpoint descriptors supplied by the catalog.

use super::request::HttpMethod;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches single-brace `{param}` placeholders in a path template.
///
/// Double-brace `{{expr}}` placeholders never appear in catalog paths, but the
/// negative classes keep them from being read as parameters.
pub(crate) static PATH_PARAM_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{([^{}/]+)\}").expect("Failed to compile path parameter regex")
});

/// One operation of the target API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    pub method: HttpMethod,

    /// Path template, e.g. `/projects/{project_gid}/tasks`.
    pub path: String,

    #[serde(default)]
    pub summary: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub operation_id: String,

    #[serde(default)]
    pub security: Vec<String>,
}

impl EndpointDescriptor {
    /// Creates a descriptor with empty documentation fields.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            summary: String::new(),
            description: String::new(),
            tags: Vec::new(),
            operation_id: String::new(),
            security: Vec::new(),
        }
    }

    /// Sets the summary line.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Names of the `{param}` placeholders in the path, in template order.
    pub fn path_parameters(&self) -> Vec<String> {
        path_parameter_names(&self.path)
    }

    /// Whether this descriptor addresses the given method and path.
    pub fn matches(&self, method: HttpMethod, path: &str) -> bool {
        self.method == method && self.path == path
    }
}

/// Extracts `{param}` names from a path template, without duplicates.
pub fn path_parameter_names(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for cap in PATH_PARAM_REGEX.captures_iter(template) {
        let name = cap[1].trim().to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
