//! Endpoint catalog.
//!
//! An ordered list of [`EndpointDescriptor`]s with lookup by method and path.
//! Catalogs come from a JSON list of descriptors or, best effort, from an
//! OpenAPI document's `paths` object.

use crate::models::{EndpointDescriptor, HttpMethod};
use log::debug;
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Catalog document has no endpoint list and no 'paths' object")]
    UnrecognizedFormat,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointCatalog {
    endpoints: Vec<EndpointDescriptor>,
}

impl EndpointCatalog {
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Self {
        Self { endpoints }
    }

    pub fn endpoints(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn push(&mut self, endpoint: EndpointDescriptor) {
        self.endpoints.push(endpoint);
    }

    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&EndpointDescriptor> {
        self.endpoints.iter().find(|e| e.matches(method, path))
    }

    /// Endpoints carrying `tag`, in catalog order.
    pub fn by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a EndpointDescriptor> + 'a {
        self.endpoints
            .iter()
            .filter(move |e| e.tags.iter().any(|t| t == tag))
    }

    /// Parses either a JSON array of descriptors or an OpenAPI document.
    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        let document: Value = serde_json::from_str(text)?;
        if document.is_array() {
            return Ok(Self::new(serde_json::from_value(document)?));
        }
        Self::from_openapi(&document)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Reads operations out of an OpenAPI `paths` object.
    ///
    /// Unknown methods and malformed operations are skipped. Security
    /// requirements are reduced to their scheme names.
    pub fn from_openapi(document: &Value) -> Result<Self, CatalogError> {
        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or(CatalogError::UnrecognizedFormat)?;

        let mut catalog = Self::default();
        for (path, operations) in paths {
            let Some(operations) = operations.as_object() else {
                continue;
            };
            for (method, operation) in operations {
                let Some(method) = HttpMethod::from_str(method) else {
                    continue;
                };
                let text = |key: &str| {
                    operation
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };

                let mut endpoint = EndpointDescriptor::new(method, path.clone());
                endpoint.summary = text("summary");
                endpoint.description = text("description");
                endpoint.operation_id = text("operationId");
                endpoint.tags = string_list(operation.get("tags"));
                endpoint.security = operation
                    .get("security")
                    .and_then(Value::as_array)
                    .map(|reqs| {
                        reqs.iter()
                            .filter_map(Value::as_object)
                            .flat_map(|req| req.keys().cloned())
                            .collect()
                    })
                    .unwrap_or_default();
                catalog.push(endpoint);
            }
        }

        debug!("Loaded {} endpoint(s) from OpenAPI document", catalog.len());
        Ok(catalog)
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
