//! Request building from step parameters.
//!
//! The builder turns a step's literal parameters, its variable mapping table
//! and any inline `{{expr}}` placeholders into a [`RequestDescriptor`]. Both
//! placeholder surfaces go through [`resolve_or_literal`], with the mapping
//! table taking precedence over inline placeholders over plain literals.
//!
//! Every request also receives the call-shaping defaults owned by this
//! layer: a pagination `limit` unless the caller set one, and the
//! `opt_pretty` display hint.

use crate::error::StepError;
use crate::models::endpoint::PATH_PARAM_REGEX;
use crate::models::{QueryValue, RequestDescriptor, SequenceStep};
use crate::variables::{
    contains_placeholder, sole_placeholder, substitute_placeholders, VariableResolver,
};
use regex::Captures;
use serde_json::Value;
use std::collections::BTreeSet;
use url::Url;

/// Page size appended when the caller did not choose one.
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Query parameter carrying the page size.
pub const PAGINATION_PARAM: &str = "limit";

/// Query parameter asking the API for indented output.
pub const PRETTY_PARAM: &str = "opt_pretty";

/// Builds concrete requests for steps against one API base URL.
#[derive(Debug, Clone)]
pub struct ParameterBuilder {
    base_url: String,
}

impl ParameterBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the request for `step` using `resolver` for all placeholders.
    ///
    /// # Errors
    ///
    /// - [`StepError::MissingRequiredParameter`] when a path parameter is empty
    ///   after substitution
    /// - [`StepError::InvalidBodyJson`] when the body is not valid JSON
    /// - [`StepError::UnknownStepReference`] / [`StepError::InvalidExpression`]
    ///   from resolution
    /// - [`StepError::InvalidUrl`] when the base URL is unusable
    pub fn build(
        &self,
        step: &SequenceStep,
        resolver: &VariableResolver<'_>,
    ) -> Result<RequestDescriptor, StepError> {
        let segments = self.build_path(step, resolver)?;
        let query = build_query(step, resolver)?;
        let body = build_body(step.parameters.body.as_deref(), resolver)?;

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StepError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StepError::InvalidUrl(self.base_url.clone()))?;
            path.pop_if_empty();
            path.extend(&segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &query {
                pairs.append_pair(name, value);
            }
        }

        Ok(RequestDescriptor {
            method: step.endpoint.method,
            path: format!("/{}", segments.join("/")),
            url: url.to_string(),
            query,
            body,
        })
    }

    /// Substitutes every `{param}` of the endpoint's path template and
    /// returns the unencoded path segments.
    fn build_path(
        &self,
        step: &SequenceStep,
        resolver: &VariableResolver<'_>,
    ) -> Result<Vec<String>, StepError> {
        let mut values = Vec::new();
        for name in step.endpoint.path_parameters() {
            let literal = step
                .parameters
                .path
                .get(&name)
                .map(String::as_str)
                .unwrap_or("");
            let value = resolve_or_literal(step.mapping_for(&name), literal, resolver)?
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| StepError::MissingRequiredParameter(name.clone()))?;
            values.push((name, value));
        }

        let segments = step
            .endpoint
            .path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| {
                PATH_PARAM_REGEX
                    .replace_all(segment, |cap: &Captures| {
                        let name = cap[1].trim();
                        values
                            .iter()
                            .find(|(n, _)| n == name)
                            .map(|(_, v)| v.clone())
                            .unwrap_or_default()
                    })
                    .into_owned()
            })
            .collect();

        Ok(segments)
    }
}

/// Resolves one parameter value.
///
/// A mapping expression wins; otherwise the literal is used, with inline
/// `{{expr}}` placeholders substituted. Returns `None` when the value
/// resolves to `null` or is empty.
pub fn resolve_or_literal(
    mapping: Option<&str>,
    literal: &str,
    resolver: &VariableResolver<'_>,
) -> Result<Option<String>, StepError> {
    let value = match mapping {
        Some(expression) => resolver.resolve_to_string(expression)?,
        None if contains_placeholder(literal) => Some(substitute_placeholders(literal, resolver)?),
        None => Some(literal.to_string()),
    };
    Ok(value.filter(|v| !v.is_empty()))
}

fn build_query(
    step: &SequenceStep,
    resolver: &VariableResolver<'_>,
) -> Result<Vec<(String, String)>, StepError> {
    let path_params = step.endpoint.path_parameters();
    let names: BTreeSet<&String> = step
        .parameters
        .query
        .keys()
        .chain(
            step.variable_mappings
                .keys()
                .filter(|name| !path_params.contains(name)),
        )
        .collect();

    let mut query = Vec::new();
    for name in names {
        let value = match (step.mapping_for(name), step.parameters.query.get(name)) {
            (Some(expression), _) => resolve_or_literal(Some(expression), "", resolver)?,
            (None, Some(QueryValue::Flag(true))) => Some("true".to_string()),
            (None, Some(QueryValue::Flag(false))) | (None, None) => None,
            (None, Some(QueryValue::Text(text))) => resolve_or_literal(None, text, resolver)?,
        };
        if let Some(value) = value {
            query.push((name.clone(), value));
        }
    }

    if !query.iter().any(|(name, _)| name == PAGINATION_PARAM) {
        query.push((PAGINATION_PARAM.to_string(), DEFAULT_PAGE_LIMIT.to_string()));
    }
    if !query.iter().any(|(name, _)| name == PRETTY_PARAM) {
        query.push((PRETTY_PARAM.to_string(), "true".to_string()));
    }

    Ok(query)
}

/// Validates the body and substitutes placeholders in it.
///
/// When the raw text is already valid JSON, placeholders are substituted
/// inside string values of the parsed document: a string that is exactly one
/// placeholder takes the resolved JSON value, other strings get textual
/// substitution. Text that only becomes JSON after substitution (unquoted
/// placeholders) falls back to raw-text substitution and is validated after.
fn build_body(
    raw: Option<&str>,
    resolver: &VariableResolver<'_>,
) -> Result<Option<String>, StepError> {
    let Some(raw) = raw.filter(|b| !b.trim().is_empty()) else {
        return Ok(None);
    };

    if !contains_placeholder(raw) {
        serde_json::from_str::<Value>(raw).map_err(|e| StepError::InvalidBodyJson(e.to_string()))?;
        return Ok(Some(raw.to_string()));
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(document) => {
            let substituted = substitute_in_value(document, resolver)?;
            Ok(Some(substituted.to_string()))
        }
        Err(_) => {
            let text = substitute_placeholders(raw, resolver)?;
            serde_json::from_str::<Value>(&text)
                .map_err(|e| StepError::InvalidBodyJson(e.to_string()))?;
            Ok(Some(text))
        }
    }
}

fn substitute_in_value(value: Value, resolver: &VariableResolver<'_>) -> Result<Value, StepError> {
    Ok(match value {
        Value::String(text) => {
            if let Some(expression) = sole_placeholder(&text) {
                resolver.resolve(expression)?
            } else if contains_placeholder(&text) {
                Value::String(substitute_placeholders(&text, resolver)?)
            } else {
                Value::String(text)
            }
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| substitute_in_value(item, resolver))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key, substitute_in_value(item, resolver)?);
            }
            Value::Object(out)
        }
        other => other,
    })
}
