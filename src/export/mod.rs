//! Sequence export and import.
//!
//! Exported files refer to earlier steps as `step<N>`, where `N` is the
//! entry's index in the file. Import assigns fresh runtime ids and rewrites
//! those references back. Entries that fail to parse are skipped and counted;
//! entries whose endpoint is not in the catalog become placeholder steps.

use crate::models::step::{ParameterSet, QueryValue, VariableMapping};
use crate::models::{EndpointDescriptor, HttpMethod, IterationConfig, SequenceStep};
use crate::session::Session;
use crate::transform::{FieldMapping, UnifiedColumn};
use crate::variables::ReferenceRewriter;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Format version written into exported files.
pub const SEQUENCE_FILE_VERSION: &str = "1.0";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Sequence file is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Sequence file must be a JSON object with a 'sequence' array")]
    MissingSequence,

    #[error("Cannot import while steps are running")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceFile {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub sequence: Vec<SequenceEntry>,
    #[serde(default)]
    pub data_transformations: DataTransformations,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub base_url: String,
}

impl SequenceFile {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One step as stored in a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceEntry {
    pub method: HttpMethod,
    pub path: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: ParameterSet,
    #[serde(default)]
    pub variable_mappings: VariableMapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<IterationConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataTransformations {
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub unified_columns: Vec<UnifiedColumn>,
}

/// Outcome counts of an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Entries turned into steps, placeholders included.
    pub loaded: usize,
    /// Malformed entries that were dropped.
    pub skipped: usize,
    /// Loaded entries whose endpoint is not in the catalog.
    pub placeholders: usize,
}

/// Builds the file representation of the session's sequence.
pub fn export_sequence(session: &Session, name: &str, description: &str) -> SequenceFile {
    let rewriter = ReferenceRewriter::new(session.step_ids());

    let sequence = session
        .steps()
        .iter()
        .enumerate()
        .map(|(position, step)| {
            let rewrite = |text: &str| rewriter.to_stable(text, position);
            let rewrite_literal = |text: &str| rewriter.placeholders_to_stable(text, position);
            SequenceEntry {
                method: step.endpoint.method,
                path: step.endpoint.path.clone(),
                summary: step.endpoint.summary.clone(),
                description: step.endpoint.description.clone(),
                tags: step.endpoint.tags.clone(),
                parameters: rewrite_parameters(&step.parameters, &rewrite_literal),
                variable_mappings: step
                    .variable_mappings
                    .iter()
                    .map(|(name, expr)| (name.clone(), rewrite(expr)))
                    .collect(),
                iteration: exported_iteration(&step.iteration).map(|mut config| {
                    config.source_expression = rewrite(&config.source_expression);
                    config
                }),
            }
        })
        .collect();

    SequenceFile {
        version: SEQUENCE_FILE_VERSION.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        sequence,
        data_transformations: DataTransformations {
            field_mappings: session.field_mappings().to_vec(),
            unified_columns: session.unified_columns().to_vec(),
        },
        timestamp: Utc::now(),
        base_url: session.base_url().to_string(),
    }
}

/// Iteration settings worth writing out: enabled, or configured but paused.
fn exported_iteration(config: &IterationConfig) -> Option<IterationConfig> {
    (config.enabled || !config.source_expression.trim().is_empty()).then(|| config.clone())
}

fn rewrite_parameters<F>(parameters: &ParameterSet, rewrite: &F) -> ParameterSet
where
    F: Fn(&str) -> String,
{
    ParameterSet {
        path: parameters
            .path
            .iter()
            .map(|(name, value)| (name.clone(), rewrite(value)))
            .collect(),
        query: parameters
            .query
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    QueryValue::Text(text) => QueryValue::Text(rewrite(text)),
                    flag => flag.clone(),
                };
                (name.clone(), value)
            })
            .collect(),
        body: parameters.body.as_deref().map(rewrite),
    }
}

/// Replaces the session's sequence with the one in `text`.
pub fn import_sequence(session: &mut Session, text: &str) -> Result<ImportReport, ImportError> {
    let document: Value = serde_json::from_str(text)?;
    let entries = document
        .get("sequence")
        .and_then(Value::as_array)
        .ok_or(ImportError::MissingSequence)?;

    let transformations = document
        .get("dataTransformations")
        .cloned()
        .map(serde_json::from_value::<DataTransformations>)
        .transpose()
        .unwrap_or_else(|e| {
            warn!("Ignoring malformed dataTransformations: {}", e);
            None
        })
        .unwrap_or_default();

    session.reset_for_import(transformations.field_mappings, transformations.unified_columns);
    if let Some(base_url) = document.get("baseUrl").and_then(Value::as_str) {
        if !base_url.trim().is_empty() {
            session.set_base_url(base_url);
        }
    }

    let mut report = ImportReport::default();
    let mut rewriter = ReferenceRewriter::default();

    for (index, raw) in entries.iter().enumerate() {
        let entry = match serde_json::from_value::<SequenceEntry>(raw.clone()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping sequence entry {}: {}", index, e);
                report.skipped += 1;
                rewriter.push(None);
                continue;
            }
        };

        let step = build_step(session, entry, index, &rewriter);
        if step.is_imported_placeholder {
            report.placeholders += 1;
        }
        rewriter.push(Some(step.id.clone()));
        session.push_step(step);
        report.loaded += 1;
    }

    info!(
        "Imported sequence: {} loaded, {} skipped, {} placeholder(s)",
        report.loaded, report.skipped, report.placeholders
    );
    Ok(report)
}

fn build_step(
    session: &Session,
    entry: SequenceEntry,
    index: usize,
    rewriter: &ReferenceRewriter,
) -> SequenceStep {
    let known = session.catalog().find(entry.method, &entry.path).cloned();
    let is_placeholder = known.is_none();
    let endpoint = known.unwrap_or_else(|| {
        let mut endpoint = EndpointDescriptor::new(entry.method, entry.path.clone())
            .with_summary(entry.summary.clone());
        endpoint.description = entry.description.clone();
        endpoint.tags = entry.tags.clone();
        endpoint
    });

    let rewrite = |text: &str| rewriter.to_runtime(text, index);
    let rewrite_literal = |text: &str| rewriter.placeholders_to_runtime(text, index);
    let mut step = SequenceStep::new(Uuid::new_v4().to_string(), endpoint);
    step.is_imported_placeholder = is_placeholder;

    let parameters = rewrite_parameters(&entry.parameters, &rewrite_literal);
    step.parameters.path.extend(parameters.path);
    step.parameters.query = parameters.query;
    step.parameters.body = parameters.body;

    for (name, expression) in &entry.variable_mappings {
        step.map_variable(name.clone(), rewrite(expression));
    }

    if let Some(mut iteration) = entry.iteration {
        iteration.source_expression = rewrite(&iteration.source_expression);
        step.iteration = iteration;
    }

    step
}
