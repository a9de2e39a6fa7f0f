//! Post-hoc reshaping of the final step's records.
//!
//! Records are flattened to dotted keys, then projected through field
//! mappings (renames) and unified columns (`{field}` templates). Missing
//! fields render as empty strings.

pub mod table;

pub use table::TransformedTable;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Nesting depth kept when flattening; deeper objects become [`OBJECT_MARKER`].
pub const MAX_FLATTEN_DEPTH: usize = 3;

pub const OBJECT_MARKER: &str = "[Object]";

static TEMPLATE_FIELD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^{}]+)\}").expect("Failed to compile template field regex"));

/// Copies `source_field` of a flattened record into `target_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
}

impl FieldMapping {
    pub fn new(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
        }
    }
}

/// An output column rendered from a template such as `"{name} (#{gid})"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedColumn {
    pub name: String,
    pub format_template: String,
}

impl UnifiedColumn {
    pub fn new(name: impl Into<String>, format_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format_template: format_template.into(),
        }
    }

    /// Fields referenced by the template, in order of first appearance.
    pub fn source_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for cap in TEMPLATE_FIELD_REGEX.captures_iter(&self.format_template) {
            let field = cap[1].trim().to_string();
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }

    /// Renders the template against a flattened record.
    pub fn render(&self, record: &Map<String, Value>) -> String {
        TEMPLATE_FIELD_REGEX
            .replace_all(&self.format_template, |cap: &Captures| {
                cell_text(record.get(cap[1].trim()))
            })
            .into_owned()
    }
}

/// Flattens a record into dotted keys.
///
/// Nested objects are expanded up to [`MAX_FLATTEN_DEPTH`] key levels; an
/// object found at the last level becomes `"[Object]"` and any array becomes
/// `"[Array(n)]"`. A non-object record is kept under the key `value`.
pub fn flatten_record(record: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    match record {
        Value::Object(fields) => flatten_into(&mut out, fields, "", 1),
        other => {
            out.insert("value".to_string(), flat_leaf(other));
        }
    }
    out
}

fn flatten_into(out: &mut Map<String, Value>, fields: &Map<String, Value>, prefix: &str, level: usize) {
    for (key, value) in fields {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) if level < MAX_FLATTEN_DEPTH => {
                flatten_into(out, nested, &name, level + 1);
            }
            other => {
                out.insert(name, flat_leaf(other));
            }
        }
    }
}

fn flat_leaf(value: &Value) -> Value {
    match value {
        Value::Object(_) => Value::String(OBJECT_MARKER.to_string()),
        Value::Array(items) => Value::String(format!("[Array({})]", items.len())),
        other => other.clone(),
    }
}

/// Text shown for a flattened cell. Absent and `null` are empty.
pub fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Applies mappings and unified columns to `records`.
///
/// Each output record contains exactly the mapped target fields followed by
/// the unified columns. With neither configured, the flattened records are
/// returned unchanged.
pub fn apply(
    records: &[Value],
    field_mappings: &[FieldMapping],
    unified_columns: &[UnifiedColumn],
) -> Vec<Map<String, Value>> {
    let flattened = records.iter().map(flatten_record);

    if field_mappings.is_empty() && unified_columns.is_empty() {
        return flattened.collect();
    }

    flattened
        .map(|flat| {
            let mut out = Map::new();
            for mapping in field_mappings {
                let value = flat
                    .get(&mapping.source_field)
                    .filter(|v| !v.is_null())
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new()));
                out.insert(mapping.target_field.clone(), value);
            }
            for column in unified_columns {
                out.insert(column.name.clone(), Value::String(column.render(&flat)));
            }
            out
        })
        .collect()
}

/// One identity mapping per flattened field of `sample`.
pub fn auto_populate(sample: &Value) -> Vec<FieldMapping> {
    flatten_record(sample)
        .keys()
        .map(|field| FieldMapping::new(field.clone(), field.clone()))
        .collect()
}

/// Output column order for [`apply`]'s records.
pub fn output_columns(
    rows: &[Map<String, Value>],
    field_mappings: &[FieldMapping],
    unified_columns: &[UnifiedColumn],
) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let mut push = |name: &String| {
        if !columns.contains(name) {
            columns.push(name.clone());
        }
    };

    if field_mappings.is_empty() && unified_columns.is_empty() {
        rows.iter().flat_map(|row| row.keys()).for_each(&mut push);
    } else {
        field_mappings.iter().map(|m| &m.target_field).for_each(&mut push);
        unified_columns.iter().map(|c| &c.name).for_each(&mut push);
    }
    columns
}
