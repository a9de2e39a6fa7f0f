//! Variable expression parsing and JSON path walking.
//!
//! An expression names a step (or the loop variable) followed by dotted field
//! access and bracketed array indices:
//!
//! ```text
//! step0.data[2].gid
//! 5f0c2e7a-....data.workspaces[0].name
//! item.gid
//! ```

use crate::error::StepError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Matches the stable positional form of a step reference.
static STABLE_REF_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^step(\d+)$").expect("Failed to compile stable reference regex"));

/// A segment in a variable expression after the head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object field access (e.g., "data", "name")
    Field(String),

    /// Array index access (e.g., [0], [5])
    Index(usize),
}

/// A parsed variable expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableExpression {
    /// Step reference or loop variable name.
    pub head: String,

    pub segments: Vec<PathSegment>,
}

impl VariableExpression {
    /// Parses an expression such as `step1.data[0].gid`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidExpression`] for empty input, an invalid
    /// head, empty field names, or non-numeric indices.
    pub fn parse(expression: &str) -> Result<Self, StepError> {
        let expr = expression.trim();
        let invalid = || StepError::InvalidExpression(expression.to_string());

        let head_len = split_head(expr).0.len();
        let head = &expr[..head_len];
        if head.is_empty() || !head.chars().all(is_head_char) {
            return Err(invalid());
        }

        let mut segments = Vec::new();
        let mut chars = expr[head_len..].chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '.' => {
                    let mut name = String::new();
                    while let Some(&next) = chars.peek() {
                        if next == '.' || next == '[' {
                            break;
                        }
                        name.push(next);
                        chars.next();
                    }
                    if name.is_empty() {
                        return Err(invalid());
                    }
                    segments.push(PathSegment::Field(name));
                }
                '[' => {
                    let mut index_str = String::new();
                    let mut closed = false;
                    for next in chars.by_ref() {
                        if next == ']' {
                            closed = true;
                            break;
                        }
                        index_str.push(next);
                    }
                    let index = index_str.trim().parse::<usize>().map_err(|_| invalid())?;
                    if !closed {
                        return Err(invalid());
                    }
                    segments.push(PathSegment::Index(index));
                }
                _ => return Err(invalid()),
            }
        }

        Ok(Self {
            head: head.to_string(),
            segments,
        })
    }

    /// Walks the segments over `root`. See [`walk`].
    pub fn walk<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        walk(root, &self.segments)
    }
}

/// Splits an expression into its head and the remainder starting at the first
/// `.` or `[`.
pub fn split_head(expr: &str) -> (&str, &str) {
    match expr.find(['.', '[']) {
        Some(pos) => expr.split_at(pos),
        None => (expr, ""),
    }
}

fn is_head_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Returns `N` for a stable `step<N>` reference.
pub fn stable_position(head: &str) -> Option<usize> {
    STABLE_REF_REGEX
        .captures(head)
        .and_then(|cap| cap[1].parse().ok())
}

/// Formats the stable reference for a position.
pub fn stable_reference(position: usize) -> String {
    format!("step{}", position)
}

/// Follows `segments` through `root`.
///
/// Returns `None` as soon as a field or index is absent or the intermediate
/// value has the wrong shape. Callers treat that as `null`.
pub fn walk<'a>(root: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            PathSegment::Field(name) => current.as_object()?.get(name)?,
            PathSegment::Index(index) => current.as_array()?.get(*index)?,
        };
    }
    Some(current)
}

/// Renders a resolved value for substitution into text.
///
/// - Strings: returned as-is (without quotes)
/// - Numbers, booleans: converted to string
/// - Objects, arrays: serialized as JSON
/// - Null: `None`
pub fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}
