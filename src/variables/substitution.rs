//! Inline `{{expr}}` placeholder substitution.
//!
//! Parameter values may embed placeholders such as
//! `{{step0.data[0].gid}}` or `{{item.name}}`. This module finds them and
//! replaces them with resolved values. Escaped braces (`\{{` and `\}}`) are
//! kept as literal text.

use super::resolver::VariableResolver;
use crate::error::StepError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Cached regex pattern for matching {{expression}} with optional whitespace.
pub(crate) static PLACEHOLDER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("Failed to compile placeholder regex"));

/// Matches a string that is exactly one placeholder.
static SOLE_PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\{\{([^}]+)\}\}\s*$").expect("Failed to compile placeholder regex")
});

const ESCAPED_OPEN: &str = "\u{E000}";
const ESCAPED_CLOSE: &str = "\u{E001}";

/// Whether the text contains at least one placeholder.
pub fn contains_placeholder(text: &str) -> bool {
    text.contains("{{") && PLACEHOLDER_REGEX.is_match(&protect_escapes(text))
}

/// Expressions of all placeholders in the text, trimmed, in order.
pub fn placeholder_expressions(text: &str) -> Vec<String> {
    PLACEHOLDER_REGEX
        .captures_iter(&protect_escapes(text))
        .map(|cap| cap[1].trim().to_string())
        .collect()
}

/// If the whole text is a single placeholder, returns its expression.
pub fn sole_placeholder(text: &str) -> Option<&str> {
    SOLE_PLACEHOLDER_REGEX
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim())
}

/// Substitutes all {{expression}} patterns in the input text.
///
/// Placeholders resolving to `null` are replaced with an empty string.
/// Resolved values are inserted verbatim and never re-scanned for
/// placeholders.
///
/// # Errors
///
/// Propagates resolution errors such as [`StepError::UnknownStepReference`].
pub fn substitute_placeholders(
    text: &str,
    resolver: &VariableResolver<'_>,
) -> Result<String, StepError> {
    // Fast path: if there are no placeholder markers at all, return original text
    if !text.contains("{{") {
        return Ok(text.to_string());
    }

    let text = protect_escapes(text);

    let mut result = String::with_capacity(text.len() + (text.len() / 4));
    let mut last_match_end = 0;

    for cap in PLACEHOLDER_REGEX.captures_iter(&text) {
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let expression = cap[1].trim();

        result.push_str(&text[last_match_end..full_match.start()]);

        if let Some(value) = resolver.resolve_to_string(expression)? {
            result.push_str(&value);
        }

        last_match_end = full_match.end();
    }

    result.push_str(&text[last_match_end..]);

    Ok(restore_escapes(&result))
}

fn protect_escapes(text: &str) -> String {
    text.replace("\\{{", ESCAPED_OPEN)
        .replace("\\}}", ESCAPED_CLOSE)
}

fn restore_escapes(text: &str) -> String {
    text.replace(ESCAPED_OPEN, "{{").replace(ESCAPED_CLOSE, "}}")
}
