//! Conversion between runtime and stable step references.
//!
//! Runtime ids are assigned when a step is created and only mean something in
//! the session that created them. Exported files use positional `step<N>`
//! references instead so they can be replayed in a fresh session.
//!
//! Only the head of a recognized reference is touched: whole-string
//! expressions (mapping values, iteration sources) and the contents of inline
//! `{{...}}` placeholders. Everything else passes through unchanged. Forward
//! and self references are never rewritten. Literal parameter values go
//! through the `placeholders_*` variants, which skip the whole-string case.

use super::path::{split_head, stable_position, stable_reference, VariableExpression};
use super::substitution::PLACEHOLDER_REGEX;
use regex::Captures;

/// Rewrites step references using the runtime ids of a sequence.
#[derive(Debug, Clone, Default)]
pub struct ReferenceRewriter {
    /// Runtime id per position. `None` marks a position with no step, such as
    /// an entry skipped during import.
    ids: Vec<Option<String>>,
}

impl ReferenceRewriter {
    /// Creates a rewriter for a sequence whose steps have these ids, in order.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(|id| Some(id.into())).collect(),
        }
    }

    /// Creates a rewriter with gaps; used while a sequence is being rebuilt.
    pub fn with_slots(ids: Vec<Option<String>>) -> Self {
        Self { ids }
    }

    /// Records the runtime id of the next position.
    pub fn push(&mut self, id: Option<String>) {
        self.ids.push(id);
    }

    /// Rewrites runtime-id references into `step<N>` references.
    ///
    /// `text` is either a whole expression (a mapping value or an iteration
    /// source) or text with inline placeholders. Only references to
    /// positions before `current` are rewritten.
    pub fn to_stable(&self, text: &str, current: usize) -> String {
        self.rewrite(text, Scope::Expression, |head| self.stable_head(head, current))
    }

    /// Rewrites `step<N>` references into runtime ids.
    ///
    /// Only references to positions before `current` that have a step are
    /// rewritten.
    pub fn to_runtime(&self, text: &str, current: usize) -> String {
        self.rewrite(text, Scope::Expression, |head| self.runtime_head(head, current))
    }

    /// Like [`to_stable`](Self::to_stable), but only looks inside `{{...}}`
    /// placeholders. Used for literal parameter values and bodies.
    pub fn placeholders_to_stable(&self, text: &str, current: usize) -> String {
        self.rewrite(text, Scope::Placeholders, |head| self.stable_head(head, current))
    }

    /// Like [`to_runtime`](Self::to_runtime), but only looks inside `{{...}}`
    /// placeholders.
    pub fn placeholders_to_runtime(&self, text: &str, current: usize) -> String {
        self.rewrite(text, Scope::Placeholders, |head| self.runtime_head(head, current))
    }

    fn stable_head(&self, head: &str, current: usize) -> Option<String> {
        let position = self
            .ids
            .iter()
            .position(|id| id.as_deref() == Some(head))?;
        (position < current).then(|| stable_reference(position))
    }

    fn runtime_head(&self, head: &str, current: usize) -> Option<String> {
        let position = stable_position(head)?;
        if position >= current {
            return None;
        }
        self.ids.get(position)?.clone()
    }

    fn rewrite<F>(&self, text: &str, scope: Scope, map_head: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        if text.contains("{{") {
            return PLACEHOLDER_REGEX
                .replace_all(text, |cap: &Captures| {
                    let inner = &cap[1];
                    let core = inner.trim();
                    let leading = &inner[..inner.len() - inner.trim_start().len()];
                    let trailing = &inner[inner.trim_end().len()..];
                    match rewrite_head(core, &map_head) {
                        Some(rewritten) => format!("{{{{{leading}{rewritten}{trailing}}}}}"),
                        None => cap[0].to_string(),
                    }
                })
                .into_owned();
        }
        if scope == Scope::Placeholders {
            return text.to_string();
        }

        // A bare expression only counts when the whole value parses as one.
        let core = text.trim();
        if VariableExpression::parse(core).is_err() {
            return text.to_string();
        }
        match rewrite_head(core, &map_head) {
            Some(rewritten) => text.replacen(core, &rewritten, 1),
            None => text.to_string(),
        }
    }
}

/// What part of a value may hold references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// The whole value is an expression, or it carries placeholders.
    Expression,
    /// Only `{{...}}` contents; everything else is literal text.
    Placeholders,
}

fn rewrite_head<F>(expression: &str, map_head: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let (head, rest) = split_head(expression);
    map_head(head).map(|new_head| format!("{new_head}{rest}"))
}
