//! Resolution of variable expressions against prior step results.

use super::path::{render_value, stable_position, VariableExpression};
use crate::error::StepError;
use crate::models::ExecutionResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Results of executed steps, keyed by runtime step id.
///
/// Each run owns the slot of its own step id; other slots are only read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultStore {
    entries: HashMap<String, ExecutionResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, step_id: impl Into<String>, result: ExecutionResult) {
        self.entries.insert(step_id.into(), result);
    }

    pub fn get(&self, step_id: &str) -> Option<&ExecutionResult> {
        self.entries.get(step_id)
    }

    pub fn remove(&mut self, step_id: &str) -> Option<ExecutionResult> {
        self.entries.remove(step_id)
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.entries.contains_key(step_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves variable expressions for one step.
///
/// The resolver sees the result store, the sequence order (to understand
/// `step<N>` references) and, while iterating, one loop binding that shadows
/// step lookups for its name.
#[derive(Debug, Clone, Copy)]
pub struct VariableResolver<'a> {
    store: &'a ResultStore,
    order: &'a [String],
    binding: Option<(&'a str, &'a Value)>,
}

impl<'a> VariableResolver<'a> {
    /// Creates a resolver over `store`; `order` lists runtime step ids by
    /// position.
    pub fn new(store: &'a ResultStore, order: &'a [String]) -> Self {
        Self {
            store,
            order,
            binding: None,
        }
    }

    /// Returns a resolver layered with a loop variable binding.
    pub fn with_binding<'b>(&self, name: &'b str, value: &'b Value) -> VariableResolver<'b>
    where
        'a: 'b,
    {
        VariableResolver {
            store: self.store,
            order: self.order,
            binding: Some((name, value)),
        }
    }

    /// Maps a reference head (runtime id or `step<N>`) to a runtime id.
    ///
    /// A head that is literally a store key or a known step id wins over the
    /// positional interpretation.
    pub fn runtime_id(&self, head: &str) -> Option<&'a str> {
        if let Some(id) = self.order.iter().find(|id| id.as_str() == head) {
            return Some(id.as_str());
        }
        if let Some((key, _)) = self.store.entries.get_key_value(head) {
            return Some(key.as_str());
        }
        stable_position(head)
            .and_then(|n| self.order.get(n))
            .map(String::as_str)
    }

    /// Position of the step a reference head points at, if it is in the
    /// current sequence.
    pub fn position_of(&self, head: &str) -> Option<usize> {
        let id = self.runtime_id(head)?;
        self.order.iter().position(|candidate| candidate == id)
    }

    /// Whether `head` names the bound loop variable.
    pub fn is_bound(&self, head: &str) -> bool {
        matches!(self.binding, Some((name, _)) if name == head)
    }

    /// Resolves an expression to a value.
    ///
    /// Absent intermediate values resolve to `Value::Null`.
    ///
    /// # Errors
    ///
    /// - [`StepError::InvalidExpression`] when the expression is malformed
    /// - [`StepError::UnknownStepReference`] when the head maps to no store entry
    pub fn resolve(&self, expression: &str) -> Result<Value, StepError> {
        let expr = VariableExpression::parse(expression)?;

        if let Some((name, value)) = self.binding {
            if name == expr.head {
                return Ok(expr.walk(value).cloned().unwrap_or(Value::Null));
            }
        }

        let result = self
            .runtime_id(&expr.head)
            .and_then(|id| self.store.get(id))
            .ok_or_else(|| StepError::UnknownStepReference(expr.head.clone()))?;

        let root = result.resolvable_value();
        Ok(expr.walk(&root).cloned().unwrap_or(Value::Null))
    }

    /// Resolves an expression and renders it for text substitution.
    ///
    /// Returns `Ok(None)` when the value is `null`.
    pub fn resolve_to_string(&self, expression: &str) -> Result<Option<String>, StepError> {
        Ok(render_value(&self.resolve(expression)?))
    }
}
