//! Fan-out of one step over an array produced by an earlier step.
//!
//! Elements run one at a time, in source order. A failed element is recorded
//! and the loop moves on; the step only fails as a whole when the source
//! cannot be resolved to an array.

use super::StepCaller;
use crate::error::StepError;
use crate::models::result::ITERATION_AGGREGATE_STATUS;
use crate::models::step::DEFAULT_LOOP_VARIABLE;
use crate::models::{
    ExecutionResult, IterationRecord, IterationState, IterationSummary, SequenceStep, StepData,
};
use crate::variables::{stable_position, VariableExpression, VariableResolver};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static LOOP_VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Failed to compile loop variable regex")
});

/// Runs iterated steps.
pub struct IterationEngine<'c, 't> {
    caller: &'c StepCaller<'t>,
}

impl<'c, 't> IterationEngine<'c, 't> {
    pub(crate) fn new(caller: &'c StepCaller<'t>) -> Self {
        Self { caller }
    }

    /// Executes `step`, which sits at `position`, once per source element.
    ///
    /// Returns a `Success` carrying the [`IterationSummary`] even when some or
    /// all elements failed.
    ///
    /// # Errors
    ///
    /// Errors that prevent the loop from starting: an invalid loop variable,
    /// a source that references the current or a later step, or a source
    /// that does not resolve to an array.
    pub async fn run(
        &self,
        step: &SequenceStep,
        position: usize,
        resolver: &VariableResolver<'_>,
    ) -> Result<ExecutionResult, StepError> {
        let config = &step.iteration;
        let loop_variable = validate_loop_variable(&config.loop_variable, resolver)?;
        let items = resolve_source(&config.source_expression, position, resolver)?;

        info!(
            "Iterating step {} over {} item(s) from '{}'",
            step.id,
            items.len(),
            config.source_expression.trim()
        );

        let mut summary = IterationSummary {
            total_iterations: items.len(),
            ..IterationSummary::default()
        };

        for (index, item) in items.into_iter().enumerate() {
            let mut record = IterationRecord::pending(index, item);
            record.state = IterationState::Executing;

            let outcome = {
                let scoped = resolver.with_binding(&loop_variable, &record.item);
                self.caller.call(step, &scoped).await
            };

            match outcome {
                Ok((status, body)) => {
                    debug!("Iteration {} of step {} succeeded ({})", index, step.id, status);
                    summary.succeeded += 1;
                    fold_items(&mut summary.unified_items, &body, config.unify_results);
                    record.succeed(status, body);
                }
                Err(err) => {
                    warn!("Iteration {} of step {} failed: {}", index, step.id, err);
                    summary.failed += 1;
                    record.fail(err.http_status(), err.to_string());
                }
            }
            summary.iterations.push(record);
        }

        info!(
            "Step {} iterations finished: {} succeeded, {} failed",
            step.id, summary.succeeded, summary.failed
        );

        Ok(ExecutionResult::Success {
            http_status: ITERATION_AGGREGATE_STATUS,
            data: StepData::Iteration(summary),
        })
    }
}

/// Returns the effective loop variable name.
///
/// Blank falls back to `item`. Names that could be read as a step reference
/// are rejected.
fn validate_loop_variable(
    name: &str,
    resolver: &VariableResolver<'_>,
) -> Result<String, StepError> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(DEFAULT_LOOP_VARIABLE.to_string());
    }
    if !LOOP_VARIABLE_REGEX.is_match(name)
        || stable_position(name).is_some()
        || resolver.runtime_id(name).is_some()
    {
        return Err(StepError::InvalidLoopVariable(name.to_string()));
    }
    Ok(name.to_string())
}

fn resolve_source(
    expression: &str,
    position: usize,
    resolver: &VariableResolver<'_>,
) -> Result<Vec<Value>, StepError> {
    let expression = expression.trim();
    let parsed = VariableExpression::parse(expression)?;

    let referenced = resolver
        .position_of(&parsed.head)
        .or_else(|| stable_position(&parsed.head));
    if let Some(referenced) = referenced {
        if referenced >= position {
            return Err(StepError::ForwardStepReference {
                expression: expression.to_string(),
                position,
            });
        }
    }

    match resolver.resolve(expression)? {
        Value::Array(items) => Ok(items),
        _ => Err(StepError::IterationSourceNotArray(expression.to_string())),
    }
}

/// Adds one successful call's payload to the unified items.
///
/// The envelope's `data` member is used when present. Unified mode flattens
/// arrays into the item list and wraps single values; discrete mode keeps the
/// payload as one entry.
fn fold_items(items: &mut Vec<Value>, body: &Value, unify: bool) {
    let payload = body.get("data").unwrap_or(body);
    if !unify {
        items.push(payload.clone());
        return;
    }
    match payload {
        Value::Null => {}
        Value::Array(values) => items.extend(values.iter().cloned()),
        other => items.push(other.clone()),
    }
}
