//! Execution results recorded on steps.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Status code recorded on the aggregate result of an iterated step.
pub const ITERATION_AGGREGATE_STATUS: u16 = 200;

/// Outcome of running a step.
///
/// A result is produced once per run and replaced wholesale on re-execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ExecutionResult {
    /// The call (or the iteration as a whole) completed.
    #[serde(rename_all = "camelCase")]
    Success { http_status: u16, data: StepData },

    /// The step could not be executed or the API rejected it.
    #[serde(rename_all = "camelCase")]
    Failure {
        http_status: Option<u16>,
        message: String,
    },
}

/// Payload of a successful step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum StepData {
    /// Decoded response body of a single call (the full `{data: ...}` envelope).
    Response(Value),

    /// Aggregate of an iterated step.
    Iteration(IterationSummary),
}

impl ExecutionResult {
    /// Creates a successful single-call result.
    pub fn success(http_status: u16, body: Value) -> Self {
        ExecutionResult::Success {
            http_status,
            data: StepData::Response(body),
        }
    }

    /// Creates a failure without an HTTP status (build or network problems).
    pub fn failure(message: impl Into<String>) -> Self {
        ExecutionResult::Failure {
            http_status: None,
            message: message.into(),
        }
    }

    /// Creates a failure carrying the status the API answered with.
    pub fn api_failure(http_status: u16, message: impl Into<String>) -> Self {
        ExecutionResult::Failure {
            http_status: Some(http_status),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            ExecutionResult::Success { http_status, .. } => Some(*http_status),
            ExecutionResult::Failure { http_status, .. } => *http_status,
        }
    }

    /// Failure message, if this is a failure.
    pub fn message(&self) -> Option<&str> {
        match self {
            ExecutionResult::Failure { message, .. } => Some(message),
            ExecutionResult::Success { .. } => None,
        }
    }

    /// Iteration summary, if this is the result of an iterated step.
    pub fn iteration_summary(&self) -> Option<&IterationSummary> {
        match self {
            ExecutionResult::Success {
                data: StepData::Iteration(summary),
                ..
            } => Some(summary),
            _ => None,
        }
    }

    /// The value variable expressions walk for this result.
    ///
    /// Single calls expose their whole response envelope. Iterated steps
    /// expose the summary counters plus `data`, an alias of `unifiedItems`,
    /// so `stepN.data[0]` reads the same for both shapes. Failures expose
    /// `null`.
    pub fn resolvable_value(&self) -> Value {
        match self {
            ExecutionResult::Success {
                data: StepData::Response(body),
                ..
            } => body.clone(),
            ExecutionResult::Success {
                data: StepData::Iteration(summary),
                ..
            } => json!({
                "data": summary.unified_items,
                "unifiedItems": summary.unified_items,
                "totalIterations": summary.total_iterations,
                "succeeded": summary.succeeded,
                "failed": summary.failed,
            }),
            ExecutionResult::Failure { .. } => Value::Null,
        }
    }

    /// Records carried by a successful result, for display and transformation.
    ///
    /// The envelope's `data` member is unwrapped; an array yields its
    /// elements and any other non-null value yields a single record.
    pub fn records(&self) -> Vec<Value> {
        match self {
            ExecutionResult::Success {
                data: StepData::Response(body),
                ..
            } => {
                let payload = body.get("data").unwrap_or(body);
                match payload {
                    Value::Null => Vec::new(),
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                }
            }
            ExecutionResult::Success {
                data: StepData::Iteration(summary),
                ..
            } => summary.unified_items.clone(),
            ExecutionResult::Failure { .. } => Vec::new(),
        }
    }

    /// Whether this is a success with at least one record.
    pub fn has_data(&self) -> bool {
        !self.records().is_empty()
    }
}

/// Per-iteration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IterationState {
    Pending,
    Executing,
    Succeeded,
    Failed,
}

/// Diagnostics for one element of an iterated step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationRecord {
    /// Position of the element in the source array.
    pub index: usize,

    /// The element bound to the loop variable.
    pub item: Value,

    pub state: IterationState,

    pub http_status: Option<u16>,

    /// Decoded response body when the call succeeded.
    pub data: Option<Value>,

    pub error: Option<String>,
}

impl IterationRecord {
    pub fn pending(index: usize, item: Value) -> Self {
        Self {
            index,
            item,
            state: IterationState::Pending,
            http_status: None,
            data: None,
            error: None,
        }
    }

    pub fn succeed(&mut self, http_status: u16, data: Value) {
        self.state = IterationState::Succeeded;
        self.http_status = Some(http_status);
        self.data = Some(data);
    }

    pub fn fail(&mut self, http_status: Option<u16>, error: impl Into<String>) {
        self.state = IterationState::Failed;
        self.http_status = http_status;
        self.error = Some(error.into());
    }
}

/// Aggregate result of an iterated step.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationSummary {
    pub total_iterations: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// Unified data of the succeeded iterations, in iteration order.
    pub unified_items: Vec<Value>,

    /// Raw per-iteration records.
    pub iterations: Vec<IterationRecord>,
}
