//! Step-level error taxonomy.
//!
//! Every variant is recoverable at the step level: the executor turns it into
//! an [`ExecutionResult::Failure`](crate::models::ExecutionResult::Failure)
//! carrying the `Display` text, except [`StepError::AlreadyRunning`] and
//! [`StepError::UnknownStep`] which reject the run before it starts.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    /// A path parameter is still empty after all substitution.
    #[error("Missing required parameter: {0}")]
    MissingRequiredParameter(String),

    /// The request body is not valid JSON.
    #[error("Invalid JSON in request body: {0}")]
    InvalidBodyJson(String),

    /// An expression names a step that has no entry in the result store.
    #[error("Unknown step reference: {0}")]
    UnknownStepReference(String),

    /// An expression does not follow the `<step>.<field>[index]` grammar.
    #[error("Invalid variable expression: {0}")]
    InvalidExpression(String),

    /// The configured base URL cannot be combined with the endpoint path.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The iteration source does not resolve to an array.
    #[error("Iteration source '{0}' did not resolve to an array")]
    IterationSourceNotArray(String),

    /// The iteration source references the current or a later step.
    #[error("Iteration source '{expression}' must reference a step before position {position}")]
    ForwardStepReference { expression: String, position: usize },

    /// The loop variable name is unusable.
    #[error("Invalid loop variable name: '{0}'")]
    InvalidLoopVariable(String),

    /// The transport failed before an HTTP response arrived.
    #[error("Network error: {0}")]
    NetworkFailure(String),

    /// The API answered with a non-2xx status.
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    /// A run for this step or for the whole sequence is still in flight.
    #[error("Already running: {0}")]
    AlreadyRunning(String),

    /// No step with this id exists in the session.
    #[error("Unknown step: {0}")]
    UnknownStep(String),
}

impl StepError {
    /// HTTP status attached to the error, if the API produced one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            StepError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}
