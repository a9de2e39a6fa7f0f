//! Sequence execution.
//!
//! [`SequenceExecutor`] runs one step or the whole sequence of a session.
//! Each run snapshots the step and the result store under the session lock,
//! releases the lock for the network calls, then writes the result back to
//! both the step and the store.
//!
//! Step-level errors never escape a run: they become an
//! [`ExecutionResult::Failure`] carrying the error text. Only
//! [`StepError::UnknownStep`] and [`StepError::AlreadyRunning`], which stop a
//! run before it starts, are returned as errors.

pub mod config;
pub mod error;
pub mod iteration;
pub mod native;
pub mod transport;

pub use config::ExecutionConfig;
pub use error::RequestError;
pub use iteration::IterationEngine;
pub use native::ReqwestTransport;
pub use transport::HttpTransport;

use crate::auth::apply_bearer;
use crate::builder::ParameterBuilder;
use crate::error::StepError;
use crate::models::{ExecutionResult, SequenceStep};
use crate::session::{RunSnapshot, SessionHandle};
use crate::variables::VariableResolver;
use log::{debug, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Pause between consecutive steps of a sequence run.
pub const INTER_STEP_DELAY: Duration = Duration::from_millis(500);

/// Builds and sends the request for one step, or one iteration of it.
pub(crate) struct StepCaller<'t> {
    builder: ParameterBuilder,
    headers: HashMap<String, String>,
    transport: &'t dyn HttpTransport,
}

impl<'t> StepCaller<'t> {
    fn new(
        snapshot: &RunSnapshot,
        config: &ExecutionConfig,
        transport: &'t dyn HttpTransport,
    ) -> Self {
        let mut headers = config.default_headers.clone();
        headers.insert("Accept".to_string(), "application/json".to_string());
        if let Some(token) = &snapshot.token {
            apply_bearer(&mut headers, token);
        }

        Self {
            builder: ParameterBuilder::new(snapshot.base_url.clone()),
            headers,
            transport,
        }
    }

    /// Returns the status and decoded body of a 2xx response.
    ///
    /// A non-JSON success body is kept as a JSON string.
    pub(crate) async fn call(
        &self,
        step: &SequenceStep,
        resolver: &VariableResolver<'_>,
    ) -> Result<(u16, Value), StepError> {
        let descriptor = self.builder.build(step, resolver)?;
        debug!("{} {}", descriptor.method, descriptor.url);

        let request = descriptor.into_http_request(self.headers.clone());
        let response = self.transport.send(&request).await?;

        if !response.is_success() {
            return Err(StepError::ApiError {
                status: response.status_code,
                message: response.error_message(),
            });
        }

        let body = match response.body_json() {
            Ok(body) => body,
            Err(_) => Value::String(
                response
                    .body_as_string()
                    .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()),
            ),
        };
        Ok((response.status_code, body))
    }
}

/// Clears the session's busy marker for a step when the run ends, including
/// when the run's future is dropped early.
struct StepRunGuard {
    session: SessionHandle,
    id: String,
}

impl Drop for StepRunGuard {
    fn drop(&mut self) {
        self.session.lock().release_step_run(&self.id);
    }
}

struct SequenceRunGuard {
    session: SessionHandle,
}

impl Drop for SequenceRunGuard {
    fn drop(&mut self) {
        self.session.lock().end_sequence_run();
    }
}

pub struct SequenceExecutor {
    session: SessionHandle,
    transport: Arc<dyn HttpTransport>,
    config: ExecutionConfig,
    step_delay: Duration,
}

impl SequenceExecutor {
    pub fn new(
        session: SessionHandle,
        transport: Arc<dyn HttpTransport>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            session,
            transport,
            config,
            step_delay: INTER_STEP_DELAY,
        }
    }

    /// Executor backed by a [`ReqwestTransport`] built from `config`.
    pub fn with_reqwest(
        session: SessionHandle,
        config: ExecutionConfig,
    ) -> Result<Self, RequestError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::new(session, Arc::new(transport), config))
    }

    /// Overrides the pause between sequence steps.
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Runs one step and returns its new result.
    ///
    /// # Errors
    ///
    /// - [`StepError::UnknownStep`] if no step has this id
    /// - [`StepError::AlreadyRunning`] if this step or the whole sequence is
    ///   already running
    pub async fn run_step(&self, id: &str) -> Result<ExecutionResult, StepError> {
        self.execute(id, false).await
    }

    /// Runs every step in order, stopping after the first failure.
    ///
    /// Returns the results produced so far; steps after a failure keep their
    /// `NotRun` state.
    pub async fn run_all(&self) -> Result<Vec<ExecutionResult>, StepError> {
        let order = self.session.lock().begin_sequence_run()?;
        let _guard = SequenceRunGuard {
            session: self.session.clone(),
        };

        info!("Running sequence of {} step(s)", order.len());
        let mut results = Vec::with_capacity(order.len());

        for (position, id) in order.iter().enumerate() {
            if position > 0 && !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }

            let result = match self.execute(id, true).await {
                Ok(result) => result,
                Err(StepError::UnknownStep(_)) => {
                    warn!("Step {} was removed during the run; skipping", id);
                    continue;
                }
                Err(err) => return Err(err),
            };

            let failed = result.is_failure();
            results.push(result);
            if failed {
                warn!("Sequence halted at step {} ({})", position, id);
                break;
            }
        }

        info!("Sequence finished with {} result(s)", results.len());
        Ok(results)
    }

    async fn execute(&self, id: &str, in_sequence: bool) -> Result<ExecutionResult, StepError> {
        let snapshot = self.session.lock().begin_step_run(id, in_sequence)?;
        let _guard = StepRunGuard {
            session: self.session.clone(),
            id: id.to_string(),
        };

        let result = self.compute(&snapshot).await;
        match &result {
            ExecutionResult::Success { http_status, .. } => {
                info!("Step {} succeeded ({})", snapshot.position, http_status)
            }
            ExecutionResult::Failure { message, .. } => {
                warn!("Step {} failed: {}", snapshot.position, message)
            }
        }

        self.session.lock().finish_step_run(id, &result);
        Ok(result)
    }

    async fn compute(&self, snapshot: &RunSnapshot) -> ExecutionResult {
        let caller = StepCaller::new(snapshot, &self.config, self.transport.as_ref());
        let resolver = VariableResolver::new(&snapshot.results, &snapshot.order);
        let step = &snapshot.step;

        let outcome = if step.iteration.is_active() {
            IterationEngine::new(&caller)
                .run(step, snapshot.position, &resolver)
                .await
        } else {
            caller
                .call(step, &resolver)
                .await
                .map(|(status, body)| ExecutionResult::success(status, body))
        };

        outcome.unwrap_or_else(|err| ExecutionResult::Failure {
            http_status: err.http_status(),
            message: err.to_string(),
        })
    }
}
