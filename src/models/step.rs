//! Sequence steps and the parameters a user captures on them.

use super::endpoint::EndpointDescriptor;
use super::result::ExecutionResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default name the current element is bound to while iterating.
pub const DEFAULT_LOOP_VARIABLE: &str = "item";

/// A query parameter value as captured from the user.
///
/// Checkbox-style inputs are booleans; everything else is text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    Flag(bool),
    Text(String),
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::Text(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Flag(value)
    }
}

/// Literal parameter values of a step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// One entry per `{param}` in the endpoint path.
    #[serde(default)]
    pub path: BTreeMap<String, String>,

    #[serde(default)]
    pub query: BTreeMap<String, QueryValue>,

    /// Raw JSON body text, validated when the request is built.
    #[serde(default)]
    pub body: Option<String>,
}

/// Parameter name → variable expression. An empty expression means the
/// literal value from the [`ParameterSet`] is used.
pub type VariableMapping = BTreeMap<String, String>;

/// Fan-out configuration of a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Expression that must resolve to an array produced by an earlier step.
    #[serde(default)]
    pub source_expression: String,

    #[serde(default = "default_loop_variable")]
    pub loop_variable: String,

    #[serde(default = "default_unify_results")]
    pub unify_results: bool,
}

fn default_loop_variable() -> String {
    DEFAULT_LOOP_VARIABLE.to_string()
}

fn default_unify_results() -> bool {
    true
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source_expression: String::new(),
            loop_variable: default_loop_variable(),
            unify_results: default_unify_results(),
        }
    }
}

impl IterationConfig {
    /// An enabled configuration iterating over `source_expression`.
    pub fn over(source_expression: impl Into<String>) -> Self {
        Self {
            enabled: true,
            source_expression: source_expression.into(),
            ..Self::default()
        }
    }

    /// Whether the step should fan out when executed.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.source_expression.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionState {
    #[default]
    NotRun,
    Ran,
}

/// One node of the authored sequence.
///
/// The step's position is owned by the session's ordering; see
/// [`Session::position_of`](crate::session::Session::position_of).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceStep {
    /// Session-local correlation id. Not meaningful across sessions.
    pub id: String,

    pub endpoint: EndpointDescriptor,

    pub parameters: ParameterSet,

    pub variable_mappings: VariableMapping,

    pub iteration: IterationConfig,

    pub execution_state: ExecutionState,

    pub result: Option<ExecutionResult>,

    /// Set when an imported entry matched no catalog endpoint.
    pub is_imported_placeholder: bool,
}

impl SequenceStep {
    /// Creates a step with an empty literal for every path parameter.
    pub fn new(id: impl Into<String>, endpoint: EndpointDescriptor) -> Self {
        let mut parameters = ParameterSet::default();
        for name in endpoint.path_parameters() {
            parameters.path.insert(name, String::new());
        }

        Self {
            id: id.into(),
            endpoint,
            parameters,
            variable_mappings: VariableMapping::new(),
            iteration: IterationConfig::default(),
            execution_state: ExecutionState::NotRun,
            result: None,
            is_imported_placeholder: false,
        }
    }

    pub fn set_path_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.path.insert(name.into(), value.into());
    }

    pub fn set_query_param(&mut self, name: impl Into<String>, value: impl Into<QueryValue>) {
        self.parameters.query.insert(name.into(), value.into());
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.parameters.body = Some(body.into());
    }

    /// Maps a parameter to a variable expression; an empty expression removes
    /// the mapping.
    pub fn map_variable(&mut self, param: impl Into<String>, expression: impl Into<String>) {
        let param = param.into();
        let expression = expression.into();
        if expression.trim().is_empty() {
            self.variable_mappings.remove(&param);
        } else {
            self.variable_mappings.insert(param, expression);
        }
    }

    /// Non-empty mapping expression for a parameter.
    pub fn mapping_for(&self, param: &str) -> Option<&str> {
        self.variable_mappings
            .get(param)
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
    }

    pub fn has_run(&self) -> bool {
        self.execution_state == ExecutionState::Ran
    }

    /// Clears the previous run's outcome.
    pub fn reset(&mut self) {
        self.execution_state = ExecutionState::NotRun;
        self.result = None;
    }

    /// Replaces the step's result and marks it as run.
    pub fn record(&mut self, result: ExecutionResult) {
        self.execution_state = ExecutionState::Ran;
        self.result = Some(result);
    }
}
