//! Data models for endpoints, steps, requests and results.
//!
//! This module contains the core data structures shared by the resolver, the
//! parameter builder and the executor.

pub mod endpoint;
pub mod request;
pub mod response;
pub mod result;
pub mod step;

pub use endpoint::EndpointDescriptor;
pub use request::{HttpMethod, HttpRequest, RequestDescriptor};
pub use response::HttpResponse;
pub use result::{
    ExecutionResult, IterationRecord, IterationState, IterationSummary, StepData,
};
pub use step::{
    ExecutionState, IterationConfig, ParameterSet, QueryValue, SequenceStep, VariableMapping,
};
