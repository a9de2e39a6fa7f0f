//! Integration tests for the sequence runner.
//!
//! Shared fixtures: a scripted in-memory transport, a small catalog shaped
//! like the target API, and session/executor constructors.

pub mod end_to_end_test;
pub mod import_export_test;
pub mod sequence_execution_test;

use async_trait::async_trait;
use rest_sequencer::catalog::EndpointCatalog;
use rest_sequencer::executor::{ExecutionConfig, HttpTransport, RequestError, SequenceExecutor};
use rest_sequencer::models::{EndpointDescriptor, HttpMethod, HttpRequest, HttpResponse};
use rest_sequencer::{Session, SessionHandle};
use serde_json::Value;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initialize test environment (run once)
pub fn init_test_env() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, RequestError> + Send + Sync;

/// Transport answering from a closure and recording every request.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    delay: Duration,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, RequestError> + Send + Sync + 'static,
    {
        Self::with_delay(Duration::ZERO, handler)
    }

    pub fn with_delay<F>(delay: Duration, handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, RequestError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            delay,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Paths of the requests sent so far, without query strings.
    pub fn paths(&self) -> Vec<String> {
        self.requests().iter().map(|r| path_of(&r.url)).collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.handler)(request)
    }
}

pub const BASE_URL: &str = "https://app.example.test/api/1.0";

/// Path of a URL built against [`BASE_URL`], e.g. `/workspaces/1/projects`.
pub fn path_of(url: &str) -> String {
    let parsed = url::Url::parse(url).unwrap();
    parsed
        .path()
        .strip_prefix("/api/1.0")
        .unwrap_or(parsed.path())
        .to_string()
}

pub fn query_of(url: &str, name: &str) -> Option<String> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub fn ok(body: Value) -> Result<HttpResponse, RequestError> {
    Ok(HttpResponse::json(200, &body))
}

pub fn catalog() -> EndpointCatalog {
    EndpointCatalog::new(vec![
        EndpointDescriptor::new(HttpMethod::GET, "/workspaces").with_summary("Get multiple workspaces"),
        EndpointDescriptor::new(HttpMethod::GET, "/workspaces/{workspace_gid}/projects")
            .with_summary("Get a workspace's projects"),
        EndpointDescriptor::new(HttpMethod::GET, "/projects/{project_gid}/tasks")
            .with_summary("Get tasks from a project"),
        EndpointDescriptor::new(HttpMethod::POST, "/tasks").with_summary("Create a task"),
        EndpointDescriptor::new(HttpMethod::GET, "/users/me").with_summary("Get the current user"),
    ])
}

pub fn endpoint(method: HttpMethod, path: &str) -> EndpointDescriptor {
    catalog()
        .find(method, path)
        .cloned()
        .unwrap_or_else(|| EndpointDescriptor::new(method, path))
}

pub fn session() -> SessionHandle {
    init_test_env();
    SessionHandle::new(Session::new(catalog()).with_base_url(BASE_URL))
}

pub fn executor(session: &SessionHandle, transport: Arc<ScriptedTransport>) -> SequenceExecutor {
    SequenceExecutor::new(session.clone(), transport, ExecutionConfig::new(5_000))
        .with_step_delay(Duration::ZERO)
}
