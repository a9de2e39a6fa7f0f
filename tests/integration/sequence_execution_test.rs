//! Multi-step runs against a scripted transport: chaining, iteration and
//! halting behavior.

use super::{endpoint, executor, ok, path_of, query_of, session, ScriptedTransport};
use rest_sequencer::error::StepError;
use rest_sequencer::executor::RequestError;
use rest_sequencer::models::{
    ExecutionState, HttpMethod, HttpRequest, HttpResponse, IterationConfig, IterationState,
};
use rest_sequencer::transform::{FieldMapping, UnifiedColumn};
use rest_sequencer::SessionHandle;
use serde_json::{json, Value};
use std::time::Duration;

/// Workspace "w1" holds projects p1..p5; each project has two tasks.
fn workspace_api(request: &HttpRequest) -> Result<HttpResponse, RequestError> {
    let path = path_of(&request.url);
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["workspaces"] => ok(json!({"data": [{"gid": "w1", "name": "Acme"}]})),
        ["workspaces", "w1", "projects"] => ok(json!({
            "data": (1..=5)
                .map(|i| json!({"gid": format!("p{i}"), "name": format!("Project {i}")}))
                .collect::<Vec<_>>()
        })),
        ["projects", gid, "tasks"] => ok(json!({
            "data": [
                {"gid": format!("{gid}-t1"), "name": "First"},
                {"gid": format!("{gid}-t2"), "name": "Second"}
            ]
        })),
        _ => Ok(HttpResponse::json(
            404,
            &json!({"errors": [{"message": "Not Found"}]}),
        )),
    }
}

/// Appends workspaces → projects → tasks (iterated over the projects).
fn three_step_sequence(session: &SessionHandle) -> Vec<String> {
    let mut s = session.lock();
    let workspaces = s.add_step(endpoint(HttpMethod::GET, "/workspaces"));
    let projects = s.add_step(endpoint(HttpMethod::GET, "/workspaces/{workspace_gid}/projects"));
    let tasks = s.add_step(endpoint(HttpMethod::GET, "/projects/{project_gid}/tasks"));

    s.step_mut(&projects)
        .unwrap()
        .map_variable("workspace_gid", "step0.data[0].gid");

    let step = s.step_mut(&tasks).unwrap();
    step.iteration = IterationConfig::over(format!("{projects}.data"));
    step.iteration.loop_variable = "project".to_string();
    step.map_variable("project_gid", "project.gid");

    vec![workspaces, projects, tasks]
}

#[tokio::test]
async fn test_chained_sequence_with_iteration() {
    let session = session();
    let ids = three_step_sequence(&session);
    let transport = ScriptedTransport::new(workspace_api);

    let results = executor(&session, transport.clone()).run_all().await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_success()));

    assert_eq!(
        transport.paths(),
        vec![
            "/workspaces",
            "/workspaces/w1/projects",
            "/projects/p1/tasks",
            "/projects/p2/tasks",
            "/projects/p3/tasks",
            "/projects/p4/tasks",
            "/projects/p5/tasks",
        ]
    );

    let summary = results[2].iteration_summary().unwrap();
    assert_eq!(summary.total_iterations, 5);
    assert_eq!(summary.succeeded, 5);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.unified_items.len(), 10);
    assert_eq!(summary.unified_items[0]["gid"], "p1-t1");
    assert_eq!(summary.unified_items[9]["gid"], "p5-t2");

    let s = session.lock();
    for id in &ids {
        assert_eq!(s.step(id).unwrap().execution_state, ExecutionState::Ran);
    }
    assert_eq!(s.resolve("step2.data[3].gid").unwrap(), json!("p2-t2"));
    assert_eq!(s.final_result(), Some(&results[2]));
}

#[tokio::test]
async fn test_default_query_params_sent_on_every_call() {
    let session = session();
    three_step_sequence(&session);
    let transport = ScriptedTransport::new(workspace_api);

    executor(&session, transport.clone()).run_all().await.unwrap();

    for request in transport.requests() {
        assert_eq!(query_of(&request.url, "limit").as_deref(), Some("100"));
        assert_eq!(query_of(&request.url, "opt_pretty").as_deref(), Some("true"));
    }
}

#[tokio::test]
async fn test_failed_iteration_is_recorded_and_loop_continues() {
    let session = session();
    three_step_sequence(&session);
    let transport = ScriptedTransport::new(|request| {
        if path_of(&request.url) == "/projects/p3/tasks" {
            return Ok(HttpResponse::json(
                403,
                &json!({"errors": [{"message": "Forbidden"}]}),
            ));
        }
        workspace_api(request)
    });

    let results = executor(&session, transport.clone()).run_all().await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[2].is_success());

    let summary = results[2].iteration_summary().unwrap();
    assert_eq!(summary.total_iterations, 5);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);

    let gids: Vec<&str> = summary
        .unified_items
        .iter()
        .map(|item| item["gid"].as_str().unwrap())
        .collect();
    assert_eq!(
        gids,
        vec!["p1-t1", "p1-t2", "p2-t1", "p2-t2", "p4-t1", "p4-t2", "p5-t1", "p5-t2"]
    );

    let failed = &summary.iterations[2];
    assert_eq!(failed.state, IterationState::Failed);
    assert_eq!(failed.http_status, Some(403));
    assert_eq!(failed.error.as_deref(), Some("API error (403): Forbidden"));
    assert_eq!(failed.item["gid"], "p3");
}

#[tokio::test]
async fn test_network_failure_in_one_iteration() {
    let session = session();
    three_step_sequence(&session);
    let transport = ScriptedTransport::new(|request| {
        if path_of(&request.url) == "/projects/p3/tasks" {
            return Err(RequestError::NetworkError("Connection refused".to_string()));
        }
        workspace_api(request)
    });

    let results = executor(&session, transport.clone()).run_all().await.unwrap();
    assert!(results[2].is_success());

    let summary = results[2].iteration_summary().unwrap();
    assert_eq!(summary.total_iterations, 5);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);

    let gids: Vec<&str> = summary
        .unified_items
        .iter()
        .map(|item| item["gid"].as_str().unwrap())
        .collect();
    assert_eq!(
        gids,
        vec!["p1-t1", "p1-t2", "p2-t1", "p2-t2", "p4-t1", "p4-t2", "p5-t1", "p5-t2"]
    );

    let failed = &summary.iterations[2];
    assert_eq!(failed.state, IterationState::Failed);
    assert_eq!(failed.http_status, None);
    assert!(failed.error.as_deref().unwrap().starts_with("Network error"));
    assert!(failed.error.as_deref().unwrap().contains("Connection refused"));
    assert_eq!(summary.iterations[3].state, IterationState::Succeeded);

    // Every project was attempted, including the ones after the failure.
    assert_eq!(
        transport
            .paths()
            .iter()
            .filter(|p| p.starts_with("/projects/"))
            .count(),
        5
    );
}

#[tokio::test]
async fn test_discrete_iteration_keeps_one_entry_per_call() {
    let session = session();
    let ids = three_step_sequence(&session);
    session
        .lock()
        .step_mut(&ids[2])
        .unwrap()
        .iteration
        .unify_results = false;

    let results = executor(&session, ScriptedTransport::new(workspace_api))
        .run_all()
        .await
        .unwrap();

    let summary = results[2].iteration_summary().unwrap();
    assert_eq!(summary.unified_items.len(), 5);
    assert!(summary.unified_items.iter().all(Value::is_array));
}

#[tokio::test]
async fn test_run_all_halts_on_first_failure() {
    let session = session();
    let (a, b, c) = {
        let mut s = session.lock();
        let a = s.add_step(endpoint(HttpMethod::GET, "/users/me"));
        let b = s.add_step(endpoint(HttpMethod::GET, "/workspaces"));
        let c = s.add_step(endpoint(HttpMethod::GET, "/users/me"));
        (a, b, c)
    };
    let transport = ScriptedTransport::new(|request| match path_of(&request.url).as_str() {
        "/workspaces" => Ok(HttpResponse::json(
            500,
            &json!({"errors": [{"message": "Server Error"}]}),
        )),
        _ => ok(json!({"data": {"gid": "me"}})),
    });

    let results = executor(&session, transport.clone()).run_all().await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_success());
    assert_eq!(results[1].http_status(), Some(500));
    assert_eq!(results[1].message(), Some("API error (500): Server Error"));
    assert_eq!(transport.requests().len(), 2);

    let s = session.lock();
    assert!(s.step(&a).unwrap().has_run());
    assert!(s.step(&b).unwrap().has_run());
    assert_eq!(s.step(&c).unwrap().execution_state, ExecutionState::NotRun);
    assert!(s.step(&c).unwrap().result.is_none());
    assert!(!s.is_sequence_running());
}

#[tokio::test]
async fn test_missing_required_parameter_fails_without_request() {
    let session = session();
    let id = session
        .lock()
        .add_step(endpoint(HttpMethod::GET, "/projects/{project_gid}/tasks"));
    let transport = ScriptedTransport::new(workspace_api);

    let result = executor(&session, transport.clone()).run_step(&id).await.unwrap();
    assert_eq!(
        result.message(),
        Some(StepError::MissingRequiredParameter("project_gid".to_string()).to_string().as_str())
    );
    assert_eq!(result.http_status(), None);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_unknown_reference_becomes_step_failure() {
    let session = session();
    let id = {
        let mut s = session.lock();
        let id = s.add_step(endpoint(HttpMethod::GET, "/workspaces/{workspace_gid}/projects"));
        s.step_mut(&id)
            .unwrap()
            .map_variable("workspace_gid", "step7.data[0].gid");
        id
    };

    let result = executor(&session, ScriptedTransport::new(workspace_api))
        .run_step(&id)
        .await
        .unwrap();
    assert!(result.is_failure());
    assert!(result.message().unwrap().contains("step7"));
    assert!(session.lock().step(&id).unwrap().has_run());
}

#[tokio::test]
async fn test_iteration_source_must_be_array() {
    let session = session();
    let ids = three_step_sequence(&session);
    session.lock().step_mut(&ids[2]).unwrap().iteration =
        IterationConfig::over(format!("{}.data[0]", ids[1]));

    let results = executor(&session, ScriptedTransport::new(workspace_api))
        .run_all()
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[2].is_failure());
    assert!(results[2].message().unwrap().contains("did not resolve to an array"));
}

#[tokio::test]
async fn test_iteration_source_cannot_reference_later_step() {
    let session = session();
    let ids = three_step_sequence(&session);
    session.lock().step_mut(&ids[1]).unwrap().iteration = IterationConfig::over("step2.data");

    let transport = ScriptedTransport::new(workspace_api);
    let results = executor(&session, transport.clone()).run_all().await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results[1].message().unwrap().contains("must reference a step before position 1"));
    assert_eq!(transport.paths(), vec!["/workspaces"]);
}

#[tokio::test]
async fn test_body_placeholders_receive_typed_values() {
    let session = session();
    let (_, create) = {
        let mut s = session.lock();
        let me = s.add_step(endpoint(HttpMethod::GET, "/users/me"));
        let create = s.add_step(endpoint(HttpMethod::POST, "/tasks"));
        s.step_mut(&create).unwrap().set_body(
            r#"{"data": {"assignee": "{{step0.data.gid}}", "followers": "{{step0.data.ids}}", "name": "Task for {{step0.data.name}}"}}"#,
        );
        (me, create)
    };
    let transport = ScriptedTransport::new(|request| match request.method {
        HttpMethod::GET => ok(json!({"data": {"gid": "u1", "name": "Ada", "ids": [1, 2]}})),
        _ => Ok(HttpResponse::json(201, &json!({"data": {"gid": "t9"}}))),
    });

    let results = executor(&session, transport.clone()).run_all().await.unwrap();
    assert_eq!(results[1].http_status(), Some(201));

    let sent = &transport.requests()[1];
    assert_eq!(sent.header("content-type"), Some("application/json"));
    let body: Value = serde_json::from_str(sent.body.as_deref().unwrap()).unwrap();
    assert_eq!(
        body,
        json!({"data": {"assignee": "u1", "followers": [1, 2], "name": "Task for Ada"}})
    );
    assert!(session.lock().step(&create).unwrap().has_run());
}

#[tokio::test]
async fn test_bearer_token_attached_to_requests() {
    let session = session();
    {
        let mut s = session.lock();
        assert!(s.set_token("Bearer 1/abc"));
        s.add_step(endpoint(HttpMethod::GET, "/users/me"));
    }
    let transport = ScriptedTransport::new(|_| ok(json!({"data": {}})));

    executor(&session, transport.clone()).run_all().await.unwrap();
    assert_eq!(
        transport.requests()[0].header("authorization"),
        Some("Bearer 1/abc")
    );
}

#[tokio::test]
async fn test_concurrent_run_of_same_step_is_rejected() {
    let session = session();
    let id = session.lock().add_step(endpoint(HttpMethod::GET, "/users/me"));
    let transport = ScriptedTransport::with_delay(Duration::from_millis(50), |_| {
        ok(json!({"data": {"gid": "me"}}))
    });
    let executor = executor(&session, transport.clone());

    let (first, second) = tokio::join!(executor.run_step(&id), executor.run_step(&id));
    assert!(first.unwrap().is_success());
    assert_eq!(second, Err(StepError::AlreadyRunning(id.clone())));
    assert_eq!(transport.requests().len(), 1);
    assert!(!session.lock().is_running(&id));
}

#[tokio::test]
async fn test_rerun_replaces_previous_result() {
    let session = session();
    let id = session.lock().add_step(endpoint(HttpMethod::GET, "/users/me"));
    let executor = executor(&session, ScriptedTransport::new(|_| ok(json!({"data": {"gid": "me"}}))));

    executor.run_step(&id).await.unwrap();
    executor.run_step(&id).await.unwrap();

    let s = session.lock();
    assert_eq!(s.results().len(), 1);
    assert_eq!(s.resolve("step0.data.gid").unwrap(), json!("me"));
}

#[tokio::test]
async fn test_transformation_of_final_result() {
    let session = session();
    three_step_sequence(&session);
    executor(&session, ScriptedTransport::new(workspace_api))
        .run_all()
        .await
        .unwrap();

    let mut s = session.lock();
    s.set_field_mappings(vec![FieldMapping::new("gid", "id")]);
    s.set_unified_columns(vec![UnifiedColumn::new("label", "{name} ({gid})")]);

    let records = s.transformed_records();
    assert_eq!(records.len(), 10);
    assert_eq!(records[0].get("id"), Some(&json!("p1-t1")));
    assert_eq!(records[0].get("label"), Some(&json!("First (p1-t1)")));

    let table = s.transformed_table();
    assert_eq!(table.columns, vec!["id", "label"]);
    assert_eq!(table.rows[1], vec!["p1-t2", "Second (p1-t2)"]);
}
