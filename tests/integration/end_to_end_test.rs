//! End-to-end runs over real HTTP against a mock API server.

use super::init_test_env;
use rest_sequencer::catalog::EndpointCatalog;
use rest_sequencer::executor::{ExecutionConfig, SequenceExecutor};
use rest_sequencer::models::{EndpointDescriptor, HttpMethod, IterationConfig};
use rest_sequencer::transform::{FieldMapping, UnifiedColumn};
use rest_sequencer::{Session, SessionHandle};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "1/9876543210:e2e";

async fn mock_api() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.0/users/me"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .and(query_param("opt_pretty", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "gid": "u1",
                "name": "Ada",
                "workspaces": [{"gid": "w1", "name": "Acme"}, {"gid": "w2", "name": "Globex"}]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    for (workspace, project) in [("w1", "Roadmap"), ("w2", "Hiring")] {
        Mock::given(method("GET"))
            .and(path(format!("/api/1.0/workspaces/{workspace}/projects")))
            .and(query_param("limit", "100"))
            .and(query_param("opt_fields", "name,owner.name"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{
                    "gid": format!("{workspace}-p"),
                    "name": project,
                    "owner": {"gid": "u1", "name": "Ada"}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path("/api/1.0/tasks"))
        .and(body_json(json!({"data": {"name": "Review Roadmap", "projects": ["w1-p"]}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"gid": "t1", "name": "Review Roadmap"}
        })))
        .mount(&server)
        .await;

    server
}

fn catalog() -> EndpointCatalog {
    EndpointCatalog::new(vec![
        EndpointDescriptor::new(HttpMethod::GET, "/users/me"),
        EndpointDescriptor::new(HttpMethod::GET, "/workspaces/{workspace_gid}/projects"),
        EndpointDescriptor::new(HttpMethod::POST, "/tasks"),
    ])
}

fn executor(session: &SessionHandle) -> SequenceExecutor {
    SequenceExecutor::with_reqwest(session.clone(), ExecutionConfig::new(5_000))
        .unwrap()
        .with_step_delay(Duration::from_millis(10))
}

#[tokio::test]
async fn test_full_sequence_over_http() {
    init_test_env();
    let server = mock_api().await;

    let session = SessionHandle::new(
        Session::new(catalog()).with_base_url(format!("{}/api/1.0", server.uri())),
    );
    {
        let mut s = session.lock();
        assert!(s.set_token(TOKEN));

        let me = s.add_step(catalog().endpoints()[0].clone());
        let projects = s.add_step(catalog().endpoints()[1].clone());
        let task = s.add_step(catalog().endpoints()[2].clone());

        let step = s.step_mut(&projects).unwrap();
        step.iteration = IterationConfig::over(format!("{me}.data.workspaces"));
        step.iteration.loop_variable = "workspace".to_string();
        step.map_variable("workspace_gid", "workspace.gid");
        step.set_query_param("opt_fields", "name,owner.name");

        s.step_mut(&task).unwrap().set_body(
            r#"{"data": {"name": "Review {{step1.data[0].name}}", "projects": ["{{step1.data[0].gid}}"]}}"#,
        );
    }

    let results = executor(&session).run_all().await.unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_success()), "{results:?}");
    assert_eq!(results[2].http_status(), Some(201));

    let summary = results[1].iteration_summary().unwrap();
    assert_eq!((summary.total_iterations, summary.succeeded), (2, 2));

    let mut s = session.lock();
    assert_eq!(s.resolve("step2.data.gid").unwrap(), json!("t1"));

    // Transform the last step that produced records: the created task.
    assert_eq!(s.auto_populate_field_mappings(), 2);
    let table = s.transformed_table();
    assert_eq!(table.columns, vec!["gid", "name"]);
    assert_eq!(table.rows, vec![vec!["t1", "Review Roadmap"]]);

    drop(s);
    server.verify().await;
}

#[tokio::test]
async fn test_iterated_projects_to_csv() {
    init_test_env();
    let server = mock_api().await;

    let session = SessionHandle::new(
        Session::new(catalog()).with_base_url(format!("{}/api/1.0", server.uri())),
    );
    {
        let mut s = session.lock();
        s.set_token(&format!("Bearer {TOKEN}"));
        s.add_step(catalog().endpoints()[0].clone());
        let projects = s.add_step(catalog().endpoints()[1].clone());
        let step = s.step_mut(&projects).unwrap();
        step.iteration = IterationConfig::over("step0.data.workspaces");
        step.set_path_param("workspace_gid", "{{item.gid}}");
        step.set_query_param("opt_fields", "name,owner.name");

        s.set_field_mappings(vec![
            FieldMapping::new("name", "Project"),
            FieldMapping::new("owner.name", "Owner"),
        ]);
        s.set_unified_columns(vec![UnifiedColumn::new("Link", "projects/{gid}")]);
    }

    let executor = executor(&session);
    let me = session.lock().step_ids()[0].clone();
    executor.run_step(&me).await.unwrap();
    let projects = session.lock().step_ids()[1].clone();
    let result = executor.run_step(&projects).await.unwrap();
    assert_eq!(result.iteration_summary().unwrap().unified_items.len(), 2);

    let csv = session.lock().transformed_table().to_csv_string().unwrap();
    assert_eq!(
        csv,
        "Project,Owner,Link\nRoadmap,Ada,projects/w1-p\nHiring,Ada,projects/w2-p\n"
    );
}

#[tokio::test]
async fn test_api_error_envelope_reported() {
    init_test_env();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/1.0/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [{"message": "Not Authorized", "help": "Check your token"}]
        })))
        .mount(&server)
        .await;

    let session = SessionHandle::new(
        Session::new(catalog()).with_base_url(format!("{}/api/1.0", server.uri())),
    );
    let id = session.lock().add_step(catalog().endpoints()[0].clone());

    let result = executor(&session).run_step(&id).await.unwrap();
    assert_eq!(result.http_status(), Some(401));
    assert_eq!(result.message(), Some("API error (401): Not Authorized"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_unreachable_host_is_network_failure() {
    init_test_env();
    let session = SessionHandle::new(
        Session::new(catalog()).with_base_url("http://127.0.0.1:9/api/1.0"),
    );
    let id = session.lock().add_step(catalog().endpoints()[0].clone());

    let result = executor(&session).run_step(&id).await.unwrap();
    assert!(result.is_failure());
    assert_eq!(result.http_status(), None);
    assert!(result.message().unwrap().starts_with("Network error"));
}
