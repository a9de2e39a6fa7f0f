//! Sequence files: export from one session, import into another and replay.

use super::{catalog, endpoint, executor, ok, path_of, query_of, session, ScriptedTransport, BASE_URL};
use rest_sequencer::executor::RequestError;
use rest_sequencer::export::{ImportError, SequenceFile};
use rest_sequencer::models::{HttpMethod, HttpRequest, HttpResponse, IterationConfig};
use rest_sequencer::transform::{FieldMapping, UnifiedColumn};
use rest_sequencer::{Session, SessionHandle};
use serde_json::{json, Value};
use std::time::Duration;

fn api(request: &HttpRequest) -> Result<HttpResponse, RequestError> {
    match path_of(&request.url).as_str() {
        "/workspaces" => ok(json!({"data": [{"gid": "w1"}, {"gid": "w2"}]})),
        "/workspaces/w1/projects" => ok(json!({"data": [{"gid": "p1", "name": "Roadmap"}]})),
        "/workspaces/w2/projects" => ok(json!({"data": [{"gid": "p2", "name": "Hiring"}]})),
        _ => ok(json!({"data": []})),
    }
}

/// Workspaces, then projects for every workspace, with a transformation.
fn authored_session() -> SessionHandle {
    let session = session();
    {
        let mut s = session.lock();
        let workspaces = s.add_step(endpoint(HttpMethod::GET, "/workspaces"));
        let projects = s.add_step(endpoint(HttpMethod::GET, "/workspaces/{workspace_gid}/projects"));
        let step = s.step_mut(&projects).unwrap();
        step.iteration = IterationConfig::over(format!("{workspaces}.data"));
        step.iteration.loop_variable = "ws".to_string();
        step.set_path_param("workspace_gid", "{{ws.gid}}");
        step.set_query_param("opt_fields", format!("name,{{{{{workspaces}.data[0].gid}}}}"));

        s.set_field_mappings(vec![FieldMapping::new("name", "Project")]);
        s.set_unified_columns(vec![UnifiedColumn::new("Ref", "#{gid}")]);
    }
    session
}

#[tokio::test]
async fn test_exported_sequence_replays_in_fresh_session() {
    let original = authored_session();
    let text = original
        .lock()
        .export_sequence("Projects", "every project")
        .to_json_pretty()
        .unwrap();

    let original_transport = ScriptedTransport::new(api);
    executor(&original, original_transport.clone())
        .run_all()
        .await
        .unwrap();

    let replay = SessionHandle::new(Session::new(catalog()));
    let report = replay.lock().import_sequence(&text).unwrap();
    assert_eq!(report.loaded, 2);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.placeholders, 0);
    assert_eq!(replay.lock().base_url(), BASE_URL);

    let replay_transport = ScriptedTransport::new(api);
    let results = executor(&replay, replay_transport.clone())
        .run_all()
        .await
        .unwrap();

    let sent: Vec<String> = replay_transport.requests().into_iter().map(|r| r.url).collect();
    let expected: Vec<String> = original_transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(sent, expected);
    assert_eq!(sent.len(), 3);

    let summary = results[1].iteration_summary().unwrap();
    assert_eq!(summary.succeeded, 2);

    let table = replay.lock().transformed_table();
    assert_eq!(table.columns, vec!["Project", "Ref"]);
    assert_eq!(
        table.rows,
        vec![vec!["Roadmap", "#p1"], vec!["Hiring", "#p2"]]
    );
}

#[test]
fn test_exported_file_contains_only_stable_references() {
    let session = authored_session();
    let (file, ids) = {
        let s = session.lock();
        (s.export_sequence("Projects", ""), s.step_ids())
    };
    let text = file.to_json_pretty().unwrap();

    for id in &ids {
        assert!(!text.contains(id.as_str()), "runtime id {id} leaked into export");
    }

    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["version"], "1.0");
    assert_eq!(value["sequence"][1]["iteration"]["sourceExpression"], "step0.data");
    assert_eq!(value["sequence"][1]["iteration"]["loopVariable"], "ws");
    assert_eq!(
        value["sequence"][1]["parameters"]["query"]["opt_fields"],
        "name,{{step0.data[0].gid}}"
    );
    assert_eq!(
        value["dataTransformations"]["fieldMappings"][0]["targetField"],
        "Project"
    );
    assert_eq!(value["baseUrl"], BASE_URL);

    let parsed: SequenceFile = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, file);
}

#[test]
fn test_import_replaces_existing_sequence() {
    let session = authored_session();
    let text = json!({
        "version": "1.0",
        "name": "Me",
        "sequence": [{"method": "GET", "path": "/users/me"}],
        "timestamp": "2025-01-01T00:00:00Z",
        "baseUrl": "https://other.example.test/api/1.0"
    })
    .to_string();

    let mut s = session.lock();
    let report = s.import_sequence(&text).unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(s.len(), 1);
    assert_eq!(s.step_at(0).unwrap().endpoint.path, "/users/me");
    assert!(s.field_mappings().is_empty());
    assert!(s.unified_columns().is_empty());
    assert_eq!(s.base_url(), "https://other.example.test/api/1.0");
}

#[test]
fn test_import_rejects_document_without_sequence() {
    let session = authored_session();
    let mut s = session.lock();

    assert!(matches!(
        s.import_sequence("{\"name\": \"x\"}"),
        Err(ImportError::MissingSequence)
    ));
    assert!(matches!(s.import_sequence("not json"), Err(ImportError::InvalidJson(_))));
    // A rejected import leaves the current sequence alone.
    assert_eq!(s.len(), 2);
}

#[tokio::test]
async fn test_import_refused_while_running() {
    let session = session();
    session.lock().add_step(endpoint(HttpMethod::GET, "/users/me"));
    let transport = ScriptedTransport::with_delay(Duration::from_millis(50), |_| ok(json!({"data": {}})));
    let executor = executor(&session, transport);

    let text = json!({"sequence": []}).to_string();
    let import = async {
        tokio::task::yield_now().await;
        session.lock().import_sequence(&text).map(|r| r.loaded)
    };

    let (results, imported) = tokio::join!(executor.run_all(), import);
    assert_eq!(results.unwrap().len(), 1);
    assert!(matches!(imported, Err(ImportError::Busy)));
    assert_eq!(session.lock().len(), 1);
}

#[tokio::test]
async fn test_placeholder_steps_still_run() {
    let text = json!({
        "sequence": [
            {"method": "GET", "path": "/users/me"},
            {
                "method": "GET",
                "path": "/users/{user_gid}/favorites",
                "summary": "Get a user's favorites",
                "variableMappings": {"user_gid": "step0.data.gid"},
                "parameters": {"query": {"resource_type": "project"}}
            }
        ]
    })
    .to_string();

    let session = session();
    let report = session.lock().import_sequence(&text).unwrap();
    assert_eq!(report.placeholders, 1);
    assert!(session.lock().step_at(1).unwrap().is_imported_placeholder);

    let transport = ScriptedTransport::new(|request| match path_of(&request.url).as_str() {
        "/users/me" => ok(json!({"data": {"gid": "u42"}})),
        _ => ok(json!({"data": [{"gid": "fav"}]})),
    });
    let results = executor(&session, transport.clone()).run_all().await.unwrap();

    assert!(results.iter().all(|r| r.is_success()));
    let favorites = &transport.requests()[1];
    assert_eq!(path_of(&favorites.url), "/users/u42/favorites");
    assert_eq!(
        query_of(&favorites.url, "resource_type").as_deref(),
        Some("project")
    );
}
