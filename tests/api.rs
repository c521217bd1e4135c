use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use axum_test::TestServer;
use serde_json::{json, Value};

use fleetdeck::api::{create_router, AppState};
use fleetdeck::config::{Config, GatewayConfig};
use fleetdeck_core::db::Database;

fn server_with_config(config: Config) -> (TestServer, Database) {
    let db = Database::open_in_memory().expect("open db");
    db.migrate().expect("migrate");
    let app = create_router(AppState::new(db.clone(), &config));
    (TestServer::new(app).expect("test server"), db)
}

fn server() -> (TestServer, Database) {
    server_with_config(Config::default())
}

/// Serve a stub session gateway on an ephemeral port and return its config.
async fn stub_gateway(app: Router) -> GatewayConfig {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    GatewayConfig { base_url: format!("http://{addr}"), token: "test-token".to_string() }
}

#[tokio::test]
async fn health_endpoint_answers() {
    let (server, _db) = server();
    let resp = server.get("/healthz").await;
    resp.assert_status_ok();
}

#[tokio::test]
async fn agent_with_initial_task_then_completion_report_reaches_review() {
    let (server, _db) = server();

    // create agent with an initial task
    let resp = server
        .post("/agents")
        .json(&json!({ "name": "Bot-1", "task": "Fix bug #42" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["agent"]["status"], json!("working"));
    let agent_id = body["agent"]["id"].as_str().expect("agent id").to_string();
    let task_id = body["task"]["id"].as_str().expect("task id").to_string();
    assert_eq!(body["task"]["title"], json!("Fix bug #42"));
    assert_eq!(body["task"]["status"], json!("in-progress"));
    assert_eq!(body["task"]["assigned_to"], json!(agent_id.clone()));

    // exactly one task, assigned to the agent, in progress
    let resp = server.get("/tasks").add_query_param("agent", &agent_id).await;
    resp.assert_status_ok();
    let tasks = resp.json::<Value>()["tasks"].as_array().expect("tasks").clone();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["status"], json!("in-progress"));
    assert_eq!(tasks[0]["assigned_name"], json!("Bot-1"));

    // derived counts on the agent listing
    let resp = server.get("/agents").await;
    let agents = resp.json::<Value>()["agents"].as_array().expect("agents").clone();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0]["active_tasks"], json!(1));
    assert_eq!(agents[0]["unread_reports"], json!(0));

    // a completion report drives the task to review
    let resp = server
        .post("/reports")
        .json(&json!({
            "agent_id": agent_id,
            "task_id": task_id,
            "type": "completion",
            "title": "Done",
        }))
        .await;
    resp.assert_status_ok();

    let resp = server.get("/tasks").add_query_param("status", "review").await;
    let tasks = resp.json::<Value>()["tasks"].as_array().expect("tasks").clone();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], json!(task_id));
}

#[tokio::test]
async fn agent_without_task_is_idle() {
    let (server, _db) = server();

    let resp = server.post("/agents").json(&json!({ "name": "Bot-2" })).await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["agent"]["status"], json!("idle"));
    assert_eq!(body["task"], json!(null));

    let resp = server.get("/tasks").await;
    assert!(resp.json::<Value>()["tasks"].as_array().expect("tasks").is_empty());
}

#[tokio::test]
async fn agent_creation_requires_a_name() {
    let (server, _db) = server();
    let resp = server.post("/agents").json(&json!({ "task": "orphan work" })).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"], json!("name is required"));
}

#[tokio::test]
async fn terminating_an_agent_releases_its_open_tasks() {
    let (server, _db) = server();

    let resp = server
        .post("/agents")
        .json(&json!({ "name": "Bot-3", "task": "Open work" }))
        .await;
    let agent_id = resp.json::<Value>()["agent"]["id"]
        .as_str()
        .expect("agent id")
        .to_string();

    // a second, already-completed task keeps its attribution
    let resp = server
        .post("/tasks")
        .json(&json!({ "title": "Finished work", "assigned_to": agent_id }))
        .await;
    let done_id = resp.json::<Value>()["task"]["id"].as_str().expect("task id").to_string();
    server
        .patch("/tasks")
        .json(&json!({ "id": done_id, "status": "completed" }))
        .await
        .assert_status_ok();

    // missing and unknown ids are client errors
    server.delete("/agents").await.assert_status(StatusCode::BAD_REQUEST);
    server
        .delete("/agents")
        .add_query_param("id", "agent-missing")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .delete("/agents")
        .add_query_param("id", &agent_id)
        .await
        .assert_status_ok();

    let resp = server.get("/agents").await;
    let agents = resp.json::<Value>()["agents"].as_array().expect("agents").clone();
    assert_eq!(agents[0]["status"], json!("terminated"));

    let resp = server.get("/tasks").add_query_param("agent", &agent_id).await;
    let still_mine = resp.json::<Value>()["tasks"].as_array().expect("tasks").clone();
    assert_eq!(still_mine.len(), 1, "only the completed task stays assigned");
    assert_eq!(still_mine[0]["id"], json!(done_id));
}

#[tokio::test]
async fn task_updates_validate_status_and_stamp_timestamps() {
    let (server, _db) = server();

    let resp = server.post("/tasks").json(&json!({ "title": "stamps" })).await;
    resp.assert_status_ok();
    let task_id = resp.json::<Value>()["task"]["id"].as_str().expect("task id").to_string();

    server
        .patch("/tasks")
        .json(&json!({ "id": task_id, "status": "doing-it" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .patch("/tasks")
        .json(&json!({ "id": task_id }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .patch("/tasks")
        .json(&json!({ "id": "task-missing", "status": "review" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .patch("/tasks")
        .json(&json!({ "id": task_id, "status": "in-progress" }))
        .await
        .assert_status_ok();
    let resp = server.get("/tasks").add_query_param("status", "in-progress").await;
    let task = resp.json::<Value>()["tasks"][0].clone();
    assert!(task["started_at"].is_string());
    assert!(task["completed_at"].is_null());

    server
        .patch("/tasks")
        .json(&json!({ "id": task_id, "status": "completed" }))
        .await
        .assert_status_ok();
    let resp = server.get("/tasks").add_query_param("status", "completed").await;
    let task = resp.json::<Value>()["tasks"][0].clone();
    assert!(task["started_at"].is_string());
    assert!(task["completed_at"].is_string());
}

#[tokio::test]
async fn explicit_null_unassigns_while_absent_leaves_assignment_alone() {
    let (server, _db) = server();

    let resp = server.post("/agents").json(&json!({ "name": "Bot-4" })).await;
    let agent_id = resp.json::<Value>()["agent"]["id"]
        .as_str()
        .expect("agent id")
        .to_string();
    let resp = server
        .post("/tasks")
        .json(&json!({ "title": "assignable", "assigned_to": agent_id }))
        .await;
    let task_id = resp.json::<Value>()["task"]["id"].as_str().expect("task id").to_string();

    // status-only update: assignment untouched
    server
        .patch("/tasks")
        .json(&json!({ "id": task_id, "status": "review" }))
        .await
        .assert_status_ok();
    let resp = server.get("/tasks").add_query_param("agent", &agent_id).await;
    assert_eq!(resp.json::<Value>()["tasks"].as_array().expect("tasks").len(), 1);

    // explicit null: unassigned
    server
        .patch("/tasks")
        .json(&json!({ "id": task_id, "assigned_to": null }))
        .await
        .assert_status_ok();
    let resp = server.get("/tasks").add_query_param("agent", &agent_id).await;
    assert!(resp.json::<Value>()["tasks"].as_array().expect("tasks").is_empty());
}

#[tokio::test]
async fn task_listing_orders_by_priority_then_newest() {
    let (server, _db) = server();

    for (title, priority) in [
        ("low", "low"),
        ("critical-old", "critical"),
        ("medium", "medium"),
        ("high", "high"),
        ("critical-new", "critical"),
    ] {
        server
            .post("/tasks")
            .json(&json!({ "title": title, "priority": priority }))
            .await
            .assert_status_ok();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let resp = server.get("/tasks").await;
    let titles: Vec<String> = resp.json::<Value>()["tasks"]
        .as_array()
        .expect("tasks")
        .iter()
        .map(|t| t["title"].as_str().expect("title").to_string())
        .collect();
    assert_eq!(titles, ["critical-new", "critical-old", "high", "medium", "low"]);
}

#[tokio::test]
async fn report_endpoints_enforce_the_validation_taxonomy() {
    let (server, _db) = server();

    let resp = server.post("/reports").json(&json!({ "content": "no fields" })).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = resp.json();
    assert_eq!(body["error"], json!("Missing required fields: agent_id, type, title"));

    let resp = server.post("/agents").json(&json!({ "name": "Bot-5" })).await;
    let agent_id = resp.json::<Value>()["agent"]["id"]
        .as_str()
        .expect("agent id")
        .to_string();

    server
        .post("/reports")
        .json(&json!({ "agent_id": agent_id, "type": "gossip", "title": "hm" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/reports")
        .json(&json!({ "agent_id": "agent-missing", "type": "progress", "title": "hm" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let resp = server
        .post("/reports")
        .json(&json!({ "agent_id": agent_id, "type": "progress", "title": "Going fine" }))
        .await;
    resp.assert_status_ok();
    let report_id = resp.json::<Value>()["report"]["id"]
        .as_str()
        .expect("report id")
        .to_string();

    // PATCH validates both presence and the closed status set
    server
        .patch("/reports")
        .json(&json!({ "id": report_id }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .patch("/reports")
        .json(&json!({ "id": report_id, "status": "seen" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .patch("/reports")
        .json(&json!({ "id": "report-missing", "status": "read" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .patch("/reports")
        .json(&json!({ "id": report_id, "status": "read" }))
        .await
        .assert_status_ok();

    let resp = server.get("/reports").add_query_param("status", "read").await;
    let reports = resp.json::<Value>()["reports"].as_array().expect("reports").clone();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["agent_name"], json!("Bot-5"));
}

#[tokio::test]
async fn sync_without_a_token_is_an_explicit_error() {
    let (server, _db) = server();
    let resp = server.post("/sync-github").await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json();
    assert_eq!(body["error"], json!("GITHUB_TOKEN not configured"));
}

#[tokio::test]
async fn session_endpoints_require_a_configured_gateway() {
    let (server, _db) = server();
    server.get("/sessions").await.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    server
        .post("/agents/message")
        .json(&json!({ "agent_id": "agent-x", "message": "hello" }))
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn successful_spawn_commits_the_agent_as_working_with_a_session_key() {
    let stub = Router::new().route(
        "/v1/sessions/spawn",
        post(|| async { Json(json!({ "sessionKey": "sess-123" })) }),
    );
    let gateway = stub_gateway(stub).await;
    let (server, _db) = server_with_config(Config { github_token: None, gateway: Some(gateway) });

    let resp = server
        .post("/agents")
        .json(&json!({ "name": "Bot-6", "task": "Port the parser" }))
        .await;
    resp.assert_status_ok();
    let body: Value = resp.json();
    assert_eq!(body["agent"]["status"], json!("working"));
    assert_eq!(body["agent"]["session_key"], json!("sess-123"));
}

#[tokio::test]
async fn failed_spawn_leaves_the_agent_in_error_state() {
    let stub = Router::new().route(
        "/v1/sessions/spawn",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "gateway exploded") }),
    );
    let gateway = stub_gateway(stub).await;
    let (server, _db) = server_with_config(Config { github_token: None, gateway: Some(gateway) });

    let resp = server
        .post("/agents")
        .json(&json!({ "name": "Bot-7", "task": "Port the parser" }))
        .await;
    resp.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    // the reservation is settled, not rolled back: the row is visible in error
    let resp = server.get("/agents").await;
    let agents = resp.json::<Value>()["agents"].as_array().expect("agents").clone();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0]["status"], json!("error"));
    assert_eq!(agents[0]["session_key"], json!(null));
}

#[tokio::test]
async fn agents_without_a_session_cannot_be_messaged() {
    let stub = Router::new();
    let gateway = stub_gateway(stub).await;
    let (server, _db) = server_with_config(Config { github_token: None, gateway: Some(gateway) });

    let resp = server.post("/agents").json(&json!({ "name": "Bot-8" })).await;
    let agent_id = resp.json::<Value>()["agent"]["id"]
        .as_str()
        .expect("agent id")
        .to_string();

    server
        .post("/agents/message")
        .json(&json!({ "agent_id": agent_id, "message": "hello" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/agents/message")
        .json(&json!({ "agent_id": "agent-missing", "message": "hello" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn project_listing_embeds_tasks() {
    let (server, db) = server();
    db.upsert_synced_project(&fleetdeck_core::models::SyncedRepo {
        remote_id: 7,
        name: "gamma".to_string(),
        description: None,
        full_name: "octo/gamma".to_string(),
    })
    .expect("upsert");

    server
        .post("/tasks")
        .json(&json!({ "title": "for gamma", "project_id": "gh-7" }))
        .await
        .assert_status_ok();
    // unknown project reference is a client error
    server
        .post("/tasks")
        .json(&json!({ "title": "lost", "project_id": "gh-404" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let resp = server.get("/projects").await;
    resp.assert_status_ok();
    let projects = resp.json::<Value>()["projects"].as_array().expect("projects").clone();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["id"], json!("gh-7"));
    assert_eq!(projects[0]["status"], json!("active"));
    assert_eq!(projects[0]["pending_tasks"], json!(1));
    assert_eq!(projects[0]["tasks"].as_array().expect("tasks").len(), 1);
}
