//! End-to-end tests against a fake Plane server.
//!
//! These tests drive the real HTTP client and the whole pipeline, from
//! project lookup to the Markdown file on disk.

use chrono::Utc;
use plane_sync::config::Config;
use plane_sync::error::ErrorKind;
use plane_sync::plane::PlaneClient;
use plane_sync::sync::{self, SyncRequest};
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "plane_api_integration";
const WS: &str = "/api/v1/workspaces/acme";

/// Config pointing at the mock server with fast retries.
fn test_config(server: &MockServer, temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.plane.base_url = server.uri();
    config.plane.api_key = API_KEY.to_string();
    config.plane.workspace_slug = "acme".to_string();
    config.user.email = Some("ada@example.com".to_string());
    config.http.base_delay_ms = 10;
    config.http.max_delay_ms = 50;
    config.http.timeout_secs = 5;
    config.cache.dir = temp.path().join("cache");
    config
}

fn request(project: &str) -> SyncRequest {
    SyncRequest {
        project: project.to_string(),
        ..SyncRequest::default()
    }
}

fn projects_body() -> Value {
    json!({
        "results": [
            {"id": "11111111-2222-3333-4444-555555555555", "identifier": "MOB", "name": "Mobile App"},
            {"id": "66666666-7777-8888-9999-000000000000", "identifier": "WEB", "name": "Website"}
        ],
        "next_page_results": false
    })
}

fn issue(seq: u64, priority: &str, state: &str, group: &str, assignees: Value) -> Value {
    json!({
        "id": format!("issue-{}", seq),
        "name": format!("Issue number {}", seq),
        "description_stripped": format!("Body of issue {}", seq),
        "priority": priority,
        "sequence_id": seq,
        "state": {"id": format!("state-{}", state), "name": state, "group": group},
        "assignees": assignees,
        "updated_at": "2024-03-09T10:00:00Z"
    })
}

fn members_body() -> Value {
    json!([
        {"member": {"id": "u1", "display_name": "ada", "first_name": "Ada", "email": "ada@example.com"}},
        {"member": {"id": "u2", "display_name": "grace", "email": "grace@example.com"}}
    ])
}

fn issues_path() -> String {
    format!("{}/projects/11111111-2222-3333-4444-555555555555/issues/", WS)
}

async fn mount_projects(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("{}/projects/", WS)))
        .and(header("X-API-Key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(projects_body()))
        .mount(server)
        .await;
}

async fn mount_two_issue_pages(server: &MockServer) {
    // Cursor-specific page first so it takes precedence
    Mock::given(method("GET"))
        .and(path(issues_path()))
        .and(query_param("cursor", "100:1:0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [issue(3, "low", "Todo", "unstarted", json!([]))],
            "next_cursor": "100:2:0",
            "next_page_results": false
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(issues_path()))
        .and(query_param("expand", "assignees,state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                issue(2, "high", "Done", "completed", json!(["u2"])),
                issue(1, "urgent", "In Progress", "started", json!([{"id": "u1"}]))
            ],
            "next_cursor": "100:1:0",
            "next_page_results": true
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_members(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("{}/members/", WS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(members_body()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn sync_writes_filtered_report_end_to_end() {
    let server = MockServer::start().await;
    mount_projects(&server).await;
    mount_two_issue_pages(&server).await;
    mount_members(&server, 1).await;

    let temp = TempDir::new().unwrap();
    let config = test_config(&server, &temp);
    let client = PlaneClient::from_config(&config).unwrap();

    let mut req = request("mob");
    req.template = Some("ai-context".to_string());
    let outcome = sync::run(&config, temp.path(), &req, &client, Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome.project_identifier, "MOB");
    assert_eq!(outcome.project_name, "Mobile App");
    assert_eq!(outcome.total_tasks, 3);
    assert_eq!(outcome.filtered_tasks, 3);
    assert!(outcome.users_refreshed);

    let md = std::fs::read_to_string(&outcome.output_path).unwrap();
    assert!(md.starts_with("# Mobile App (MOB): Task Context"));
    assert!(md.contains("**Total tasks**: 3"));
    assert!(md.contains("33.3% complete"));
    assert!(md.contains("| MOB-1 | Issue number 1 | Urgent | In Progress | ada | 2024-03-09 |"));
    assert!(md.contains("Body of issue 3"));

    // Urgent before high before low
    let p1 = md.find("| MOB-1 |").unwrap();
    let p2 = md.find("| MOB-2 |").unwrap();
    let p3 = md.find("| MOB-3 |").unwrap();
    assert!(p1 < p2 && p2 < p3);

    assert!(temp.path().join("cache").join("users.json").exists());
}

#[tokio::test]
async fn my_tasks_keeps_totals_for_whole_project() {
    let server = MockServer::start().await;
    mount_projects(&server).await;
    mount_two_issue_pages(&server).await;
    mount_members(&server, 1).await;

    let temp = TempDir::new().unwrap();
    let config = test_config(&server, &temp);
    let client = PlaneClient::from_config(&config).unwrap();

    let mut req = request("Mobile App");
    req.my_tasks = true;
    req.template = Some("brief".to_string());
    let outcome = sync::run(&config, temp.path(), &req, &client, Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome.total_tasks, 3);
    assert_eq!(outcome.filtered_tasks, 1);
    let md = std::fs::read_to_string(&outcome.output_path).unwrap();
    assert!(md.contains("1/3 done"));
    assert!(md.contains("**MOB-1**"));
    assert!(!md.contains("**MOB-2**"));
}

#[tokio::test]
async fn fresh_cache_is_reused_across_runs() {
    let server = MockServer::start().await;
    mount_projects(&server).await;
    Mock::given(method("GET"))
        .and(path(issues_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [issue(1, "urgent", "In Progress", "started", json!(["u1"]))],
            "next_page_results": false
        })))
        .mount(&server)
        .await;
    // One fetch for both runs
    mount_members(&server, 1).await;

    let temp = TempDir::new().unwrap();
    let config = test_config(&server, &temp);
    let client = PlaneClient::from_config(&config).unwrap();

    let first = sync::run(&config, temp.path(), &request("MOB"), &client, Utc::now())
        .await
        .unwrap();
    assert!(first.users_refreshed);

    let second = sync::run(&config, temp.path(), &request("MOB"), &client, Utc::now())
        .await
        .unwrap();
    assert!(!second.users_refreshed);

    let md = std::fs::read_to_string(&second.output_path).unwrap();
    assert!(md.contains("| ada |"));
}

#[tokio::test]
async fn rejected_api_key_fails_without_retry_or_output() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/projects/", WS)))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid API key"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = test_config(&server, &temp);
    let client = PlaneClient::from_config(&config).unwrap();

    let err = sync::run(&config, temp.path(), &request("MOB"), &client, Utc::now())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(err.details.as_deref(), Some("Invalid API key"));
    assert!(err.report().starts_with("error[AUTH]:"));
    assert!(!temp.path().join("plane.md").exists());
}

#[tokio::test]
async fn rate_limit_waits_for_retry_after() {
    let server = MockServer::start().await;
    mount_projects(&server).await;
    mount_members(&server, 1).await;

    Mock::given(method("GET"))
        .and(path(issues_path()))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(issues_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [issue(1, "high", "Todo", "unstarted", json!([]))],
            "next_page_results": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = test_config(&server, &temp);
    let client = PlaneClient::from_config(&config).unwrap();

    let start = Instant::now();
    let outcome = sync::run(&config, temp.path(), &request("MOB"), &client, Utc::now())
        .await
        .unwrap();

    assert_eq!(outcome.total_tasks, 1);
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn persistent_server_errors_exhaust_attempts() {
    let server = MockServer::start().await;
    mount_projects(&server).await;
    Mock::given(method("GET"))
        .and(path(issues_path()))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let config = test_config(&server, &temp);
    let client = PlaneClient::from_config(&config).unwrap();

    let err = sync::run(&config, temp.path(), &request("MOB"), &client, Utc::now())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Transient);
    assert!(!temp.path().join("plane.md").exists());
}

#[tokio::test]
async fn unknown_project_is_not_found() {
    let server = MockServer::start().await;
    mount_projects(&server).await;

    let temp = TempDir::new().unwrap();
    let config = test_config(&server, &temp);
    let client = PlaneClient::from_config(&config).unwrap();

    let err = sync::run(&config, temp.path(), &request("OPS"), &client, Utc::now())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}
