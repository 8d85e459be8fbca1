//! In-process stand-in for the GCI program service.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

pub const API_KEY: &str = "test-key";
pub const COOKIE_VALUE: &str = "cookie-value";

#[derive(Clone)]
pub struct StubState {
    pub base_url: String,
    pub submitted: Arc<Mutex<Vec<Value>>>,
    pub cookies_seen: Arc<Mutex<Vec<String>>>,
    pub activity_calls: Arc<Mutex<Vec<u64>>>,
}

pub struct StubServer {
    pub base_url: String,
    pub state: StubState,
}

impl StubServer {
    pub fn submitted(&self) -> Vec<Value> {
        self.state.submitted.lock().unwrap().clone()
    }

    pub fn cookies_seen(&self) -> Vec<String> {
        self.state.cookies_seen.lock().unwrap().clone()
    }

    pub fn activity_calls(&self) -> Vec<u64> {
        self.state.activity_calls.lock().unwrap().clone()
    }
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<u32>,
}

#[derive(Deserialize)]
struct ActivityQuery {
    task_instance: u64,
}

pub async fn start() -> anyhow::Result<StubServer> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    let state = StubState {
        base_url: base_url.clone(),
        submitted: Arc::default(),
        cookies_seen: Arc::default(),
        activity_calls: Arc::default(),
    };

    let app = Router::new()
        .route("/api/program/current/tasks/", get(list_tasks).post(create_task))
        .route("/api/program/current/tasks/{id}/", get(get_task))
        .route("/api/program/current/instances/", get(list_instances))
        .route("/api/program/current/instances/{id}/", get(get_instance))
        .route("/api/program/current/taskupdate/", get(activity))
        .route("/files/{id}/download", get(attachment))
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Ok(StubServer { base_url, state })
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {API_KEY}"))
}

fn record_cookie(stub: &StubState, headers: &HeaderMap) {
    let cookie = headers
        .get("cookie")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    stub.cookies_seen.lock().unwrap().push(cookie);
}

pub fn task(id: u64) -> Value {
    match id {
        1 => json!({
            "id": 1,
            "name": "Fix a bug",
            "description": "It crashes on start",
            "status": 2,
            "tags": ["rust", "cli"],
            "mentors": ["mentor@example.org"],
            "categories": [1, 4],
            "is_beginner": true,
            "time_to_complete_in_days": 3,
            "max_instances": 2,
            "external_url": "https://example.org/issues/1"
        }),
        2 => json!({
            "id": 2,
            "name": "Write \"docs\"",
            "description": "Document the CLI",
            "tags": [],
            "mentors": ["mentor@example.org"],
            "categories": [3],
            "is_beginner": false,
            "time_to_complete_in_days": 5,
            "max_instances": 1
        }),
        _ => json!({
            "id": id,
            "name": "Translate/UI",
            "description": null,
            "tags": null,
            "mentors": [],
            "categories": [2],
            "is_beginner": null,
            "time_to_complete_in_days": 2,
            "max_instances": 3
        }),
    }
}

pub fn instance(id: u64) -> Value {
    match id {
        42 => json!({
            "id": 42,
            "task_definition_id": 1,
            "task_definition_name": "Fix a bug",
            "organization_id": 3,
            "organization_name": "Acme/Org",
            "student_id": 99,
            "student_display_name": "Ada",
            "status": "COMPLETED",
            "deadline": "2016-11-10 00:00:00",
            "completion_date": "2016-11-04 10:00:00",
            "modified": "2016-11-03 01:51:51"
        }),
        43 => json!({
            "id": 43,
            "task_definition_id": 2,
            "task_definition_name": "Write \"docs\"",
            "organization_id": 3,
            "organization_name": "Acme/Org",
            "student_id": null,
            "student_display_name": null,
            "status": "OPEN",
            "deadline": null,
            "completion_date": null,
            "modified": "None"
        }),
        _ => json!({
            "id": id,
            "task_definition_id": 3,
            "task_definition_name": "Translate/UI",
            "organization_id": 4,
            "organization_name": "Ünïcode Org",
            "student_id": 7,
            "student_display_name": "Grace",
            "status": "CLAIMED",
            "deadline": "2016-12-01 00:00:00",
            "completion_date": null,
            "modified": "2016-11-20 12:00:00"
        }),
    }
}

async fn list_tasks(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let body = match query.page.unwrap_or(1) {
        1 => json!({
            "count": 3,
            "next": format!("{}/api/program/current/tasks/?page=2", stub.base_url),
            "previous": null,
            "results": [task(1), task(2)]
        }),
        _ => json!({
            "count": 3,
            "next": null,
            "previous": format!("{}/api/program/current/tasks/?page=1", stub.base_url),
            "results": [task(3)]
        }),
    };
    Json(body).into_response()
}

async fn get_task(headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(task(id)).into_response()
}

async fn create_task(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["name"] == "bad" {
        return (
            StatusCode::BAD_REQUEST,
            r#"{"name": ["This name is not allowed."]}"#,
        )
            .into_response();
    }
    stub.submitted.lock().unwrap().push(body.clone());
    let mut created = body;
    created["id"] = json!(1000 + stub.submitted.lock().unwrap().len() as u64);
    (StatusCode::CREATED, Json(created)).into_response()
}

async fn list_instances(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let body = match query.page.unwrap_or(1) {
        1 => json!({
            "next": format!("{}/api/program/current/instances/?page=2", stub.base_url),
            "results": [instance(42), instance(43)]
        }),
        _ => json!({
            "next": null,
            "results": [instance(44)]
        }),
    };
    Json(body).into_response()
}

async fn get_instance(headers: HeaderMap, Path(id): Path<u64>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(instance(id)).into_response()
}

async fn activity(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Query(query): Query<ActivityQuery>,
) -> Response {
    record_cookie(&stub, &headers);
    stub.activity_calls.lock().unwrap().push(query.task_instance);
    let results = match query.task_instance {
        42 => json!([
            {"author": "mentor", "text": "Looks good", "attachments": []},
            {"author": "Ada", "text": "Here is the fix", "attachments": [
                {"url": "/files/11/download", "filename": "fix.patch"},
                {"url": "/files/404/download", "filename": "gone.txt"}
            ]}
        ]),
        _ => json!([]),
    };
    Json(json!({"next": null, "results": results})).into_response()
}

async fn attachment(
    State(stub): State<StubState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    record_cookie(&stub, &headers);
    if id == "404" {
        return (StatusCode::NOT_FOUND, "no such attachment").into_response();
    }
    format!("attachment {id}").into_response()
}
