#![cfg(feature = "http_api")]

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use chrono::Duration;
use household_chores::{
    BoardRegistry, HouseholdConfig, MaintenanceSchedule, MemoryBoardStore, RotationPlan, http_api,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::util::ServiceExt;

fn new_router() -> axum::Router {
    let registry = Arc::new(BoardRegistry::new(
        Arc::new(MemoryBoardStore::new()),
        RotationPlan::default(),
        Duration::minutes(60),
        MaintenanceSchedule::default(),
    ));
    registry
        .add_household(&HouseholdConfig::new(
            "home",
            "Home",
            ["Alex", "Sam"],
            ["Dishes", "Bins"],
        ))
        .unwrap();
    http_api::router(http_api::AppState::new(registry))
}

async fn send(app: &axum::Router, method: &str, uri: &str, payload: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match payload {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&payload).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_and_household_listing() {
    let app = new_router();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/households", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], "home");
    assert_eq!(body[0]["members"], json!(["Alex", "Sam"]));
    assert_eq!(body[0]["pending"], 0);

    let (status, body) = send(&app, "GET", "/households/home", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["household"], "home");
    assert!(body["next"]["chore"].is_string());
    assert_eq!(body["board"]["templates"][0]["id"], "dishes");

    let (status, body) = send(&app, "GET", "/households/nowhere/board", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn task_lifecycle_via_http_api() {
    let app = new_router();

    let (status, task) = send(
        &app,
        "POST",
        "/households/home/tasks",
        Some(json!({ "title": "Water plants", "assigneeName": "Sam" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["status"], "pending");
    let id = task["id"].as_str().unwrap().to_string();

    let (status, task) = send(
        &app,
        "PUT",
        &format!("/households/home/tasks/{id}"),
        Some(json!({ "title": "Water all plants" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["title"], "Water all plants");

    let (status, task) = send(
        &app,
        "POST",
        &format!("/households/home/tasks/{id}/complete"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["status"], "done");
    assert!(task["completedAt"].is_string());

    let (status, body) = send(&app, "POST", "/households/home/maintenance/cleanup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "removed": 1 }));

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("/households/home/tasks/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn validation_errors_map_to_status_codes() {
    let app = new_router();

    let (status, body) = send(
        &app,
        "POST",
        "/households/home/tasks",
        Some(json!({ "title": "Dishes", "assigneeName": "Nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["message"].as_str().unwrap().contains("Nobody"));

    let (status, body) = send(
        &app,
        "POST",
        "/households/home/people",
        Some(json!({ "name": "Alex" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, body) = send(
        &app,
        "POST",
        "/households/home/tasks",
        Some(json!({ "title": "  ", "assigneeName": "Alex" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn people_and_templates_via_http_api() {
    let app = new_router();

    let (status, body) = send(
        &app,
        "POST",
        "/households/home/people",
        Some(json!({ "name": "Robin" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Robin");

    let (status, _) = send(&app, "DELETE", "/households/home/people/Robin", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, template) = send(
        &app,
        "POST",
        "/households/home/templates",
        Some(json!({ "title": "Mop floors" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(template["id"], "mop-floors");
    assert_eq!(template["recurrence"], "weekly");

    let (status, body) = send(&app, "POST", "/households/home/maintenance/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "created": 3 }));
    let (_, body) = send(&app, "POST", "/households/home/maintenance/refresh", None).await;
    assert_eq!(body, json!({ "created": 0 }));

    let (status, _) = send(
        &app,
        "DELETE",
        "/households/home/templates/mop-floors",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, board) = send(&app, "GET", "/households/home/board", None).await;
    assert_eq!(board["people"], json!(["Alex", "Sam"]));
    assert_eq!(board["templates"].as_array().unwrap().len(), 2);
    let unlinked = board["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|task| task.get("templateId").is_none())
        .count();
    assert_eq!(unlinked, 1);
}

#[tokio::test]
async fn schedule_queries_via_http_api() {
    let app = new_router();

    let (status, events) = send(
        &app,
        "GET",
        "/households/home/events?start=2000-01-01T00:00:00Z&end=2000-01-02T00:00:00Z",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(events, json!([]));

    let (status, events) = send(&app, "GET", "/households/home/events", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!events.as_array().unwrap().is_empty());
    assert!(events[0]["summary"].as_str().unwrap().contains(" - "));

    let (status, body) = send(
        &app,
        "GET",
        "/households/home/events?start=yesterday",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, next) = send(&app, "GET", "/households/home/next", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(["Alex", "Sam"].contains(&next["member"].as_str().unwrap()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_task_creation_commits_every_task() {
    let app = new_router();

    let mut handles = Vec::new();
    for n in 0..16 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            send(
                &app,
                "POST",
                "/households/home/tasks",
                Some(json!({ "title": format!("Chore {n}"), "assigneeName": "Alex" })),
            )
            .await
            .0
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::CREATED);
    }

    let (status, board) = send(&app, "GET", "/households/home/board", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["tasks"].as_array().unwrap().len(), 16);
}
