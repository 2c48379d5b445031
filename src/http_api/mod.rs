use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use chrono::{DateTime, Duration, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    BoardError, BoardRegistry, BoardSnapshot, ChoreEvent, ChoreTask, ChoreTemplate,
    HouseholdOverview, HouseholdView, NewTask, NewTemplate, NextChoreDetail, TaskBoardStore,
    TaskUpdate,
};

/// Default width of the `/events` window when `end` is omitted.
const DEFAULT_EVENT_WINDOW_DAYS: i64 = 7;

#[derive(Clone)]
pub struct AppState {
    registry: Arc<BoardRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<BoardRegistry>) -> Self {
        Self { registry }
    }

    fn household(&self, id: &str) -> Result<Arc<HouseholdView>, ApiError> {
        self.registry
            .household(id)
            .ok_or_else(|| ApiError::not_found(format!("household '{id}' not found")))
    }

    fn board(&self, id: &str) -> Result<Arc<TaskBoardStore>, ApiError> {
        self.registry
            .board(id)
            .ok_or_else(|| ApiError::not_found(format!("household '{id}' not found")))
    }

    /// Run a board mutation on the blocking pool; every commit writes to storage.
    async fn mutate<T, F>(&self, id: &str, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&TaskBoardStore) -> Result<T, BoardError> + Send + 'static,
    {
        let board = self.board(id)?;
        tokio::task::spawn_blocking(move || op(board.as_ref()))
            .await
            .map_err(|err| ApiError::Internal(format!("board operation aborted: {err}")))?
            .map_err(ApiError::from)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<BoardError> for ApiError {
    fn from(value: BoardError) -> Self {
        let message = value.to_string();
        match value {
            BoardError::NotFound { .. } | BoardError::Removed(_) => ApiError::NotFound(message),
            BoardError::Conflict { .. } => ApiError::Conflict(message),
            BoardError::Invalid(_) => ApiError::Invalid(message),
            BoardError::Persistence(_) => {
                warn!("request failed: {message}");
                ApiError::Internal(message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
            ApiError::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Serialize)]
struct HouseholdSummary {
    id: String,
    name: String,
    members: Vec<String>,
    chores: Vec<String>,
    pending: usize,
    done: usize,
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewPerson {
    name: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/households", get(list_households))
        .route("/households/:id", get(household_overview))
        .route("/households/:id/board", get(board_snapshot))
        .route("/households/:id/events", get(list_events))
        .route("/households/:id/next", get(next_chore))
        .route("/households/:id/tasks", post(create_task))
        .route(
            "/households/:id/tasks/:task_id",
            put(update_task).delete(delete_task),
        )
        .route(
            "/households/:id/tasks/:task_id/complete",
            post(complete_task),
        )
        .route("/households/:id/people", post(add_person))
        .route("/households/:id/people/:name", delete(remove_person))
        .route("/households/:id/templates", post(add_template))
        .route(
            "/households/:id/templates/:template_id",
            delete(remove_template),
        )
        .route("/households/:id/maintenance/cleanup", post(run_cleanup))
        .route("/households/:id/maintenance/refresh", post(run_refresh))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, registry: Arc<BoardRegistry>) -> std::io::Result<()> {
    let app = router(AppState::new(registry));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("http api listening on http://{addr}");
    axum::serve(listener, app).await
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn list_households(State(state): State<AppState>) -> Json<Vec<HouseholdSummary>> {
    let summaries = state
        .registry
        .households()
        .into_iter()
        .map(|view| {
            let board = view.board_snapshot();
            HouseholdSummary {
                id: view.id().to_string(),
                name: view.name(),
                members: view.members(),
                chores: view.chores(),
                pending: board.pending_count(),
                done: board.done_count(),
            }
        })
        .collect();
    Json(summaries)
}

async fn household_overview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HouseholdOverview>, ApiError> {
    let view = state.household(&id)?;
    Ok(Json(view.overview(&Local::now())))
}

async fn board_snapshot(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BoardSnapshot>, ApiError> {
    Ok(Json(state.board(&id)?.snapshot()))
}

async fn list_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<ChoreEvent>>, ApiError> {
    let view = state.household(&id)?;
    let now = Local::now().fixed_offset();
    let start = match query.start.as_deref() {
        Some(text) => parse_instant(text, "start")?,
        None => now,
    };
    let end = match query.end.as_deref() {
        Some(text) => parse_instant(text, "end")?,
        None => start + Duration::days(DEFAULT_EVENT_WINDOW_DAYS),
    };
    if end < start {
        return Err(ApiError::invalid("end must not be before start"));
    }
    Ok(Json(view.events_in_range(&now, &start, &end)))
}

async fn next_chore(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Option<NextChoreDetail>>, ApiError> {
    let view = state.household(&id)?;
    Ok(Json(view.next_chore_detail(&Local::now())))
}

async fn create_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(task): Json<NewTask>,
) -> Result<(StatusCode, Json<ChoreTask>), ApiError> {
    let created = state
        .mutate(&id, move |board| board.add_task(task))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_task(
    State(state): State<AppState>,
    Path((id, task_id)): Path<(String, String)>,
    Json(update): Json<TaskUpdate>,
) -> Result<Json<ChoreTask>, ApiError> {
    let updated = state
        .mutate(&id, move |board| board.update_task(&task_id, update))
        .await?;
    Ok(Json(updated))
}

async fn complete_task(
    State(state): State<AppState>,
    Path((id, task_id)): Path<(String, String)>,
) -> Result<Json<ChoreTask>, ApiError> {
    let completed = state
        .mutate(&id, move |board| board.complete_task(&task_id))
        .await?;
    Ok(Json(completed))
}

async fn delete_task(
    State(state): State<AppState>,
    Path((id, task_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(&id, move |board| board.delete_task(&task_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_person(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(person): Json<NewPerson>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let name = state
        .mutate(&id, move |board| board.add_person(&person.name))
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "name": name }))))
}

async fn remove_person(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(&id, move |board| board.remove_person(&name))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(template): Json<NewTemplate>,
) -> Result<(StatusCode, Json<ChoreTemplate>), ApiError> {
    let created = state
        .mutate(&id, move |board| board.add_template(template))
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn remove_template(
    State(state): State<AppState>,
    Path((id, template_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .mutate(&id, move |board| board.remove_template(&template_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn run_cleanup(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let removed = state
        .mutate(&id, |board| board.remove_done_tasks())
        .await?;
    Ok(Json(json!({ "removed": removed })))
}

async fn run_refresh(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let created = state
        .mutate(&id, |board| board.weekly_refresh())
        .await?;
    Ok(Json(json!({ "created": created })))
}

fn parse_instant(text: &str, field: &str) -> Result<DateTime<FixedOffset>, ApiError> {
    DateTime::parse_from_rfc3339(text.trim())
        .map_err(|err| ApiError::invalid(format!("{field} is not an RFC 3339 time: {err}")))
}
