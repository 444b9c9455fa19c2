mod live;

use axum::Json;
use axum::extract::Path;
use axum::routing::{delete, patch};
use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/lists", get(list_lists).post(create_list))
        .route("/lists/{id}", delete(delete_list))
        .route("/lists/{id}/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", patch(update_task).delete(delete_task))
        .route("/live/lists", get(live::lists))
        .route("/live/lists/{id}/tasks", get(live::tasks))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(state.store.pool()).await?;
    Ok(StatusCode::OK)
}

async fn list_lists(State(state): State<AppState>) -> Result<Json<Vec<TodoList>>, AppError> {
    let lists = state.store.list_all_lists().await?;
    Ok(Json(lists))
}

async fn create_list(
    State(state): State<AppState>,
    Json(req): Json<NewListRequest>
) -> Result<(StatusCode, Json<TodoList>), AppError> {
    let id = state.store.create_list(&req.name).await?;
    let list = state.store.get_list(id).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

async fn delete_list(
    State(state): State<AppState>,
    Path(id): Path<ListId>
) -> Result<StatusCode, AppError> {
    state.store.delete_list(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tasks(
    State(state): State<AppState>,
    Path(id): Path<ListId>
) -> Result<Json<Vec<Task>>, AppError> {
    let tasks = state.store.list_tasks_for_list(id).await?;
    Ok(Json(tasks))
}

async fn create_task(
    State(state): State<AppState>,
    Path(id): Path<ListId>,
    Json(req): Json<NewTaskRequest>
) -> Result<(StatusCode, Json<Task>), AppError> {
    let task_id = state.store.create_task(id, &req.task).await?;
    let task = state.store.get_task(task_id).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(req): Json<UpdateTaskRequest>
) -> Result<Json<Task>, AppError> {
    state.store.update_task(id, &req).await?;

    let task = state.store.get_task(id).await?;
    Ok(Json(task))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>
) -> Result<StatusCode, AppError> {
    state.store.delete_task(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
