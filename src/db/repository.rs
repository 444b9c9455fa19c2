use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteExecutor;

use crate::models::{INITIAL_LIST_ID, ListId, Task, TaskId, TodoList};

pub async fn fetch_lists(db: impl SqliteExecutor<'_>) -> Result<Vec<TodoList>, sqlx::Error> {
    sqlx::query_as::<_, TodoList>("SELECT id, name FROM todo_lists ORDER BY id")
        .fetch_all(db)
        .await
}

pub async fn find_list_by_id(
    db: impl SqliteExecutor<'_>,
    id: ListId,
) -> Result<Option<TodoList>, sqlx::Error> {
    sqlx::query_as::<_, TodoList>("SELECT id, name FROM todo_lists WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_list(db: impl SqliteExecutor<'_>, name: &str) -> Result<ListId, sqlx::Error> {
    let id = sqlx::query("INSERT INTO todo_lists (name) VALUES (?)")
        .bind(name)
        .execute(db)
        .await?
        .last_insert_rowid();

    Ok(id)
}

/// Inserts the initial list unless it already exists. Returns whether a row was written.
pub async fn seed_initial_list(db: impl SqliteExecutor<'_>, name: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO todo_lists (id, name) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING",
    )
    .bind(INITIAL_LIST_ID)
    .bind(name)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn delete_list(db: impl SqliteExecutor<'_>, id: ListId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM todo_lists WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn fetch_tasks_for_list(
    db: impl SqliteExecutor<'_>,
    list_id: ListId,
) -> Result<Vec<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        "SELECT id, task, completed, date, list_id FROM todos WHERE list_id = ? ORDER BY id",
    )
    .bind(list_id)
    .fetch_all(db)
    .await
}

pub async fn find_task_by_id(
    db: impl SqliteExecutor<'_>,
    id: TaskId,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>("SELECT id, task, completed, date, list_id FROM todos WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert_task(
    db: impl SqliteExecutor<'_>,
    list_id: ListId,
    text: &str,
    date: DateTime<Utc>,
) -> Result<TaskId, sqlx::Error> {
    let id = sqlx::query(
        "INSERT INTO todos (task, completed, date, list_id) VALUES (?1, 0, ?2, ?3)",
    )
    .bind(text)
    .bind(date)
    .bind(list_id)
    .execute(db)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Merges the given fields into one task in a single statement. Returns the
/// owning list, or `None` when no task has `id`.
pub async fn update_task(
    db: impl SqliteExecutor<'_>,
    id: TaskId,
    text: Option<&str>,
    completed: Option<bool>,
) -> Result<Option<ListId>, sqlx::Error> {
    sqlx::query_scalar::<_, ListId>(
        r#"
        UPDATE todos
        SET task = COALESCE(?1, task),
            completed = COALESCE(?2, completed)
        WHERE id = ?3
        RETURNING list_id
        "#,
    )
    .bind(text)
    .bind(completed)
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn delete_task(db: impl SqliteExecutor<'_>, id: TaskId) -> Result<Option<ListId>, sqlx::Error> {
    sqlx::query_scalar::<_, ListId>("DELETE FROM todos WHERE id = ? RETURNING list_id")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Removes every task of a list and returns the removed ids.
pub async fn delete_tasks_for_list(
    db: impl SqliteExecutor<'_>,
    list_id: ListId,
) -> Result<Vec<TaskId>, sqlx::Error> {
    sqlx::query_scalar::<_, TaskId>("DELETE FROM todos WHERE list_id = ? RETURNING id")
        .bind(list_id)
        .fetch_all(db)
        .await
}
