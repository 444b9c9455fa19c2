//! Durable storage of todo lists and their tasks.
//!
//! Every mutating operation validates its input before touching the
//! database, commits, and only then announces a [`ChangeEvent`] to live
//! subscribers. SQLite serialises writers, so two writes to the same record
//! never interleave.

use chrono::Utc;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::{self, repository};
use crate::error::AppError;
use crate::live::{ChangeEvent, ChangeKind};
use crate::models::{
    INITIAL_LIST_ID, ListId, Task, TaskId, TodoList, UpdateTaskRequest, non_empty,
};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

// Read-then-write transactions take the write lock up front. A deferred
// transaction fails with SQLITE_BUSY when it upgrades after another writer
// committed, and the busy timeout does not cover that case.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

#[derive(Clone)]
pub struct Store {
    db: SqlitePool,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Store {
    /// Wraps an existing pool, applies migrations and seeds the initial list.
    pub async fn open(db: SqlitePool, initial_list_name: &str) -> Result<Self, AppError> {
        db::migrate(&db).await?;

        let name = non_empty("initial list name", initial_list_name)?;
        if repository::seed_initial_list(&db, &name).await? {
            info!("seeded initial list `{}`", name);
        }

        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { db, changes: tx })
    }

    pub async fn connect(config: &Config) -> Result<Self, AppError> {
        let pool = db::connect(config).await?;
        Self::open(pool, &config.initial_list_name).await
    }

    /// Fresh private store, mostly for tests.
    pub async fn in_memory() -> Result<Self, AppError> {
        let pool = db::connect_in_memory().await?;
        Self::open(pool, "My Tasks").await
    }

    pub async fn close(&self) {
        self.db.close().await;
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Receiver of every committed change from now on.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    pub(crate) fn announce(&self, event: ChangeEvent) {
        debug!("change: {:?}", event);
        // no live subscriptions is fine
        let _ = self.changes.send(event);
    }

    pub async fn create_list(&self, name: &str) -> Result<ListId, AppError> {
        let name = non_empty("name", name)?;
        let id = repository::insert_list(&self.db, &name).await?;

        info!("created list {} `{}`", id, name);
        self.announce(ChangeEvent::list(ChangeKind::Created, id));
        Ok(id)
    }

    /// Deletes a list together with all of its tasks.
    pub async fn delete_list(&self, id: ListId) -> Result<(), AppError> {
        if id == INITIAL_LIST_ID {
            warn!("refusing to delete initial list");
            return Err(AppError::Protected(id));
        }

        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;
        if repository::find_list_by_id(&mut *tx, id).await?.is_none() {
            return Err(AppError::list_not_found(id));
        }
        let removed = repository::delete_tasks_for_list(&mut *tx, id).await?;
        repository::delete_list(&mut *tx, id).await?;
        tx.commit().await?;

        info!("deleted list {} and {} task(s)", id, removed.len());
        for task_id in removed {
            self.announce(ChangeEvent::task(ChangeKind::Deleted, task_id, id));
        }
        self.announce(ChangeEvent::list(ChangeKind::Deleted, id));
        Ok(())
    }

    /// All lists in insertion order.
    pub async fn list_all_lists(&self) -> Result<Vec<TodoList>, AppError> {
        Ok(repository::fetch_lists(&self.db).await?)
    }

    pub async fn get_list(&self, id: ListId) -> Result<TodoList, AppError> {
        repository::find_list_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AppError::list_not_found(id))
    }

    pub async fn create_task(&self, list_id: ListId, text: &str) -> Result<TaskId, AppError> {
        let text = non_empty("task", text)?;

        let mut tx = self.db.begin_with(BEGIN_WRITE).await?;
        if repository::find_list_by_id(&mut *tx, list_id).await?.is_none() {
            return Err(AppError::list_not_found(list_id));
        }
        let id = repository::insert_task(&mut *tx, list_id, &text, Utc::now()).await?;
        tx.commit().await?;

        info!("created task {} in list {}", id, list_id);
        self.announce(ChangeEvent::task(ChangeKind::Created, id, list_id));
        Ok(id)
    }

    pub async fn delete_task(&self, id: TaskId) -> Result<(), AppError> {
        let list_id = repository::delete_task(&self.db, id)
            .await?
            .ok_or_else(|| AppError::task_not_found(id))?;

        info!("deleted task {} from list {}", id, list_id);
        self.announce(ChangeEvent::task(ChangeKind::Deleted, id, list_id));
        Ok(())
    }

    pub async fn set_task_completed(&self, id: TaskId, completed: bool) -> Result<(), AppError> {
        self.update_task(id, &UpdateTaskRequest { task: None, completed: Some(completed) })
            .await
    }

    pub async fn rename_task(&self, id: TaskId, text: &str) -> Result<(), AppError> {
        self.update_task(id, &UpdateTaskRequest { task: Some(text.to_string()), completed: None })
            .await
    }

    /// Applies every present field of `req` to one task at once.
    pub async fn update_task(&self, id: TaskId, req: &UpdateTaskRequest) -> Result<(), AppError> {
        let text = req.task.as_deref().map(|t| non_empty("task", t)).transpose()?;
        if text.is_none() && req.completed.is_none() {
            return Err(AppError::Validation("nothing to update".to_string()));
        }

        let list_id = repository::update_task(&self.db, id, text.as_deref(), req.completed)
            .await?
            .ok_or_else(|| AppError::task_not_found(id))?;

        debug!("updated task {} in list {}", id, list_id);
        self.announce(ChangeEvent::task(ChangeKind::Updated, id, list_id));
        Ok(())
    }

    /// Tasks of a list in insertion order. Unknown lists yield an empty vec.
    pub async fn list_tasks_for_list(&self, list_id: ListId) -> Result<Vec<Task>, AppError> {
        Ok(repository::fetch_tasks_for_list(&self.db, list_id).await?)
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Task, AppError> {
        repository::find_task_by_id(&self.db, id)
            .await?
            .ok_or_else(|| AppError::task_not_found(id))
    }
}
