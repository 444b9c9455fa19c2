use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{ListId, TaskId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: TaskId,
    pub task: String,
    pub completed: bool,
    /// Creation time. Informational only, tasks are ordered by id.
    pub date: DateTime<Utc>,
    pub list_id: ListId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskRequest {
    pub task: String,
}

/// Partial update: absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    pub task: Option<String>,
    pub completed: Option<bool>,
}
