use serde::Serialize;

use crate::models::{Entity, ListId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A committed mutation of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub entity: Entity,
    pub kind: ChangeKind,
    pub id: i64,
    /// Owning list for task changes, the list itself for list changes.
    pub list_id: ListId,
}

impl ChangeEvent {
    pub fn list(kind: ChangeKind, id: ListId) -> Self {
        Self {
            entity: Entity::List,
            kind,
            id,
            list_id: id,
        }
    }

    pub fn task(kind: ChangeKind, id: TaskId, list_id: ListId) -> Self {
        Self {
            entity: Entity::Task,
            kind,
            id,
            list_id,
        }
    }
}
