use async_trait::async_trait;

use crate::error::AppError;
use crate::live::ChangeEvent;
use crate::models::{Entity, ListId, Task, TodoList};
use crate::store::Store;

/// A read against the store that a [`LiveQuery`](super::LiveQuery) keeps fresh.
#[async_trait]
pub trait Query: Send + Sync + 'static {
    /// Input the result depends on besides store contents.
    type Key: Clone + PartialEq + Send + Sync + 'static;
    type Output: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    /// Whether `event` may change the result for `key`.
    fn is_affected_by(&self, event: &ChangeEvent, key: &Self::Key) -> bool;

    async fn run(&self, store: &Store, key: &Self::Key) -> Result<Self::Output, AppError>;
}

/// Every list, in insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllLists;

#[async_trait]
impl Query for AllLists {
    type Key = ();
    type Output = Vec<TodoList>;

    fn name(&self) -> &'static str {
        "all_lists"
    }

    fn is_affected_by(&self, event: &ChangeEvent, _key: &()) -> bool {
        event.entity == Entity::List
    }

    async fn run(&self, store: &Store, _key: &()) -> Result<Vec<TodoList>, AppError> {
        store.list_all_lists().await
    }
}

/// Tasks of the keyed list. No list selected means no tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TasksForList;

#[async_trait]
impl Query for TasksForList {
    type Key = Option<ListId>;
    type Output = Vec<Task>;

    fn name(&self) -> &'static str {
        "tasks_for_list"
    }

    fn is_affected_by(&self, event: &ChangeEvent, key: &Option<ListId>) -> bool {
        *key == Some(event.list_id)
    }

    async fn run(&self, store: &Store, key: &Option<ListId>) -> Result<Vec<Task>, AppError> {
        match key {
            Some(list_id) => store.list_tasks_for_list(*list_id).await,
            None => Ok(Vec::new()),
        }
    }
}
