//! UI-facing controller: one selected list, a live view of all lists and a
//! live view of the selected list's tasks. Handlers return errors to the
//! caller instead of dropping them.

use tracing::info;

use crate::error::AppError;
use crate::live::{AllLists, LiveQuery, TasksForList};
use crate::models::{ListId, TaskId, non_empty};
use crate::store::Store;

pub struct TodoApp {
    store: Store,
    selected: Option<ListId>,
    lists: LiveQuery<AllLists>,
    tasks: LiveQuery<TasksForList>,
}

impl TodoApp {
    pub fn new(store: Store) -> Self {
        let lists = LiveQuery::spawn(store.clone(), AllLists, ());
        let tasks = LiveQuery::spawn(store.clone(), TasksForList, None);
        Self {
            store,
            selected: None,
            lists,
            tasks,
        }
    }

    pub fn selected_list(&self) -> Option<ListId> {
        self.selected
    }

    pub fn lists(&mut self) -> &mut LiveQuery<AllLists> {
        &mut self.lists
    }

    pub fn tasks(&mut self) -> &mut LiveQuery<TasksForList> {
        &mut self.tasks
    }

    pub async fn select_list(&mut self, id: ListId) -> Result<(), AppError> {
        self.store.get_list(id).await?;
        self.set_selection(Some(id));
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(None);
    }

    fn set_selection(&mut self, selection: Option<ListId>) {
        self.selected = selection;
        self.tasks.set_key(selection);
    }

    pub async fn add_list(&mut self, name: &str) -> Result<ListId, AppError> {
        self.store.create_list(name).await
    }

    pub async fn delete_list(&mut self, id: ListId) -> Result<(), AppError> {
        self.store.delete_list(id).await?;
        if self.selected == Some(id) {
            info!("selected list {} was deleted", id);
            self.clear_selection();
        }
        Ok(())
    }

    /// Adds a task to the selected list.
    pub async fn add_task(&mut self, text: &str) -> Result<TaskId, AppError> {
        let text = non_empty("task", text)?;
        let list_id = self
            .selected
            .ok_or_else(|| AppError::Validation("no list selected".to_string()))?;
        self.store.create_task(list_id, &text).await
    }

    pub async fn toggle_task(&mut self, id: TaskId, completed: bool) -> Result<(), AppError> {
        self.store.set_task_completed(id, completed).await
    }

    pub async fn rename_task(&mut self, id: TaskId, text: &str) -> Result<(), AppError> {
        self.store.rename_task(id, text).await
    }

    pub async fn delete_task(&mut self, id: TaskId) -> Result<(), AppError> {
        self.store.delete_task(id).await
    }

    /// Disposes both subscriptions.
    pub async fn shutdown(self) {
        self.lists.dispose().await;
        self.tasks.dispose().await;
    }
}
