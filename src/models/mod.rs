pub mod list;
pub mod task;

use std::fmt;

use serde::Serialize;

use crate::error::AppError;

pub use list::{INITIAL_LIST_ID, NewListRequest, TodoList};
pub use task::{NewTaskRequest, Task, UpdateTaskRequest};

pub type ListId = i64;
pub type TaskId = i64;

/// Record collections owned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    List,
    Task,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::List => f.write_str("list"),
            Entity::Task => f.write_str("task"),
        }
    }
}

/// Trims `value` and rejects it when nothing is left.
pub fn non_empty(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_trims_surrounding_whitespace() {
        assert_eq!(non_empty("name", "  Work \n").unwrap(), "Work");
    }

    #[test]
    fn non_empty_rejects_blank_input() {
        for input in ["", "   ", "\t\n"] {
            let err = non_empty("task", input).unwrap_err();
            assert!(matches!(err, AppError::Validation(ref msg) if msg == "task must not be empty"));
        }
    }

    #[test]
    fn entity_display_matches_table_vocabulary() {
        assert_eq!(Entity::List.to_string(), "list");
        assert_eq!(Entity::Task.to_string(), "task");
    }
}
