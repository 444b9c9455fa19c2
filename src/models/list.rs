use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ListId;

/// Id of the list seeded on first open. It can never be deleted.
pub const INITIAL_LIST_ID: ListId = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TodoList {
    pub id: ListId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListRequest {
    pub name: String,
}
