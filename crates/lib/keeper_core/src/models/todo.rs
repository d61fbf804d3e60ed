//! Todo domain models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A todo item, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub is_complete: bool,
    pub owner_id: Uuid,
}

/// Input for creating a todo.
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub is_complete: bool,
}

/// Changes to apply to an existing todo; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub is_complete: Option<bool>,
}

impl TodoChanges {
    /// Apply the changes to `todo` in place.
    pub fn apply(&self, todo: &mut Todo) {
        if let Some(title) = &self.title {
            todo.title = title.clone();
        }
        if let Some(done) = self.is_complete {
            todo.is_complete = done;
        }
    }
}
