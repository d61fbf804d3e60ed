//! In-process todo repository.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{TodoError, TodoRepository};
use crate::auth::authorize::TodoScope;
use crate::models::todo::{NewTodo, Todo};
use crate::uuid::uuidv7;

#[derive(Debug, Default)]
pub struct MemoryTodoRepository {
    todos: DashMap<Uuid, Todo>,
}

impl MemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoRepository for MemoryTodoRepository {
    async fn insert(&self, owner_id: Uuid, todo: &NewTodo) -> Result<Todo, TodoError> {
        let created = Todo {
            id: uuidv7(),
            title: todo.title.clone(),
            is_complete: todo.is_complete,
            owner_id,
        };
        self.todos.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Todo>, TodoError> {
        Ok(self.todos.get(&id).map(|t| t.value().clone()))
    }

    async fn list(&self, scope: TodoScope) -> Result<Vec<Todo>, TodoError> {
        let mut todos: Vec<Todo> = self
            .todos
            .iter()
            .filter(|t| match scope {
                TodoScope::All => true,
                TodoScope::Owner(owner_id) => t.owner_id == owner_id,
            })
            .map(|t| t.value().clone())
            .collect();
        todos.sort_by_key(|t| t.id);
        Ok(todos)
    }

    async fn update(&self, todo: &Todo) -> Result<bool, TodoError> {
        match self.todos.get_mut(&todo.id) {
            Some(mut existing) => {
                existing.title = todo.title.clone();
                existing.is_complete = todo.is_complete;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, TodoError> {
        Ok(self.todos.remove(&id).is_some())
    }
}
