//! PostgreSQL todo repository (`todos` table).

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{TodoError, TodoRepository};
use crate::auth::authorize::TodoScope;
use crate::models::todo::{NewTodo, Todo};
use crate::uuid::uuidv7;

#[derive(Clone)]
pub struct PgTodoRepository {
    pool: PgPool,
}

impl PgTodoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TodoRepository for PgTodoRepository {
    async fn insert(&self, owner_id: Uuid, todo: &NewTodo) -> Result<Todo, TodoError> {
        let row = sqlx::query_as::<_, Todo>(
            r#"
            INSERT INTO todos (id, title, is_complete, owner_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, is_complete, owner_id
            "#,
        )
        .bind(uuidv7())
        .bind(&todo.title)
        .bind(todo.is_complete)
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Todo>, TodoError> {
        let row = sqlx::query_as::<_, Todo>(
            "SELECT id, title, is_complete, owner_id FROM todos WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(&self, scope: TodoScope) -> Result<Vec<Todo>, TodoError> {
        let rows = match scope {
            TodoScope::All => {
                sqlx::query_as::<_, Todo>(
                    "SELECT id, title, is_complete, owner_id FROM todos ORDER BY id",
                )
                .fetch_all(&self.pool)
                .await?
            }
            TodoScope::Owner(owner_id) => {
                sqlx::query_as::<_, Todo>(
                    "SELECT id, title, is_complete, owner_id FROM todos \
                     WHERE owner_id = $1 ORDER BY id",
                )
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    async fn update(&self, todo: &Todo) -> Result<bool, TodoError> {
        let result = sqlx::query("UPDATE todos SET title = $2, is_complete = $3 WHERE id = $1")
            .bind(todo.id)
            .bind(&todo.title)
            .bind(todo.is_complete)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, TodoError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
