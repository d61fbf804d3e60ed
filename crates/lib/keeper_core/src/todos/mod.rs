//! Todo persistence and owner-gated operations.
//!
//! Every single-resource operation runs the ownership check from
//! [`crate::auth::authorize`]. A failed check is reported as
//! [`TodoError::NotFound`], the same as a missing todo, so callers cannot
//! probe for ids they do not own.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::auth::authorize::{TodoScope, can_act, list_scope};
use crate::models::auth::Claims;
use crate::models::todo::{NewTodo, Todo, TodoChanges};
use crate::validation::FieldErrors;

pub use memory::MemoryTodoRepository;
pub use pg::PgTodoRepository;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 256;

/// Todo errors.
#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Todo not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Storage contract for todos. No authorization happens at this layer.
#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn insert(&self, owner_id: Uuid, todo: &NewTodo) -> Result<Todo, TodoError>;
    async fn get(&self, id: Uuid) -> Result<Option<Todo>, TodoError>;
    /// Todos visible in `scope`, oldest first.
    async fn list(&self, scope: TodoScope) -> Result<Vec<Todo>, TodoError>;
    /// Persist title and completion of `todo`. Returns false if it no longer exists.
    async fn update(&self, todo: &Todo) -> Result<bool, TodoError>;
    /// Returns false if there was nothing to delete.
    async fn delete(&self, id: Uuid) -> Result<bool, TodoError>;
}

/// Validate a todo title.
pub fn validate_title(title: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    if title.trim().is_empty() {
        errors.add("title", "Title is required");
    } else if title.chars().count() > MAX_TITLE_LEN {
        errors.add(
            "title",
            format!("Title must be at most {MAX_TITLE_LEN} characters"),
        );
    }
    errors.into_result()
}

/// Create a todo owned by the caller.
pub async fn create(
    repo: &dyn TodoRepository,
    claims: &Claims,
    todo: NewTodo,
) -> Result<Todo, TodoError> {
    validate_title(&todo.title).map_err(TodoError::Validation)?;
    let created = repo.insert(claims.sub, &todo).await?;
    debug!(todo_id = %created.id, owner_id = %claims.sub, "todo created");
    Ok(created)
}

/// Todos the caller may see: their own, or all of them for admins.
pub async fn list(repo: &dyn TodoRepository, claims: &Claims) -> Result<Vec<Todo>, TodoError> {
    repo.list(list_scope(claims)).await
}

/// Fetch one todo if the caller may act on it.
pub async fn get(repo: &dyn TodoRepository, claims: &Claims, id: Uuid) -> Result<Todo, TodoError> {
    match repo.get(id).await? {
        Some(todo) if can_act(claims, todo.owner_id) => Ok(todo),
        Some(_) => {
            debug!(todo_id = %id, user_id = %claims.sub, "todo access denied");
            Err(TodoError::NotFound)
        }
        None => Err(TodoError::NotFound),
    }
}

/// Apply `changes` to a todo the caller may act on.
pub async fn update(
    repo: &dyn TodoRepository,
    claims: &Claims,
    id: Uuid,
    changes: TodoChanges,
) -> Result<Todo, TodoError> {
    if let Some(title) = &changes.title {
        validate_title(title).map_err(TodoError::Validation)?;
    }
    let mut todo = get(repo, claims, id).await?;
    changes.apply(&mut todo);
    if !repo.update(&todo).await? {
        return Err(TodoError::NotFound);
    }
    Ok(todo)
}

/// Delete a todo the caller may act on.
pub async fn delete(repo: &dyn TodoRepository, claims: &Claims, id: Uuid) -> Result<(), TodoError> {
    let todo = get(repo, claims, id).await?;
    if !repo.delete(todo.id).await? {
        return Err(TodoError::NotFound);
    }
    debug!(todo_id = %id, user_id = %claims.sub, "todo deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::ADMIN_ROLE;

    fn caller(admin: bool) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            name: "u".into(),
            roles: if admin { vec![ADMIN_ROLE.into()] } else { vec![] },
        }
    }

    fn new_todo(title: &str) -> NewTodo {
        NewTodo {
            title: title.into(),
            is_complete: false,
        }
    }

    #[test]
    fn title_rules() {
        assert!(validate_title("buy milk").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN)).is_ok());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn owner_and_admin_can_read_stranger_cannot() {
        let repo = MemoryTodoRepository::new();
        let alice = caller(false);
        let bob = caller(false);
        let admin = caller(true);
        let todo = create(&repo, &alice, new_todo("a")).await.unwrap();

        assert_eq!(get(&repo, &alice, todo.id).await.unwrap(), todo);
        assert_eq!(get(&repo, &admin, todo.id).await.unwrap(), todo);
        assert!(matches!(
            get(&repo, &bob, todo.id).await,
            Err(TodoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn listing_is_scoped() {
        let repo = MemoryTodoRepository::new();
        let alice = caller(false);
        let bob = caller(false);
        let admin = caller(true);
        create(&repo, &alice, new_todo("a1")).await.unwrap();
        create(&repo, &alice, new_todo("a2")).await.unwrap();
        create(&repo, &bob, new_todo("b1")).await.unwrap();

        let titles: Vec<_> = list(&repo, &alice)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["a1", "a2"]);
        assert_eq!(list(&repo, &bob).await.unwrap().len(), 1);
        assert_eq!(list(&repo, &admin).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn stranger_cannot_update_or_delete() {
        let repo = MemoryTodoRepository::new();
        let alice = caller(false);
        let bob = caller(false);
        let todo = create(&repo, &alice, new_todo("a")).await.unwrap();

        let changes = TodoChanges {
            title: Some("hijacked".into()),
            is_complete: None,
        };
        assert!(matches!(
            update(&repo, &bob, todo.id, changes).await,
            Err(TodoError::NotFound)
        ));
        assert!(matches!(
            delete(&repo, &bob, todo.id).await,
            Err(TodoError::NotFound)
        ));
        assert_eq!(get(&repo, &alice, todo.id).await.unwrap().title, "a");
    }

    #[tokio::test]
    async fn admin_can_update_and_delete() {
        let repo = MemoryTodoRepository::new();
        let alice = caller(false);
        let admin = caller(true);
        let todo = create(&repo, &alice, new_todo("a")).await.unwrap();

        let updated = update(
            &repo,
            &admin,
            todo.id,
            TodoChanges {
                title: None,
                is_complete: Some(true),
            },
        )
        .await
        .unwrap();
        assert!(updated.is_complete);
        assert_eq!(updated.owner_id, alice.sub);

        delete(&repo, &admin, todo.id).await.unwrap();
        assert!(repo.get(todo.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_title_is_rejected() {
        let repo = MemoryTodoRepository::new();
        let alice = caller(false);
        match create(&repo, &alice, new_todo("")).await {
            Err(TodoError::Validation(fields)) => assert!(!fields.get("title").is_empty()),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
