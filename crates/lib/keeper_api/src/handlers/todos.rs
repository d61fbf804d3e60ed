//! Todo request handlers. All routes sit behind `require_auth`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use keeper_core::models::todo::{NewTodo, TodoChanges};
use keeper_core::todos;
use uuid::Uuid;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{CreateTodoRequest, TodoItem, UpdateTodoRequest};

/// `GET /todos`: the caller's todos, or every todo for admins.
pub async fn list_todos_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<Vec<TodoItem>>> {
    let items = todos::list(state.todos.as_ref(), &user.0)
        .await?
        .into_iter()
        .map(TodoItem::from)
        .collect();
    Ok(Json(items))
}

/// `POST /todos`: create a todo owned by the caller.
pub async fn create_todo_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<CreateTodoRequest>,
) -> AppResult<(StatusCode, Json<TodoItem>)> {
    let todo = todos::create(
        state.todos.as_ref(),
        &user.0,
        NewTodo {
            title: body.title,
            is_complete: body.is_complete,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(todo.into())))
}

/// `GET /todos/{id}`
pub async fn get_todo_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TodoItem>> {
    let todo = todos::get(state.todos.as_ref(), &user.0, id).await?;
    Ok(Json(todo.into()))
}

/// `PUT /todos/{id}`: change title and/or completion.
pub async fn update_todo_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTodoRequest>,
) -> AppResult<Json<TodoItem>> {
    let changes = TodoChanges {
        title: body.title,
        is_complete: body.is_complete,
    };
    let todo = todos::update(state.todos.as_ref(), &user.0, id, changes).await?;
    Ok(Json(todo.into()))
}

/// `DELETE /todos/{id}`
pub async fn delete_todo_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    todos::delete(state.todos.as_ref(), &user.0, id).await?;
    Ok(Json(serde_json::json!({"success": true})))
}
