use crate::todo::{TodoChanges, TodoItem, TodoService, TodoState};
use crate::web::api::{
    ApiError, ErrorResponse, ValidJson, ValidPath, ValidQuery, ValidationErrorResponse,
};
use axum::{Router, extract::State, response::Json, routing::get};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

/// JSON representation of a todo for API responses.
#[derive(Debug, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct TodoJson {
    /// Unique identifier for the todo
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    /// When the todo was created
    pub created_at: DateTime<Utc>,
    /// When the todo was last modified
    pub updated_at: DateTime<Utc>,
}

impl From<TodoItem> for TodoJson {
    fn from(todo: TodoItem) -> Self {
        Self {
            id: todo.id(),
            title: todo.title().to_string(),
            description: todo.description().map(str::to_string),
            completed: todo.completed(),
            created_at: todo.created_at(),
            updated_at: todo.updated_at(),
        }
    }
}

/// JSON payload for creating a todo.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TodoCreate {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// JSON payload for a partial update. Keys that are left out are not touched.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TodoUpdate {
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub title: Option<String>,
    /// `null` clears the description
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<bool>)]
    pub completed: Option<bool>,
}

impl From<TodoUpdate> for TodoChanges {
    fn from(update: TodoUpdate) -> Self {
        Self {
            title: update.title,
            description: update.description,
            completed: update.completed,
        }
    }
}

/// Marks a key as present. Only runs when the key exists in the payload, so
/// an explicit `null` reaches `T` instead of collapsing into "absent".
fn present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Query parameters for paginating todos.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListTodosQuery {
    /// Number of todos to skip
    #[serde(default)]
    #[param(default = 0)]
    pub skip: i64,
    /// Maximum number of todos to return
    #[serde(default = "default_limit")]
    #[param(default = 100)]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// Path parameters for routes addressing a single todo.
#[derive(Debug, Deserialize)]
pub struct TodoPath {
    todo_id: i64,
}

impl TodoPath {
    /// Returns the id as stored in the table. Any integer outside the `i32`
    /// range cannot name a row, so it reports as not found.
    fn todo_id(&self) -> Result<i32, ApiError> {
        i32::try_from(self.todo_id).map_err(|_| ApiError::NotFound)
    }
}

/// Handler for POST /todos/ - Creates a new todo.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    post,
    path = "/todos/",
    request_body = TodoCreate,
    responses(
        (status = 200, description = "Successfully created todo", body = TodoJson),
        (status = 422, description = "Validation error", body = ValidationErrorResponse)
    ),
    tag = "todos"
)]
pub async fn create_todo_handler(
    State(state): State<Arc<TodoState>>,
    ValidJson(payload): ValidJson<TodoCreate>,
) -> Result<Json<TodoJson>, ApiError> {
    let service = TodoService::new(&state.db);
    let todo = service
        .create_todo(payload.title, payload.description)
        .await?;
    Ok(Json(TodoJson::from(todo)))
}

/// Handler for GET /todos/ - Returns one page of todos.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/todos/",
    params(ListTodosQuery),
    responses(
        (status = 200, description = "Successfully retrieved todos", body = [TodoJson]),
        (status = 422, description = "Validation error", body = ValidationErrorResponse)
    ),
    tag = "todos"
)]
pub async fn list_todos_handler(
    State(state): State<Arc<TodoState>>,
    ValidQuery(query): ValidQuery<ListTodosQuery>,
) -> Result<Json<Vec<TodoJson>>, ApiError> {
    let service = TodoService::new(&state.db);
    let todos = service.list_todos(query.skip, query.limit).await?;
    Ok(Json(todos.into_iter().map(TodoJson::from).collect()))
}

/// Handler for GET /todos/{todo_id} - Returns a single todo.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/todos/{todo_id}",
    params(
        ("todo_id" = i64, Path, description = "ID of the todo")
    ),
    responses(
        (status = 200, description = "Successfully retrieved todo", body = TodoJson),
        (status = 404, description = "Todo not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ValidationErrorResponse)
    ),
    tag = "todos"
)]
pub async fn get_todo_handler(
    State(state): State<Arc<TodoState>>,
    ValidPath(path): ValidPath<TodoPath>,
) -> Result<Json<TodoJson>, ApiError> {
    let service = TodoService::new(&state.db);
    let todo = service.get_todo_by_id(path.todo_id()?).await?;
    Ok(Json(TodoJson::from(todo)))
}

/// Handler for PUT /todos/{todo_id} - Partially updates a todo.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    put,
    path = "/todos/{todo_id}",
    params(
        ("todo_id" = i64, Path, description = "ID of the todo")
    ),
    request_body = TodoUpdate,
    responses(
        (status = 200, description = "Successfully updated todo", body = TodoJson),
        (status = 404, description = "Todo not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ValidationErrorResponse)
    ),
    tag = "todos"
)]
pub async fn update_todo_handler(
    State(state): State<Arc<TodoState>>,
    ValidPath(path): ValidPath<TodoPath>,
    ValidJson(payload): ValidJson<TodoUpdate>,
) -> Result<Json<TodoJson>, ApiError> {
    let service = TodoService::new(&state.db);
    let todo = service
        .edit_todo_by_id(path.todo_id()?, TodoChanges::from(payload))
        .await?;
    Ok(Json(TodoJson::from(todo)))
}

/// Handler for DELETE /todos/{todo_id} - Deletes a todo and returns it.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/todos/{todo_id}",
    params(
        ("todo_id" = i64, Path, description = "ID of the todo")
    ),
    responses(
        (status = 200, description = "Successfully deleted todo", body = TodoJson),
        (status = 404, description = "Todo not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ValidationErrorResponse)
    ),
    tag = "todos"
)]
pub async fn delete_todo_handler(
    State(state): State<Arc<TodoState>>,
    ValidPath(path): ValidPath<TodoPath>,
) -> Result<Json<TodoJson>, ApiError> {
    let service = TodoService::new(&state.db);
    let todo = service.delete_todo_by_id(path.todo_id()?).await?;
    Ok(Json(TodoJson::from(todo)))
}

/// Creates and returns the todos API router.
pub fn create_api_router(state: Arc<TodoState>) -> Router {
    Router::new()
        .route("/todos/", get(list_todos_handler).post(create_todo_handler))
        .route("/todos", get(list_todos_handler).post(create_todo_handler))
        .route(
            "/todos/{todo_id}",
            get(get_todo_handler)
                .put(update_todo_handler)
                .delete(delete_todo_handler),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_leave_absent_fields_untouched() {
        let update: TodoUpdate = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        let changes = TodoChanges::from(update);

        assert_eq!(
            changes,
            TodoChanges {
                title: None,
                description: None,
                completed: Some(true),
            }
        );
    }

    #[test]
    fn can_distinguish_explicit_false_from_absent() {
        let update: TodoUpdate = serde_json::from_str(r#"{"completed": false}"#).unwrap();
        assert_eq!(update.completed, Some(false));

        let update: TodoUpdate = serde_json::from_str("{}").unwrap();
        assert_eq!(update.completed, None);
    }

    #[test]
    fn can_clear_description_with_explicit_null() {
        let update: TodoUpdate = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(update.description, Some(None));

        let update: TodoUpdate = serde_json::from_str(r#"{"title": "Renamed"}"#).unwrap();
        assert_eq!(update.description, None);
        assert_eq!(update.title.as_deref(), Some("Renamed"));
    }

    #[test]
    fn can_reject_null_for_non_nullable_fields() {
        assert!(serde_json::from_str::<TodoUpdate>(r#"{"title": null}"#).is_err());
        assert!(serde_json::from_str::<TodoUpdate>(r#"{"completed": null}"#).is_err());
    }

    #[test]
    fn can_treat_out_of_range_id_as_not_found() {
        let path = TodoPath {
            todo_id: 3_000_000_000,
        };
        assert!(matches!(path.todo_id(), Err(ApiError::NotFound)));

        let path = TodoPath { todo_id: -1 };
        assert!(matches!(path.todo_id(), Ok(-1)));
    }

    #[test]
    fn can_require_title_on_create() {
        assert!(serde_json::from_str::<TodoCreate>(r#"{"description": "x"}"#).is_err());

        let create: TodoCreate = serde_json::from_str(r#"{"title": "Buy milk"}"#).unwrap();
        assert_eq!(create.title, "Buy milk");
        assert_eq!(create.description, None);
    }
}
