use crate::entities::*;
use chrono::{DateTime, Utc};
use sea_orm::*;
use std::sync::Arc;

pub mod api;

/// A single todo record.
#[derive(Debug, PartialEq, Clone, Eq)]
pub struct TodoItem {
    id: i32,
    title: String,
    description: Option<String>,
    completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TodoItem {
    pub fn new(
        id: i32,
        title: String,
        description: Option<String>,
        completed: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            description,
            completed,
            created_at,
            updated_at,
        }
    }

    /// Returns the ID of the todo.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Returns the title of the todo.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description of the todo, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl From<todo::Model> for TodoItem {
    fn from(model: todo::Model) -> Self {
        TodoItem::new(
            model.id,
            model.title,
            model.description,
            model.completed,
            model.created_at.with_timezone(&Utc),
            model.updated_at.with_timezone(&Utc),
        )
    }
}

/// The set of fields to overwrite on an existing todo.
///
/// `None` leaves the column untouched. `description` is nullable, so
/// `Some(None)` clears it.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TodoChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
}

/// Error type for TodoService operations.
#[derive(Debug, thiserror::Error)]
pub enum TodoServiceError {
    /// Represents a todo not found error.
    #[error("Todo with ID {0} not found")]
    TodoNotFound(i32),
    /// Represents a database error.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl TodoServiceError {
    /// Maps an `UPDATE` failure. A row removed after it was read leaves the
    /// update matching nothing, which is the same as never having found it.
    fn from_update(id: i32, err: DbErr) -> Self {
        match err {
            DbErr::RecordNotUpdated => TodoServiceError::TodoNotFound(id),
            other => TodoServiceError::Database(other),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TodoState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

pub struct TodoService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl TodoService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> TodoService<'_> {
        TodoService { db }
    }

    /// Creates a new todo entry in the database.
    ///
    /// # Arguments
    ///
    /// * `title` - The title of the todo.
    /// * `description` - An optional free-form description.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `TodoItem` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn create_todo(
        &self,
        title: String,
        description: Option<String>,
    ) -> Result<TodoItem, TodoServiceError> {
        let now = Utc::now().fixed_offset();
        let active_model = todo::ActiveModel {
            title: ActiveValue::Set(title),
            description: ActiveValue::Set(description),
            completed: ActiveValue::Set(false),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        let created_model = active_model.insert(self.db).await?;
        Ok(TodoItem::from(created_model))
    }

    /// Retrieves a todo entry by its ID.
    ///
    /// # Arguments
    ///
    /// * `id` - The ID of the todo to retrieve.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `TodoItem` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn get_todo_by_id(&self, id: i32) -> Result<TodoItem, TodoServiceError> {
        let todo_model = self.find_model(id).await?;
        Ok(TodoItem::from(todo_model))
    }

    /// Retrieves one page of todos in insertion order.
    ///
    /// `skip` and `limit` are handed to the database unchecked, so PostgreSQL
    /// decides what a negative or huge value means.
    ///
    /// # Arguments
    ///
    /// * `skip` - The number of todos to skip.
    /// * `limit` - The maximum number of todos to return.
    ///
    /// # Returns
    ///
    /// A `Result` containing a vector of `TodoItem` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn list_todos(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<TodoItem>, TodoServiceError> {
        let statement = Statement::from_sql_and_values(
            self.db.get_database_backend(),
            r#"SELECT * FROM "todos" ORDER BY "id" ASC OFFSET $1 LIMIT $2"#,
            [skip.into(), limit.into()],
        );
        let todos = todo::Entity::find()
            .from_raw_sql(statement)
            .all(self.db)
            .await?
            .into_iter()
            .map(TodoItem::from)
            .collect();
        Ok(todos)
    }

    /// Applies a partial update to a todo entry by its ID.
    ///
    /// Only the fields present in `changes` are written; `updated_at` is
    /// always refreshed.
    ///
    /// # Arguments
    ///
    /// * `id` - The ID of the todo to edit.
    /// * `changes` - The fields to overwrite.
    ///
    /// # Returns
    ///
    /// A `Result` containing the updated `TodoItem` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn edit_todo_by_id(
        &self,
        id: i32,
        changes: TodoChanges,
    ) -> Result<TodoItem, TodoServiceError> {
        let todo_to_update = self.find_model(id).await?;

        let mut active_model: todo::ActiveModel = todo_to_update.into();
        if let Some(title) = changes.title {
            active_model.title = ActiveValue::Set(title);
        }
        if let Some(description) = changes.description {
            active_model.description = ActiveValue::Set(description);
        }
        if let Some(completed) = changes.completed {
            active_model.completed = ActiveValue::Set(completed);
        }
        active_model.updated_at = ActiveValue::Set(Utc::now().fixed_offset());
        let updated_model = active_model
            .update(self.db)
            .await
            .map_err(|err| TodoServiceError::from_update(id, err))?;

        Ok(TodoItem::from(updated_model))
    }

    /// Deletes a todo entry by its ID.
    ///
    /// # Arguments
    ///
    /// * `id` - The ID of the todo to delete.
    ///
    /// # Returns
    ///
    /// A `Result` containing the deleted `TodoItem` if successful, or an error otherwise.
    #[tracing::instrument(skip(self))]
    pub async fn delete_todo_by_id(&self, id: i32) -> Result<TodoItem, TodoServiceError> {
        let todo_to_delete = self.find_model(id).await?;

        let deleted = todo::Entity::delete_by_id(id).exec(self.db).await?;
        if deleted.rows_affected == 0 {
            return Err(TodoServiceError::TodoNotFound(id));
        }
        Ok(TodoItem::from(todo_to_delete))
    }

    async fn find_model(&self, id: i32) -> Result<todo::Model, TodoServiceError> {
        todo::Entity::find_by_id(id)
            .one(self.db)
            .await?
            .ok_or(TodoServiceError::TodoNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_convert_model_to_todo_item() {
        let created_at = DateTime::parse_from_rfc3339("2025-10-19T08:00:00+02:00").unwrap();
        let updated_at = DateTime::parse_from_rfc3339("2025-10-19T09:30:00+02:00").unwrap();
        let model = todo::Model {
            id: 7,
            title: "Buy milk".to_string(),
            description: None,
            completed: true,
            created_at,
            updated_at,
        };

        let item = TodoItem::from(model);

        assert_eq!(item.id(), 7);
        assert_eq!(item.title(), "Buy milk");
        assert_eq!(item.description(), None);
        assert!(item.completed());
        assert_eq!(item.created_at().to_rfc3339(), "2025-10-19T06:00:00+00:00");
        assert_eq!(item.updated_at().to_rfc3339(), "2025-10-19T07:30:00+00:00");
    }

    #[test]
    fn can_render_not_found_error_message() {
        let error = TodoServiceError::TodoNotFound(42);
        assert_eq!(error.to_string(), "Todo with ID 42 not found");
    }

    #[test]
    fn can_map_unmatched_update_to_not_found() {
        let error = TodoServiceError::from_update(5, DbErr::RecordNotUpdated);
        assert!(matches!(error, TodoServiceError::TodoNotFound(5)));
    }

    #[test]
    fn can_keep_other_update_failures_as_database_errors() {
        let error =
            TodoServiceError::from_update(5, DbErr::Custom("connection reset".to_string()));
        assert!(matches!(error, TodoServiceError::Database(_)));
    }
}
