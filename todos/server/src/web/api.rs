use std::error::Error as StdError;
use std::sync::Arc;

use crate::todo::{TodoServiceError, TodoState};

use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts,
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

/// JSON response for API errors that carry a single message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: String) -> Self {
        Self { detail }
    }
}

/// One problem found while validating a request.
#[derive(Debug, Serialize, ToSchema, PartialEq)]
pub struct ValidationErrorDetail {
    /// Where the problem was found, e.g. `["path", "todo_id"]`
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl ValidationErrorDetail {
    fn new(loc: Vec<String>, msg: String, kind: &str) -> Self {
        Self {
            loc,
            msg,
            kind: kind.to_string(),
        }
    }
}

/// JSON response for requests that failed validation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationErrorResponse {
    pub detail: Vec<ValidationErrorDetail>,
}

/// Errors returned by the JSON API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Todo not found")]
    NotFound,
    /// The request did not match the expected schema.
    #[error("Request validation failed")]
    Validation(Vec<ValidationErrorDetail>),
    #[error("Internal server error")]
    Internal,
}

impl From<TodoServiceError> for ApiError {
    fn from(err: TodoServiceError) -> Self {
        match err {
            TodoServiceError::TodoNotFound(_) => ApiError::NotFound,
            TodoServiceError::Database(db_err) => {
                tracing::error!("Database operation failed: {}", db_err);
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let mut loc = vec!["body".to_string()];
        let kind = match &rejection {
            JsonRejection::JsonDataError(err) => {
                loc.extend(json_field_path(err));
                "value_error"
            }
            JsonRejection::JsonSyntaxError(_) => "json_invalid",
            JsonRejection::MissingJsonContentType(_) => "content_type",
            _ => "body_error",
        };
        ApiError::Validation(vec![ValidationErrorDetail::new(
            loc,
            rejection.body_text(),
            kind,
        )])
    }
}

/// Finds the field a JSON body failed on.
///
/// axum keeps the `serde_path_to_error` error in the rejection's source
/// chain. Type mismatches carry a path; a missing field is reported at the
/// parent, so its name is taken from serde's message instead.
fn json_field_path(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut source = err.source();
    while let Some(current) = source {
        if let Some(path_err) =
            current.downcast_ref::<serde_path_to_error::Error<serde_json::Error>>()
        {
            let path = path_err.path().to_string();
            if path != "." {
                return path.split('.').map(str::to_string).collect();
            }
            return missing_field_name(&path_err.inner().to_string())
                .into_iter()
                .collect();
        }
        source = current.source();
    }
    Vec::new()
}

fn missing_field_name(message: &str) -> Option<String> {
    let rest = message.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_string())
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        let mut loc = vec!["path".to_string()];
        if let PathRejection::FailedToDeserializePathParams(err) = &rejection {
            if let ErrorKind::ParseErrorAtKey { key, .. } = err.kind() {
                loc.push(key.clone());
            }
        }
        ApiError::Validation(vec![ValidationErrorDetail::new(
            loc,
            rejection.body_text(),
            "type_error",
        )])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Validation(vec![ValidationErrorDetail::new(
            vec!["query".to_string()],
            rejection.body_text(),
            "type_error",
        )])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Todo not found".to_string())),
            )
                .into_response(),
            ApiError::Validation(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ValidationErrorResponse { detail }),
            )
                .into_response(),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Internal server error".to_string())),
            )
                .into_response(),
        }
    }
}

/// `axum::Json` that reports rejections as validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ValidJson<T>(pub T);

/// `axum::extract::Path` that reports rejections as validation errors.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ValidPath<T>(pub T);

/// `axum::extract::Query` that reports rejections as validation errors.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ValidQuery<T>(pub T);

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Todo API",
        description = "A simple Todo API service",
        version = "1.0.0"
    ),
    paths(
        crate::todo::api::create_todo_handler,
        crate::todo::api::list_todos_handler,
        crate::todo::api::get_todo_handler,
        crate::todo::api::update_todo_handler,
        crate::todo::api::delete_todo_handler,
    ),
    components(schemas(ErrorResponse, ValidationErrorResponse, ValidationErrorDetail)),
    tags((name = "todos", description = "Todo management endpoints"))
)]
pub struct ApiDoc;

/// Creates the API routes for JSON API endpoints, plus the OpenAPI document and Swagger UI.
pub fn create_api_router(todo_state: Arc<TodoState>) -> Router {
    let todos_router = crate::todo::api::create_api_router(todo_state);
    Router::new()
        .merge(todos_router)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}
