use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;
use tracing::error;

use crate::JsonResponse;

// SQLITE_CONSTRAINT_PRIMARYKEY and SQLITE_CONSTRAINT_UNIQUE extended result codes.
const SQLITE_PRIMARY_KEY_VIOLATION: &str = "1555";
const SQLITE_UNIQUE_VIOLATION: &str = "2067";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    NotAuthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("{0}")]
    ValidationError(String),
    #[error("Internal Server Error")]
    ServerError,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct RequestErrorJsonWrapper {
    pub errors: RequestErrorJson,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
pub struct RequestErrorJson {
    pub body: Vec<String>,
}

impl RequestErrorJsonWrapper {
    pub fn new(error: &str) -> RequestErrorJsonWrapper {
        RequestErrorJsonWrapper {
            errors: RequestErrorJson {
                body: vec![error.to_string()],
            },
        }
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> axum::response::Response {
        self.to_json_response().into_response()
    }
}

impl RequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RequestError::NotFound(_) => StatusCode::NOT_FOUND,
            RequestError::NotAuthorized(_) => StatusCode::UNAUTHORIZED,
            RequestError::Forbidden(_) => StatusCode::FORBIDDEN,
            RequestError::Conflict(_) => StatusCode::CONFLICT,
            RequestError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RequestError::ServerError | RequestError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn to_json_response(&self) -> JsonResponse<RequestErrorJsonWrapper> {
        let json = match self {
            RequestError::DatabaseError(e) => {
                error!(error = %e, "database error");
                RequestErrorJsonWrapper::new("Internal Server Error")
            }
            other => RequestErrorJsonWrapper::new(&other.to_string()),
        };
        (self.status_code(), Json(json))
    }
}

/// True when the store rejected a write because a uniqueness or primary-key
/// constraint already holds the row.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(e) => {
            matches!(
                e.code().as_deref(),
                Some(SQLITE_PRIMARY_KEY_VIOLATION) | Some(SQLITE_UNIQUE_VIOLATION)
            ) || e.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

/// Like [`is_unique_violation`] but only for violations naming `column`,
/// e.g. `articles.slug`.
pub fn is_unique_violation_on(error: &sqlx::Error, column: &str) -> bool {
    match error {
        sqlx::Error::Database(e) => is_unique_violation(error) && e.message().contains(column),
        _ => false,
    }
}
