//! Error handling for the Vigil server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Result type alias for handler and mirror operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Server error types, each carrying its HTTP mapping
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized: '{0}'")]
    Unauthorized(String),

    #[error("not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(why) => (StatusCode::BAD_REQUEST, why).into_response(),
            ApiError::Unauthorized(_) => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::Database(_) | ApiError::Storage(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("An error occurred: '{}'", self),
                )
                    .into_response()
            }
            ApiError::Internal(what) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An error occurred: '{}'", what),
            )
                .into_response(),
        }
    }
}
