use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use crate::domain::index::IndexError;
use crate::domain::search::SearchError;
use crate::domain::segment::SegmentError;
use crate::repositories::RepositoryError;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match &err {
            RepositoryError::NotFound(_) => Self::not_found(err.to_string()),
            RepositoryError::IntegrityViolation(_) => Self::unprocessable(err.to_string()),
            RepositoryError::Embedding(_) => {
                tracing::error!("Embedding failure during ingest: {:?}", err);
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
            RepositoryError::Database(e) | RepositoryError::Transient(e) => {
                tracing::error!("Database error: {:?}", e);
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<SegmentError> for ApiError {
    fn from(err: SegmentError) -> Self {
        match err {
            SegmentError::InputTooLarge(_) => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
            }
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match &err {
            SearchError::Database(e) => {
                tracing::error!("Database error during search: {}", e);
                Self::internal(err.to_string())
            }
            SearchError::Embedding(_) | SearchError::Reranking(_) => {
                Self::new(StatusCode::BAD_GATEWAY, err.to_string())
            }
        }
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        match &err {
            IndexError::Database(e) => {
                tracing::error!("Database error during index management: {:?}", e);
                Self::internal(err.to_string())
            }
        }
    }
}
