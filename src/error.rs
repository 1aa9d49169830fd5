use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;
use crate::upload::{UploadError, UNSUPPORTED_TYPE_INSTRUCTIONS};

/// Errors surfaced by the HTTP API as `{"error": ..., "instructions"?: ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("teacher {0} not found")]
    NotFound(Uuid),
    #[error("a teacher with faculty number '{0}' already exists")]
    Duplicate(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(teacher_id) => ApiError::Duplicate(teacher_id),
            StoreError::Other(err) => ApiError::Internal(err),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'static str>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Duplicate(_) => StatusCode::CONFLICT,
            ApiError::Upload(UploadError::UnsupportedType(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Internal(err) => {
                tracing::error!(error = ?err, "request failed");
                ErrorBody {
                    error: "internal server error".to_string(),
                    instructions: None,
                }
            }
            ApiError::Upload(UploadError::UnsupportedType(_)) => ErrorBody {
                error: self.to_string(),
                instructions: Some(UNSUPPORTED_TYPE_INSTRUCTIONS),
            },
            other => {
                tracing::warn!(%status, error = %other, "request rejected");
                ErrorBody {
                    error: other.to_string(),
                    instructions: None,
                }
            }
        };
        (status, Json(body)).into_response()
    }
}
