use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flashzap_core::{CoreError, ImportError, ReviewError};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug)]
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

    pub fn session_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "review session not found or expired")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        let status = match e {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Invalid(_) => StatusCode::BAD_REQUEST,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::Storage(_) => {
                error!(error = %e, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<ReviewError> for ApiError {
    fn from(e: ReviewError) -> Self {
        match e {
            ReviewError::Oracle(inner) => {
                warn!(error = %inner, "grading failed");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "Grading service temporarily unavailable")
            }
            ReviewError::Store(inner) => inner.into(),
            ReviewError::Drained | ReviewError::NotCurrent => Self::new(StatusCode::CONFLICT, e.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::Store(inner) => inner.into(),
            other => Self::new(StatusCode::BAD_REQUEST, format!("Import failed: {other}")),
        }
    }
}
