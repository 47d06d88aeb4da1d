//! Error-to-status mapping.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use intake_spec::FormError;
use thiserror::Error;

use crate::models::{ApiResponse, ErrorBody};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Form(FormError::Validation(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
            }
            ApiError::Form(FormError::NotFound { .. }) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Form(FormError::Conflict { .. }) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Form(FormError::Persistence { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "persistence_error")
            }
            ApiError::Form(FormError::Authorization(_)) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => ApiError::Unprocessable(err.body_text()),
            other => ApiError::BadRequest(other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        let (message, fields) = match self {
            ApiError::Form(FormError::Validation(failure)) => (failure.message, failure.errors),
            other => (other.to_string(), Vec::new()),
        };
        let body = ApiResponse::<()>::error(ErrorBody {
            code: code.to_string(),
            message,
            fields,
        });
        (status, Json(body)).into_response()
    }
}
