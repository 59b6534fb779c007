//! Error → HTTP response mapping.
//!
//! Body shape for every error: `{"error": <code>, "message": <text>}`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use usergate_core::DomainError;
use usergate_infra::{AuthError, DirectoryError};

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound,
    Conflict,
    Validation(String),
    /// Cause is logged, never returned to the client.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::Unauthorized => json_error(
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                AuthError::Unauthorized.to_string(),
            ),
            ApiError::NotFound => json_error(
                StatusCode::NOT_FOUND,
                "not_found",
                DirectoryError::NotFound.to_string(),
            ),
            ApiError::Conflict => json_error(
                StatusCode::CONFLICT,
                "conflict",
                DirectoryError::Conflict.to_string(),
            ),
            ApiError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Internal(cause) => {
                tracing::error!(%cause, "request failed");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error.",
                )
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::Unauthorized => ApiError::Unauthorized,
        }
    }
}

impl From<DirectoryError> for ApiError {
    fn from(value: DirectoryError) -> Self {
        match value {
            DirectoryError::NotFound => ApiError::NotFound,
            DirectoryError::Conflict => ApiError::Conflict,
            DirectoryError::Store(e) => ApiError::Internal(e.to_string()),
            DirectoryError::Hashing(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ApiError::Validation(msg),
            // An id that does not parse cannot name an existing user.
            DomainError::InvalidId(_) => ApiError::NotFound,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        ApiError::Validation(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        ApiError::Validation(value.body_text())
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
