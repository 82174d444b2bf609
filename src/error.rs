// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::{
    models::schedule::ScheduleError,
    services::session::SessionError,
    store::StoreError,
};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (e.g., outside every schedule window)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., retake locked, session already submitted)
    Conflict(String),

    // 422 Unprocessable Entity (e.g., subject without questions)
    Unprocessable(String),

    // 503 Service Unavailable (record store unreachable)
    ServiceUnavailable(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON `{"error": ...}` response with the matching status.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service Unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            e @ StoreError::NotFound { .. } => AppError::NotFound(e.to_string()),
            StoreError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            StoreError::InvalidInput(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let msg = err.to_string();
        match err {
            SessionError::NotEligible(_) => AppError::Forbidden(msg),
            SessionError::Locked(_) | SessionError::NotActive => AppError::Conflict(msg),
            SessionError::SubjectUnavailable(_) | SessionError::NotFound => AppError::NotFound(msg),
            SessionError::NoQuestions(_) => AppError::Unprocessable(msg),
            SessionError::StoreUnavailable(_) => AppError::ServiceUnavailable(msg),
            SessionError::UnknownQuestion(_) | SessionError::UnknownOption { .. } => {
                AppError::BadRequest(msg)
            }
        }
    }
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fields::Key;

    fn status(err: impl Into<AppError>) -> StatusCode {
        let err: AppError = err.into();
        err.into_response().status()
    }

    #[test]
    fn session_errors_map_to_statuses() {
        assert_eq!(status(SessionError::NotEligible(1)), StatusCode::FORBIDDEN);
        assert_eq!(status(SessionError::Locked(1)), StatusCode::CONFLICT);
        assert_eq!(status(SessionError::NotActive), StatusCode::CONFLICT);
        assert_eq!(status(SessionError::SubjectUnavailable(1)), StatusCode::NOT_FOUND);
        assert_eq!(status(SessionError::NoQuestions(1)), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            status(SessionError::StoreUnavailable(1)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(SessionError::UnknownQuestion(Key::from(3))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn store_errors_map_to_statuses() {
        assert_eq!(
            status(StoreError::Unavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(StoreError::InvalidInput("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
