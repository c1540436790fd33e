//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;
use crate::services::ServiceError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    Service(ServiceError),
    /// Malformed request that never reached a service.
    BadRequest(String),
}

pub fn status_for(error: &ServiceError) -> StatusCode {
    match error {
        ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::PolicyViolation(_) | ServiceError::InvalidTransition(_) => {
            StatusCode::CONFLICT
        }
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Service(ServiceError::Repository(e)) => {
                tracing::error!(error = %e, "repository failure");
                let mut body = ApiError::new("REPOSITORY_ERROR", "storage operation failed");
                if let Some(op) = e.context().operation.as_deref() {
                    body = body.with_details(format!("operation={}", op));
                }
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
            AppError::Service(e) => (status_for(&e), ApiError::new(e.code(), e.to_string())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::new("INVALID_INPUT", msg)),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        AppError::Service(err)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Service(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::forbidden("x"), StatusCode::FORBIDDEN),
            (ServiceError::not_found("x"), StatusCode::NOT_FOUND),
            (ServiceError::policy("x"), StatusCode::CONFLICT),
            (ServiceError::InvalidTransition("x".into()), StatusCode::CONFLICT),
            (ServiceError::invalid_input("x"), StatusCode::BAD_REQUEST),
            (
                ServiceError::Repository(RepositoryError::internal("down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(&error), status, "{:?}", error);
        }
    }

    #[test]
    fn test_response_status_from_service_error() {
        let response = AppError::from(ServiceError::policy("slot is full")).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_repository_not_found_becomes_404() {
        let response = AppError::from(RepositoryError::not_found("booking 9")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
