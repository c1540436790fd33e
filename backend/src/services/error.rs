//! Error and warning types returned by the service layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::repository::RepositoryError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Why an operation was refused or failed.
///
/// Calendar failures are deliberately absent: they never fail an operation
/// and are reported as [`ServiceWarning`]s next to the successful result.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A business rule refused the request (capacity, credit, notice period, overlap).
    #[error("{0}")]
    PolicyViolation(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Repository(RepositoryError),
}

impl ServiceError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthorized(_) => "UNAUTHORIZED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::PolicyViolation(_) => "POLICY_VIOLATION",
            ServiceError::InvalidTransition(_) => "INVALID_TRANSITION",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::Repository(_) => "REPOSITORY_ERROR",
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn policy(message: impl Into<String>) -> Self {
        ServiceError::PolicyViolation(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput(message.into())
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { message, .. } => ServiceError::NotFound(message),
            RepositoryError::ConflictError { message, .. } => ServiceError::PolicyViolation(message),
            other => ServiceError::Repository(other),
        }
    }
}

impl From<crate::models::InvalidTransition> for ServiceError {
    fn from(err: crate::models::InvalidTransition) -> Self {
        ServiceError::InvalidTransition(err.to_string())
    }
}

/// Non-fatal problem attached to a successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceWarning {
    pub kind: String,
    pub message: String,
}

impl ServiceWarning {
    pub const EXTERNAL_SERVICE_FAILURE: &'static str = "EXTERNAL_SERVICE_FAILURE";

    pub fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::new(Self::EXTERNAL_SERVICE_FAILURE, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_not_found_becomes_not_found() {
        let err: ServiceError = RepositoryError::not_found("Booking 7 not found").into();
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.to_string(), "not found: Booking 7 not found");
    }

    #[test]
    fn test_repository_conflict_becomes_policy_violation() {
        let err: ServiceError = RepositoryError::conflict_with_context(
            "duplicate live booking",
            crate::db::repository::ErrorContext::new("reserve_slot"),
        )
        .into();
        assert_eq!(err.code(), "POLICY_VIOLATION");
    }

    #[test]
    fn test_other_repository_errors_stay_repository_errors() {
        let err: ServiceError = RepositoryError::timeout_with_context(
            "pool exhausted",
            crate::db::repository::ErrorContext::new("get_connection"),
        )
        .into();
        assert_eq!(err.code(), "REPOSITORY_ERROR");
    }

    #[test]
    fn test_external_warning_kind() {
        let warning = ServiceWarning::external("calendar down");
        assert_eq!(warning.kind, "EXTERNAL_SERVICE_FAILURE");
        assert_eq!(warning.message, "calendar down");
    }
}
