//! Tests for db::repository::error and its mapping into service errors.

use lms_booking::db::repository::{ErrorContext, RepositoryError};
use lms_booking::services::ServiceError;

#[test]
fn test_error_context_display() {
    let ctx = ErrorContext::new("cancel_booking")
        .with_entity("booking")
        .with_entity_id(42)
        .with_details("row locked");

    assert_eq!(
        ctx.to_string(),
        "[operation=cancel_booking, entity=booking, id=42, details=row locked]"
    );
}

#[test]
fn test_error_context_display_skips_missing_fields() {
    let ctx = ErrorContext::new("reserve_slot").retryable();
    assert_eq!(ctx.to_string(), "[operation=reserve_slot, retryable=true]");
}

#[test]
fn test_pool_timeout_is_retryable() {
    let err = RepositoryError::timeout_with_context(
        "timed out waiting for connection",
        ErrorContext::new("get_connection"),
    );
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("Timeout error"));
    assert_eq!(err.context().operation.as_deref(), Some("get_connection"));
}

#[test]
fn test_retried_serialization_failure_keeps_its_operation() {
    let err = RepositoryError::QueryError {
        message: "could not serialize access due to concurrent update".to_string(),
        context: ErrorContext::new("reserve_slot").retryable(),
    };
    assert!(err.is_retryable());
    assert_eq!(err.context().operation.as_deref(), Some("reserve_slot"));
}

#[test]
fn test_not_found_and_conflict_are_not_retried() {
    let missing = RepositoryError::not_found_with_context(
        "Booking 7 not found",
        ErrorContext::new("get_booking").with_entity("booking").with_entity_id(7),
    );
    assert!(missing.is_not_found());
    assert!(!missing.is_retryable());

    let duplicate =
        RepositoryError::conflict_with_context("already booked", ErrorContext::new("reserve_slot"));
    assert!(!duplicate.is_not_found());
    assert!(!duplicate.is_retryable());
}

#[test]
fn test_repository_errors_map_to_service_codes() {
    let err: ServiceError = RepositoryError::not_found("Booking 7 not found").into();
    assert_eq!(err.code(), "NOT_FOUND");

    let err: ServiceError =
        RepositoryError::conflict_with_context("already booked", ErrorContext::new("reserve_slot"))
            .into();
    assert_eq!(err.code(), "POLICY_VIOLATION");

    let err: ServiceError = RepositoryError::transaction("commit failed").into();
    assert_eq!(err.code(), "REPOSITORY_ERROR");
}
