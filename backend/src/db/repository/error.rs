//! Error types shared by the storage backends.
//!
//! Every error carries an [`ErrorContext`] naming the operation and record
//! involved. Only the operation name reaches API clients; the rest is logged.

use std::fmt;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Where a storage error happened and whether retrying can help.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Repository method, e.g. "reserve_slot".
    pub operation: Option<String>,
    /// Table-level entity, e.g. "booking" or "package".
    pub entity: Option<String>,
    pub entity_id: Option<String>,
    pub details: Option<String>,
    /// Set for serialization failures and pool timeouts.
    pub retryable: bool,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: Some(operation.into()),
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("operation", self.operation.as_deref()),
            ("entity", self.entity.as_deref()),
            ("id", self.entity_id.as_deref()),
            ("details", self.details.as_deref()),
        ];
        let mut parts: Vec<String> = fields
            .iter()
            .filter_map(|(key, value)| value.map(|v| format!("{}={}", key, v)))
            .collect();
        if self.retryable {
            parts.push("retryable=true".to_string());
        }
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Failure of a storage operation.
///
/// Business refusals (slot full, no credit, overlap) are not errors at this
/// level; they come back as outcome enums from the repository traits.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::result_large_err)]
pub enum RepositoryError {
    /// Pool could not be built or a connection was lost.
    #[error("Connection error: {message} {context}")]
    ConnectionError {
        message: String,
        context: ErrorContext,
    },

    /// Statement failed. Serialization failures are marked retryable.
    #[error("Query error: {message} {context}")]
    QueryError {
        message: String,
        context: ErrorContext,
    },

    #[error("Not found: {message} {context}")]
    NotFound {
        message: String,
        context: ErrorContext,
    },

    /// A unique index rejected the write, e.g. a second live booking for
    /// the same student, teacher and instant.
    #[error("Conflict: {message} {context}")]
    ConflictError {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message} {context}")]
    ConfigurationError {
        message: String,
        context: ErrorContext,
    },

    #[error("Internal error: {message} {context}")]
    InternalError {
        message: String,
        context: ErrorContext,
    },

    /// Commit or rollback itself failed.
    #[error("Transaction error: {message} {context}")]
    TransactionError {
        message: String,
        context: ErrorContext,
    },

    /// No pooled connection became free in time.
    #[error("Timeout error: {message} {context}")]
    TimeoutError {
        message: String,
        context: ErrorContext,
    },
}

impl RepositoryError {
    /// Connection errors are always retryable.
    pub fn connection_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ConnectionError {
            message: message.into(),
            context: context.retryable(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::QueryError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn not_found_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::NotFound {
            message: message.into(),
            context,
        }
    }

    pub fn conflict_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::ConflictError {
            message: message.into(),
            context,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    pub fn internal_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::InternalError {
            message: message.into(),
            context,
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::TransactionError {
            message: message.into(),
            context: ErrorContext::default(),
        }
    }

    /// Timeouts are always retryable.
    pub fn timeout_with_context(message: impl Into<String>, context: ErrorContext) -> Self {
        Self::TimeoutError {
            message: message.into(),
            context: context.retryable(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.context().retryable
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::ConnectionError { context, .. }
            | Self::QueryError { context, .. }
            | Self::NotFound { context, .. }
            | Self::ConflictError { context, .. }
            | Self::ConfigurationError { context, .. }
            | Self::InternalError { context, .. }
            | Self::TransactionError { context, .. }
            | Self::TimeoutError { context, .. } => context,
        }
    }
}

#[cfg(feature = "postgres-repo")]
impl From<diesel::result::Error> for RepositoryError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match err {
            Error::NotFound => RepositoryError::not_found("Record not found"),
            Error::DatabaseError(kind, info) => {
                let message = info.message().to_string();
                let context =
                    ErrorContext::default().with_details(format!("db_error_kind={:?}", kind));
                match kind {
                    DatabaseErrorKind::UniqueViolation => {
                        RepositoryError::conflict_with_context(message, context)
                    }
                    // SERIALIZABLE transactions that lost a race are retried
                    DatabaseErrorKind::SerializationFailure => RepositoryError::QueryError {
                        message,
                        context: context.retryable(),
                    },
                    _ => RepositoryError::QueryError { message, context },
                }
            }
            Error::RollbackErrorOnCommit { commit_error, .. } => {
                RepositoryError::transaction(format!("Commit failed: {}", commit_error))
            }
            Error::BrokenTransactionManager => {
                RepositoryError::transaction("Transaction manager is broken")
            }
            Error::DeserializationError(e) => {
                RepositoryError::internal(format!("Deserialization error: {}", e))
            }
            other => RepositoryError::query(other.to_string()),
        }
    }
}

/// r2d2 only fails `get()` when no connection frees up within the timeout.
#[cfg(feature = "postgres-repo")]
impl From<diesel::r2d2::PoolError> for RepositoryError {
    fn from(err: diesel::r2d2::PoolError) -> Self {
        RepositoryError::timeout_with_context(
            err.to_string(),
            ErrorContext::new("get_connection").with_details("pool_error"),
        )
    }
}

#[cfg(all(test, feature = "postgres-repo"))]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorKind, Error};

    #[test]
    fn test_serialization_failure_is_retryable_query_error() {
        let err = RepositoryError::from(Error::DatabaseError(
            DatabaseErrorKind::SerializationFailure,
            Box::new("could not serialize access".to_string()),
        ));
        assert!(matches!(err, RepositoryError::QueryError { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = RepositoryError::from(Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("bookings_live_slot_unique".to_string()),
        ));
        assert!(matches!(err, RepositoryError::ConflictError { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_diesel_not_found_is_not_found() {
        assert!(RepositoryError::from(Error::NotFound).is_not_found());
    }
}
