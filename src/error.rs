use thiserror::Error;

/// Failures raised by the persistence gateway.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection failed: {0}")]
    Connection(String),
    #[error("database query failed: {0}")]
    Query(String),
    #[error("row serialization failed: {0}")]
    Serialization(String),
    #[error("store constraint violated: {0}")]
    Constraint(String),
}

impl DatabaseError {
    /// Classify a raw store failure by its message. SQLite reports both
    /// foreign-key and uniqueness violations as "... constraint failed".
    fn from_store_message(message: String) -> Self {
        if message.to_ascii_lowercase().contains("constraint") {
            DatabaseError::Constraint(message)
        } else {
            DatabaseError::Query(message)
        }
    }
}

impl From<libsql::Error> for DatabaseError {
    fn from(err: libsql::Error) -> Self {
        DatabaseError::from_store_message(err.to_string())
    }
}

/// Failures crossing the domain-service boundary.
///
/// Services convert every lower-level persistence failure into one of these
/// kinds before returning; no raw storage error type escapes the service
/// layer. Each variant carries the message text that is also published as a
/// failure notification on the mediator.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed or out-of-range input, including a create that references
    /// a missing entity.
    #[error("{0}")]
    Validation(String),
    /// The targeted id does not resolve to a live entity.
    #[error("{0}")]
    NotFound(String),
    /// The operation would violate a restrict-delete relationship.
    #[error("{0}")]
    Constraint(String),
    /// Unexpected persistence fault, surfaced as message text only.
    #[error("{0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::{DatabaseError, DomainError};

    #[test]
    fn constraint_messages_from_store_are_classified() {
        let err = DatabaseError::from_store_message("FOREIGN KEY constraint failed".to_string());
        assert!(matches!(err, DatabaseError::Constraint(_)));

        let err = DatabaseError::from_store_message(
            "UNIQUE constraint failed: invoices.number".to_string(),
        );
        assert!(matches!(err, DatabaseError::Constraint(_)));

        let err = DatabaseError::from_store_message("no such table: nonsense".to_string());
        assert!(matches!(err, DatabaseError::Query(_)));
    }

    #[test]
    fn domain_errors_display_their_message_verbatim() {
        let err = DomainError::NotFound("case 42 not found".to_string());
        assert_eq!(err.to_string(), "case 42 not found");
    }
}
