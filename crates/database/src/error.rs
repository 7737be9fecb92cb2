use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database connection settings: {0}")]
    ConnectionConfigError(String),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// A sort or filter referenced an attribute outside the Schema Registry.
    /// Raised before any statement is sent.
    #[error("{0}")]
    InvalidField(#[from] CoreError),

    #[error("Show '{0}' was not found.")]
    NotFound(String),

    /// A caller-supplied show id is already in use. Repeating the request
    /// cannot succeed.
    #[error("Show id '{0}' is already taken.")]
    DuplicateId(String),

    /// More than one row matched an identifier that the schema declares
    /// unique. This is an integrity defect in the store, never a caller error.
    #[error("Expected one show with id '{show_id}', found {matches}.")]
    Ambiguous { show_id: String, matches: usize },

    /// The storage layer rejected or aborted the transaction. Nothing from the
    /// failed request was committed, so the whole request may be retried.
    #[error("Database error: {0}")]
    ConflictOrTransient(#[from] sqlx::Error),
}

impl DbError {
    /// Whether repeating the whole request could succeed.
    ///
    /// Only storage failures qualify, and among those not the ones that would
    /// recur: row decoding problems and constraint violations.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::ConflictOrTransient(e) => is_transient(e),
            _ => false,
        }
    }
}

fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().is_some_and(|code| {
            TRANSIENT_SQLSTATE_CLASSES
                .iter()
                .any(|class| code.starts_with(class))
        }),
        sqlx::Error::Configuration(_)
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Encode(_)
        | sqlx::Error::Decode(_) => false,
        _ => true,
    }
}

/// SQLSTATE classes worth retrying: connection exceptions, transaction
/// rollbacks (serialization failures, deadlocks), insufficient resources and
/// operator intervention.
const TRANSIENT_SQLSTATE_CLASSES: [&str; 4] = ["08", "40", "53", "57"];

/// SQLSTATE of a unique constraint violation.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_storage_failures_are_retryable() {
        assert!(DbError::ConflictOrTransient(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!DbError::NotFound("x".to_string()).is_retryable());
        assert!(
            !DbError::InvalidField(CoreError::InvalidSortField(vec!["x".to_string()]))
                .is_retryable()
        );
        assert!(
            !DbError::Ambiguous {
                show_id: "x".to_string(),
                matches: 2
            }
            .is_retryable()
        );
    }

    #[test]
    fn decode_failures_and_duplicates_are_not_retryable() {
        assert!(!DbError::ConflictOrTransient(sqlx::Error::ColumnNotFound("title".to_string()))
            .is_retryable());
        assert!(!DbError::ConflictOrTransient(sqlx::Error::Decode("bad".into())).is_retryable());
        assert!(!DbError::DuplicateId("s1".to_string()).is_retryable());
        assert!(DbError::ConflictOrTransient(sqlx::Error::PoolClosed).is_retryable());
    }

    #[test]
    fn invalid_field_message_lists_offenders() {
        let err = DbError::from(CoreError::InvalidSortField(vec![
            "a".to_string(),
            "b".to_string(),
        ]));
        assert_eq!(err.to_string(), "invalid sort field(s): a, b");
    }
}
