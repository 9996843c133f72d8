//! Error types for the lc-catalog crate.

use lc_core::EntryId;

/// Errors returned by a [`CatalogStore`](crate::CatalogStore).
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The underlying database failed.
    #[error("catalog database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No entry has the given id.
    #[error("catalog entry not found: {0}")]
    NotFound(EntryId),

    /// Failed to prepare the database location.
    #[error("failed to prepare catalog location: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be decoded.
    #[error("corrupt catalog row {id}: {reason}")]
    Corrupt {
        /// Id of the offending row.
        id: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl CatalogError {
    /// Returns `true` if the failure is plausibly transient (a busy or
    /// locked database) rather than a constraint or data problem.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(err) => matches!(
                err.sqlite_error_code(),
                Some(
                    rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                        | rusqlite::ErrorCode::SystemIoFailure
                )
            ),
            Self::Io(_) => true,
            Self::NotFound(_) | Self::Corrupt { .. } => false,
        }
    }

    /// Returns `true` if a uniqueness or other constraint was violated.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(err)
                if err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation)
        )
    }
}
