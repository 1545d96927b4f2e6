//! Error taxonomy shared by every store backend

use crate::storage::ObjectId;
use std::sync::PoisonError;

/// The four outcomes a caller can branch on.
///
/// `NotFound` and `Conflict` are expected outcomes of the contract, not
/// faults. Anything the medium itself failed at is an `IoFailure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Conflict,
    NotFound,
    IoFailure,
}

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A required argument was empty or malformed for this backend.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An explicit identifier already denotes a live entry.
    #[error("identifier already present: {0}")]
    Conflict(ObjectId),

    /// No live entry exists for the identifier.
    #[error("identifier not present: {0}")]
    NotFound(ObjectId),

    /// I/O error from the payload stream or the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the database backend.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A lock guarding backend state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    /// Collapse the error into its contract-level kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Io(_) | Self::Database(_) | Self::LockPoisoned(_) => ErrorKind::IoFailure,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(err: PoisonError<T>) -> Self {
        StoreError::LockPoisoned(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(StoreError::InvalidArgument("x".into()).kind(), ErrorKind::InvalidArgument);
        assert_eq!(StoreError::Conflict("a".into()).kind(), ErrorKind::Conflict);
        assert_eq!(StoreError::NotFound("a".into()).kind(), ErrorKind::NotFound);

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "device gone");
        // A medium-level "not found" that reaches us as io::Error stays a fault.
        assert_eq!(StoreError::from(io).kind(), ErrorKind::IoFailure);
        assert_eq!(StoreError::LockPoisoned("p".into()).kind(), ErrorKind::IoFailure);
        assert_eq!(
            StoreError::from(rusqlite::Error::ExecuteReturnedResults).kind(),
            ErrorKind::IoFailure
        );
    }

    #[test]
    fn test_predicates_and_display() {
        let err = StoreError::NotFound("abc".into());
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
        assert_eq!(err.to_string(), "identifier not present: abc");

        let err = StoreError::Conflict("fixed-id".into());
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "identifier already present: fixed-id");
    }
}
