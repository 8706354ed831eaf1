//! Infrastructure error model.

use thiserror::Error;

use bizbooks_core::DomainError;

/// Storage failure, independent of the backing engine.
///
/// Both stores map their native failures onto these variants; the Postgres
/// mapping is in [`crate::store::postgres`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint rejected the write (duplicate code or number).
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// A row references a parent that does not exist.
    #[error("foreign key violated: {0}")]
    ForeignKeyViolation(String),

    /// An update or delete targeted a row that does not exist.
    #[error("row not found: {0}")]
    RowNotFound(String),

    /// Stored data could not be decoded into its domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Error returned by every ledger service operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::validation(msg))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::Domain(DomainError::not_found(what))
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::conflict(msg))
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Domain(DomainError::invariant(msg))
    }
}
