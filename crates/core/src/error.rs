//! Domain error model.

use thiserror::Error;

use crate::id::{ItemId, WarehouseId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// missing references, stock shortages). Storage failures belong to the
/// infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation before any write (missing field, non-positive
    /// quantity or amount, allocation sum mismatch).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced item, warehouse, invoice, payment or customer does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A path that checks availability explicitly found too little stock.
    #[error(
        "insufficient stock for item {item} in warehouse {warehouse}: available {available}, required {required}"
    )]
    InsufficientStock {
        item: ItemId,
        warehouse: WarehouseId,
        available: i64,
        required: i64,
    },

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The operation conflicts with existing state (e.g. a second opening balance).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(
        item: ItemId,
        warehouse: WarehouseId,
        available: i64,
        required: i64,
    ) -> Self {
        Self::InsufficientStock {
            item,
            warehouse,
            available,
            required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_message_names_both_quantities() {
        let err = DomainError::insufficient_stock(ItemId::new(7), WarehouseId::new(2), 3, 10);
        let msg = err.to_string();
        assert!(msg.contains("available 3"));
        assert!(msg.contains("required 10"));
    }
}
