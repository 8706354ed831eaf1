use serde::{Deserialize, Serialize};

use bizbooks_core::{CustomerId, DomainError, DomainResult, Entity, Money};

/// Customer with its cached receivables aggregate.
///
/// `current_balance` is the sum of `balance_amount` over the customer's open
/// invoices (Unpaid, Partially Paid, Overdue). It is always recomputed in full,
/// never adjusted by a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub code: String,
    pub name: String,
    pub credit_limit: Money,
    pub opening_balance: Money,
    pub current_balance: Money,
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> CustomerId {
        self.id
    }
}

impl Customer {
    /// Remaining credit; negative once the limit is exceeded. A zero limit
    /// means "no limit configured" and yields `None`.
    pub fn available_credit(&self) -> Option<Money> {
        if self.credit_limit.is_zero() {
            None
        } else {
            Some(self.credit_limit - self.current_balance)
        }
    }

    pub fn is_over_credit_limit(&self) -> bool {
        self.available_credit().is_some_and(|m| m.is_negative())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub credit_limit: Money,
}

impl NewCustomer {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            credit_limit: Money::ZERO,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.code.trim().is_empty() {
            return Err(DomainError::validation("customer code cannot be empty"));
        }
        if self.credit_limit.is_negative() {
            return Err(DomainError::validation("credit limit cannot be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customer(limit: i64, balance: i64) -> Customer {
        Customer {
            id: CustomerId::new(1),
            code: "C001".into(),
            name: "Acme".into(),
            credit_limit: Money::from_cents(limit),
            opening_balance: Money::ZERO,
            current_balance: Money::from_cents(balance),
        }
    }

    #[test]
    fn credit_limit_zero_means_unlimited() {
        assert_eq!(customer(0, 5_000).available_credit(), None);
        assert!(!customer(0, 5_000).is_over_credit_limit());
    }

    #[test]
    fn over_limit_is_detected() {
        assert_eq!(
            customer(10_000, 4_000).available_credit(),
            Some(Money::from_cents(6_000))
        );
        assert!(customer(10_000, 10_001).is_over_credit_limit());
    }
}
