use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use bizbooks_core::{
    AllocationId, CustomerId, DomainError, DomainResult, Entity, InvoiceId, Money, PaymentId,
    UserId,
};

/// Rounding tolerance between a payment amount and its allocation sum.
pub const ALLOCATION_TOLERANCE: Money = Money::MINOR_UNIT;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub payment_no: String,
    pub customer_id: CustomerId,
    pub payment_date: NaiveDate,
    pub amount: Money,
    pub method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> PaymentId {
        self.id
    }
}

/// Payment row before insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub payment_no: String,
    pub customer_id: CustomerId,
    pub payment_date: NaiveDate,
    pub amount: Money,
    pub method: String,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
}

/// Part of one payment applied to one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub id: AllocationId,
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Money,
}

impl Entity for PaymentAllocation {
    type Id = AllocationId;

    fn id(&self) -> AllocationId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub invoice_id: InvoiceId,
    pub amount: Money,
}

/// Payment taken together with an invoice (create or update).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmediatePayment {
    pub amount: Money,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub payment_date: Option<NaiveDate>,
}

fn default_method() -> String {
    "cash".to_string()
}

impl ImmediatePayment {
    pub fn cash(amount: Money) -> Self {
        Self {
            amount,
            method: default_method(),
            reference: None,
            payment_date: None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if !self.amount.is_positive() {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        Ok(())
    }
}

/// The hard gate of the reconciliation path: every allocation positive, no
/// invoice listed twice, and the allocations summing to `amount` within
/// [`ALLOCATION_TOLERANCE`].
pub fn validate_allocations(amount: Money, allocations: &[AllocationRequest]) -> DomainResult<()> {
    if !amount.is_positive() {
        return Err(DomainError::validation("payment amount must be positive"));
    }
    if allocations.is_empty() {
        return Err(DomainError::validation(
            "payment must be allocated to at least one invoice",
        ));
    }

    let mut seen = HashSet::new();
    for a in allocations {
        if !a.amount.is_positive() {
            return Err(DomainError::validation(format!(
                "allocation to invoice {} must be positive",
                a.invoice_id
            )));
        }
        if !seen.insert(a.invoice_id) {
            return Err(DomainError::validation(format!(
                "invoice {} allocated more than once",
                a.invoice_id
            )));
        }
    }

    let allocated: Money = allocations.iter().map(|a| a.amount).sum();
    if !allocated.within(amount, ALLOCATION_TOLERANCE) {
        return Err(DomainError::validation(format!(
            "allocations total {allocated} does not match payment amount {amount}"
        )));
    }
    Ok(())
}
