use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use bizbooks_core::{
    CustomerId, DomainError, DomainResult, Entity, InvoiceId, ItemId, Money, UserId, WarehouseId,
};

/// Invoice status lifecycle.
///
/// Open statuses (counted in the customer's balance): Unpaid, Partially Paid,
/// Overdue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Draft,
    Unpaid,
    #[serde(rename = "Partially Paid")]
    PartiallyPaid,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "Draft",
            InvoiceStatus::Unpaid => "Unpaid",
            InvoiceStatus::PartiallyPaid => "Partially Paid",
            InvoiceStatus::Paid => "Paid",
            InvoiceStatus::Overdue => "Overdue",
            InvoiceStatus::Cancelled => "Cancelled",
        }
    }

    /// Counted in `customers.current_balance`.
    pub fn is_open(self) -> bool {
        matches!(
            self,
            InvoiceStatus::Unpaid | InvoiceStatus::PartiallyPaid | InvoiceStatus::Overdue
        )
    }

    /// Status for a create/update request. An explicit Draft or Cancelled
    /// request is honoured while nothing has been paid; any other request is
    /// ignored in favour of the derived status.
    pub fn resolve(
        requested: Option<InvoiceStatus>,
        total: Money,
        paid: Money,
        balance: Money,
        due_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> InvoiceStatus {
        match requested {
            Some(s @ (InvoiceStatus::Draft | InvoiceStatus::Cancelled)) if paid.is_zero() => s,
            _ => derive_status(total, balance, due_date, today),
        }
    }

    /// Re-derive this status after `balance`/`paid` changed.
    ///
    /// Cancelled is never re-derived; a Draft with nothing paid stays a Draft.
    pub fn recompute(
        self,
        total: Money,
        paid: Money,
        balance: Money,
        due_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> InvoiceStatus {
        match self {
            InvoiceStatus::Cancelled => InvoiceStatus::Cancelled,
            InvoiceStatus::Draft if paid.is_zero() => InvoiceStatus::Draft,
            _ => derive_status(total, balance, due_date, today),
        }
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(InvoiceStatus::Draft),
            "Unpaid" => Ok(InvoiceStatus::Unpaid),
            "Partially Paid" => Ok(InvoiceStatus::PartiallyPaid),
            "Paid" => Ok(InvoiceStatus::Paid),
            "Overdue" => Ok(InvoiceStatus::Overdue),
            "Cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "unknown invoice status '{other}'"
            ))),
        }
    }
}

/// Status as a pure function of the recomputed balance.
///
/// - nothing left to pay on a non-zero invoice → Paid
/// - `0 < balance < total` → Partially Paid
/// - otherwise → Unpaid
///
/// Anything but Paid becomes Overdue once `due_date` is in the past.
pub fn derive_status(
    total: Money,
    balance: Money,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> InvoiceStatus {
    let status = if !balance.is_positive() && total.is_positive() {
        InvoiceStatus::Paid
    } else if balance.is_positive() && balance < total {
        InvoiceStatus::PartiallyPaid
    } else {
        InvoiceStatus::Unpaid
    };

    if status != InvoiceStatus::Paid && due_date.is_some_and(|d| d < today) {
        InvoiceStatus::Overdue
    } else {
        status
    }
}

/// Status at creation, seeded from an optional immediate payment.
pub fn initial_status(
    total: Money,
    immediate_payment: Money,
    requested: Option<InvoiceStatus>,
) -> InvoiceStatus {
    if immediate_payment.is_positive() && immediate_payment >= total {
        InvoiceStatus::Paid
    } else if immediate_payment.is_positive() {
        InvoiceStatus::PartiallyPaid
    } else {
        match requested {
            Some(s @ (InvoiceStatus::Draft | InvoiceStatus::Cancelled)) => s,
            _ => InvoiceStatus::Unpaid,
        }
    }
}

/// One stored invoice line. `amount = quantity × unit_price`; tax and discount
/// are applied at read time, never baked into the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub warehouse_id: Option<WarehouseId>,
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub amount: Money,
}

/// Caller-supplied line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLineInput {
    pub item_id: ItemId,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    #[serde(default)]
    pub description: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
}

impl InvoiceLineInput {
    pub fn new(item_id: ItemId, quantity: i64, unit_price: Money) -> Self {
        Self {
            item_id,
            warehouse_id: None,
            description: None,
            quantity,
            unit_price,
        }
    }

    pub fn in_warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn to_line(&self, line_no: u32) -> DomainResult<InvoiceLine> {
        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "line {line_no}: quantity must be positive"
            )));
        }
        if self.unit_price.is_negative() {
            return Err(DomainError::validation(format!(
                "line {line_no}: unit price cannot be negative"
            )));
        }
        let amount = self
            .unit_price
            .checked_mul(self.quantity)
            .ok_or_else(|| DomainError::invariant(format!("line {line_no}: amount overflow")))?;

        Ok(InvoiceLine {
            line_no,
            item_id: self.item_id,
            warehouse_id: self.warehouse_id,
            description: self.description.clone(),
            quantity: self.quantity,
            unit_price: self.unit_price,
            amount,
        })
    }
}

/// Build stored lines (numbered from 1) and their total.
pub fn invoice_total(inputs: &[InvoiceLineInput]) -> DomainResult<(Vec<InvoiceLine>, Money)> {
    if inputs.is_empty() {
        return Err(DomainError::validation("invoice requires at least one line"));
    }

    let mut lines = Vec::with_capacity(inputs.len());
    let mut total = Money::ZERO;
    for (idx, input) in inputs.iter().enumerate() {
        let line = input.to_line(idx as u32 + 1)?;
        total = total
            .checked_add(line.amount)
            .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;
        lines.push(line);
    }
    Ok((lines, total))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_no: String,
    pub customer_id: CustomerId,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    /// Fixed from the lines at creation (or full update).
    pub total_amount: Money,
    /// `SUM(payment_allocations.amount)`; cached.
    pub paid_amount: Money,
    /// `total_amount - paid_amount`; cached.
    pub balance_amount: Money,
    pub status: InvoiceStatus,
    /// Basis points, applied by reporting only.
    pub discount_bp: u32,
    pub tax_bp: u32,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Invoice row before insertion (the store assigns the id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub invoice_no: String,
    pub customer_id: CustomerId,
    pub invoice_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub balance_amount: Money,
    pub status: InvoiceStatus,
    pub discount_bp: u32,
    pub tax_bp: u32,
    pub notes: Option<String>,
    pub created_by: Option<UserId>,
}

impl Entity for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> InvoiceId {
        self.id
    }
}

impl Invoice {
    /// Set the cached paid/balance pair from an allocation sum.
    pub fn set_paid(&mut self, paid: Money) {
        self.paid_amount = paid;
        self.balance_amount = self.total_amount - paid;
    }

    /// Amount due after discount and tax (read-time presentation only).
    pub fn net_total(&self) -> Money {
        let discounted = self.total_amount.cents() as i128
            * (10_000 - self.discount_bp.min(10_000) as i128)
            / 10_000;
        let taxed = discounted * (10_000 + self.tax_bp as i128) / 10_000;
        Money::from_cents(taxed as i64)
    }

    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.due_date.is_some_and(|d| d < today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(c: i64) -> Money {
        Money::from_cents(c)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    #[test]
    fn derive_status_follows_the_balance() {
        assert_eq!(derive_status(m(100), m(100), None, today()), InvoiceStatus::Unpaid);
        assert_eq!(derive_status(m(100), m(40), None, today()), InvoiceStatus::PartiallyPaid);
        assert_eq!(derive_status(m(100), m(0), None, today()), InvoiceStatus::Paid);
        assert_eq!(derive_status(m(100), m(-5), None, today()), InvoiceStatus::Paid);
        assert_eq!(derive_status(m(0), m(0), None, today()), InvoiceStatus::Unpaid);
    }

    #[test]
    fn past_due_overrides_everything_but_paid() {
        let yesterday = today().pred_opt();
        assert_eq!(derive_status(m(100), m(100), yesterday, today()), InvoiceStatus::Overdue);
        assert_eq!(derive_status(m(100), m(30), yesterday, today()), InvoiceStatus::Overdue);
        assert_eq!(derive_status(m(100), m(0), yesterday, today()), InvoiceStatus::Paid);
        // Due today is not overdue yet.
        assert_eq!(derive_status(m(100), m(100), Some(today()), today()), InvoiceStatus::Unpaid);
    }

    #[test]
    fn cancelled_and_unpaid_drafts_are_sticky() {
        let s = InvoiceStatus::Cancelled.recompute(m(100), m(100), m(0), None, today());
        assert_eq!(s, InvoiceStatus::Cancelled);
        let s = InvoiceStatus::Draft.recompute(m(100), m(0), m(100), None, today());
        assert_eq!(s, InvoiceStatus::Draft);
        let s = InvoiceStatus::Draft.recompute(m(100), m(60), m(40), None, today());
        assert_eq!(s, InvoiceStatus::PartiallyPaid);
    }

    #[test]
    fn initial_status_uses_immediate_payment_first() {
        assert_eq!(initial_status(m(100), m(100), None), InvoiceStatus::Paid);
        assert_eq!(initial_status(m(100), m(150), None), InvoiceStatus::Paid);
        assert_eq!(initial_status(m(100), m(30), Some(InvoiceStatus::Draft)), InvoiceStatus::PartiallyPaid);
        assert_eq!(initial_status(m(100), m(0), Some(InvoiceStatus::Draft)), InvoiceStatus::Draft);
        assert_eq!(initial_status(m(100), m(0), None), InvoiceStatus::Unpaid);
        assert_eq!(initial_status(m(100), m(0), Some(InvoiceStatus::Paid)), InvoiceStatus::Unpaid);
    }

    #[test]
    fn resolve_honours_draft_only_while_unpaid() {
        let due = today().pred_opt();
        assert_eq!(
            InvoiceStatus::resolve(Some(InvoiceStatus::Draft), m(100), m(0), m(100), due, today()),
            InvoiceStatus::Draft
        );
        assert_eq!(
            InvoiceStatus::resolve(Some(InvoiceStatus::Draft), m(100), m(10), m(90), None, today()),
            InvoiceStatus::PartiallyPaid
        );
        assert_eq!(
            InvoiceStatus::resolve(Some(InvoiceStatus::Paid), m(100), m(0), m(100), due, today()),
            InvoiceStatus::Overdue
        );
    }

    #[test]
    fn invoice_total_numbers_lines_and_sums_amounts() {
        let inputs = vec![
            InvoiceLineInput::new(ItemId::new(1), 2, m(1_500)),
            InvoiceLineInput::new(ItemId::new(2), 1, m(7_000)),
        ];
        let (lines, total) = invoice_total(&inputs).unwrap();
        assert_eq!(total, m(10_000));
        assert_eq!(lines[0].line_no, 1);
        assert_eq!(lines[0].amount, m(3_000));
        assert_eq!(lines[1].line_no, 2);
    }

    #[test]
    fn invalid_lines_are_rejected() {
        assert!(invoice_total(&[]).is_err());
        let bad = vec![InvoiceLineInput::new(ItemId::new(1), 0, m(100))];
        assert!(matches!(invoice_total(&bad), Err(DomainError::Validation(_))));
    }

    #[test]
    fn status_labels_round_trip() {
        for s in [
            InvoiceStatus::Draft,
            InvoiceStatus::Unpaid,
            InvoiceStatus::PartiallyPaid,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<InvoiceStatus>().unwrap(), s);
        }
        assert_eq!(
            serde_json::to_string(&InvoiceStatus::PartiallyPaid).unwrap(),
            "\"Partially Paid\""
        );
    }

    proptest! {
        #[test]
        fn derived_status_satisfies_the_balance_rules(
            total in 1i64..1_000_000,
            paid_fraction in 0u32..=100,
        ) {
            let paid = total * paid_fraction as i64 / 100;
            let balance = total - paid;
            let status = derive_status(m(total), m(balance), None, today());
            if balance == 0 {
                prop_assert_eq!(status, InvoiceStatus::Paid);
            } else if balance < total {
                prop_assert_eq!(status, InvoiceStatus::PartiallyPaid);
            } else {
                prop_assert_eq!(status, InvoiceStatus::Unpaid);
            }
        }
    }
}
