//! Customer receivables ledger.
//!
//! One row per financial event. `balance` is a materialized running total
//! written once at insert time: `previous.balance + debit - credit`. A
//! back-dated entry inserted later does not recompute the rows after it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use bizbooks_core::{CustomerId, DomainError, Entity, LedgerEntryId, Money, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    Invoice,
    Payment,
    OpeningBalance,
}

impl LedgerEntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            LedgerEntryType::Invoice => "INVOICE",
            LedgerEntryType::Payment => "PAYMENT",
            LedgerEntryType::OpeningBalance => "OPENING_BALANCE",
        }
    }
}

impl core::fmt::Display for LedgerEntryType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for LedgerEntryType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INVOICE" => Ok(LedgerEntryType::Invoice),
            "PAYMENT" => Ok(LedgerEntryType::Payment),
            "OPENING_BALANCE" => Ok(LedgerEntryType::OpeningBalance),
            other => Err(DomainError::validation(format!(
                "unknown ledger entry type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerLedgerEntry {
    pub id: LedgerEntryId,
    pub customer_id: CustomerId,
    pub entry_date: NaiveDate,
    pub entry_type: LedgerEntryType,
    /// Invoice or payment number this entry was posted for.
    pub reference_no: String,
    pub description: String,
    pub debit: Money,
    pub credit: Money,
    /// Running balance immediately after this entry.
    pub balance: Money,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Entity for CustomerLedgerEntry {
    type Id = LedgerEntryId;

    fn id(&self) -> LedgerEntryId {
        self.id
    }
}

/// Entry before its running balance is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub customer_id: CustomerId,
    pub entry_date: NaiveDate,
    pub entry_type: LedgerEntryType,
    pub reference_no: String,
    pub description: String,
    pub debit: Money,
    pub credit: Money,
    pub created_by: Option<UserId>,
}

impl NewLedgerEntry {
    /// Debit entry for an issued invoice.
    pub fn invoice(
        customer_id: CustomerId,
        entry_date: NaiveDate,
        invoice_no: impl Into<String>,
        total: Money,
    ) -> Self {
        let invoice_no = invoice_no.into();
        Self {
            customer_id,
            entry_date,
            entry_type: LedgerEntryType::Invoice,
            description: format!("Invoice {invoice_no}"),
            reference_no: invoice_no,
            debit: total,
            credit: Money::ZERO,
            created_by: None,
        }
    }

    /// Credit entry for a received payment; `description` lists the invoices.
    pub fn payment(
        customer_id: CustomerId,
        entry_date: NaiveDate,
        payment_no: impl Into<String>,
        amount: Money,
        description: impl Into<String>,
    ) -> Self {
        Self {
            customer_id,
            entry_date,
            entry_type: LedgerEntryType::Payment,
            reference_no: payment_no.into(),
            description: description.into(),
            debit: Money::ZERO,
            credit: amount,
            created_by: None,
        }
    }

    /// Opening balance: positive amounts are owed by the customer (debit),
    /// negative amounts are a credit held for them.
    pub fn opening_balance(customer_id: CustomerId, entry_date: NaiveDate, amount: Money) -> Self {
        let (debit, credit) = if amount.is_negative() {
            (Money::ZERO, amount.abs())
        } else {
            (amount, Money::ZERO)
        };
        Self {
            customer_id,
            entry_date,
            entry_type: LedgerEntryType::OpeningBalance,
            reference_no: "OPENING".to_string(),
            description: "Opening balance".to_string(),
            debit,
            credit,
            created_by: None,
        }
    }

    pub fn created_by(mut self, actor: Option<UserId>) -> Self {
        self.created_by = actor;
        self
    }

    /// Net effect of this entry on the running balance.
    pub fn net(&self) -> Money {
        self.debit - self.credit
    }
}

/// Running balance after appending an entry to a ledger whose last entry
/// carries `previous` (or nothing, for the first entry).
pub fn running_balance(previous: Option<Money>, debit: Money, credit: Money) -> Money {
    previous.unwrap_or(Money::ZERO) + debit - credit
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[test]
    fn first_entry_starts_from_zero() {
        let b = running_balance(None, Money::from_cents(10_000), Money::ZERO);
        assert_eq!(b, Money::from_cents(10_000));
    }

    #[test]
    fn negative_opening_balance_is_a_credit() {
        let e = NewLedgerEntry::opening_balance(CustomerId::new(1), date(), Money::from_cents(-2_500));
        assert_eq!(e.debit, Money::ZERO);
        assert_eq!(e.credit, Money::from_cents(2_500));
        assert_eq!(e.net(), Money::from_cents(-2_500));
    }

    #[test]
    fn invoice_and_payment_entries_carry_their_reference() {
        let inv = NewLedgerEntry::invoice(CustomerId::new(1), date(), "INV-2026-00001", Money::from_cents(100));
        assert_eq!(inv.entry_type, LedgerEntryType::Invoice);
        assert_eq!(inv.reference_no, "INV-2026-00001");
        assert_eq!(inv.net(), Money::from_cents(100));

        let pay = NewLedgerEntry::payment(
            CustomerId::new(1),
            date(),
            "PAY-2026-00001",
            Money::from_cents(60),
            "Payment for INV-2026-00001",
        );
        assert_eq!(pay.net(), Money::from_cents(-60));
    }

    proptest! {
        /// Folding entries through `running_balance` always ends at the net sum.
        #[test]
        fn running_balance_folds_to_net_sum(
            moves in prop::collection::vec((0i64..100_000, 0i64..100_000), 1..30)
        ) {
            let mut prev: Option<Money> = None;
            let mut net = 0i64;
            for (d, c) in &moves {
                prev = Some(running_balance(prev, Money::from_cents(*d), Money::from_cents(*c)));
                net += d - c;
            }
            prop_assert_eq!(prev.unwrap().cents(), net);
        }
    }
}
