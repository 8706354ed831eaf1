//! Customer receivables ledger writes.

use tracing::debug;

use bizbooks_core::{CustomerId, Money};
use bizbooks_parties::{CustomerLedgerEntry, LedgerEntryType, NewLedgerEntry, running_balance};

use crate::error::LedgerResult;
use crate::store::LedgerTx;

/// Append an entry, carrying the running balance forward from the
/// customer's most recent entry.
pub async fn append_entry<T: LedgerTx>(
    tx: &mut T,
    entry: &NewLedgerEntry,
) -> LedgerResult<CustomerLedgerEntry> {
    let previous = tx
        .last_ledger_entry(entry.customer_id)
        .await?
        .map(|e| e.balance);
    let balance = running_balance(previous, entry.debit, entry.credit);
    let stored = tx.insert_ledger_entry(entry, balance).await?;
    debug!(
        customer_id = %entry.customer_id,
        entry_type = %entry.entry_type,
        reference_no = %entry.reference_no,
        balance = %balance,
        "ledger entry appended"
    );
    Ok(stored)
}

/// Remove every entry of `entry_type` posted under `reference_no`.
///
/// Later entries keep their stored running balances.
pub async fn remove_entries<T: LedgerTx>(
    tx: &mut T,
    customer: CustomerId,
    entry_type: LedgerEntryType,
    reference_no: &str,
) -> LedgerResult<u64> {
    let removed = tx
        .delete_ledger_entries(customer, entry_type, reference_no)
        .await?;
    debug!(customer_id = %customer, %entry_type, reference_no, removed, "ledger entries removed");
    Ok(removed)
}

/// Running balance after the customer's most recent entry.
pub async fn ledger_balance<T: LedgerTx>(tx: &mut T, customer: CustomerId) -> LedgerResult<Money> {
    Ok(tx
        .last_ledger_entry(customer)
        .await?
        .map(|e| e.balance)
        .unwrap_or(Money::ZERO))
}
