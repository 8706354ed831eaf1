//! Recompute primitives. Each one derives a cached value from its source
//! rows and writes it only when it differs.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use bizbooks_core::{CustomerId, InvoiceId, Money, PaymentId};
use bizbooks_invoicing::{Invoice, Payment};
use bizbooks_parties::Customer;

use crate::error::{LedgerError, LedgerResult};
use crate::store::LedgerTx;

/// A recomputed value and whether storing it changed anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recomputed<T> {
    pub value: T,
    pub changed: bool,
}

pub(crate) async fn load_invoice<T: LedgerTx>(tx: &mut T, id: InvoiceId) -> LedgerResult<Invoice> {
    tx.invoice(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("invoice {id}")))
}

pub(crate) async fn load_customer<T: LedgerTx>(
    tx: &mut T,
    id: CustomerId,
) -> LedgerResult<Customer> {
    tx.customer(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("customer {id}")))
}

pub(crate) async fn load_payment<T: LedgerTx>(tx: &mut T, id: PaymentId) -> LedgerResult<Payment> {
    tx.payment(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("payment {id}")))
}

/// `paid_amount = SUM(allocations)`, `balance_amount = total - paid`.
pub async fn calculate_invoice_balance<T: LedgerTx>(
    tx: &mut T,
    id: InvoiceId,
) -> LedgerResult<Recomputed<Invoice>> {
    let mut invoice = load_invoice(tx, id).await?;
    let paid: Money = tx
        .invoice_allocations(id)
        .await?
        .iter()
        .map(|a| a.amount)
        .sum();

    let changed =
        invoice.paid_amount != paid || invoice.balance_amount != invoice.total_amount - paid;
    if changed {
        debug!(
            invoice_no = %invoice.invoice_no,
            paid_before = %invoice.paid_amount,
            paid_after = %paid,
            "invoice balance recomputed"
        );
        invoice.set_paid(paid);
        tx.update_invoice(&invoice).await?;
    }
    Ok(Recomputed {
        value: invoice,
        changed,
    })
}

/// Re-derive the status from the cached balance and due date.
pub async fn update_invoice_status<T: LedgerTx>(
    tx: &mut T,
    id: InvoiceId,
    today: NaiveDate,
) -> LedgerResult<Recomputed<Invoice>> {
    let mut invoice = load_invoice(tx, id).await?;
    let next = invoice.status.recompute(
        invoice.total_amount,
        invoice.paid_amount,
        invoice.balance_amount,
        invoice.due_date,
        today,
    );

    let changed = next != invoice.status;
    if changed {
        debug!(
            invoice_no = %invoice.invoice_no,
            from = %invoice.status,
            to = %next,
            "invoice status changed"
        );
        invoice.status = next;
        tx.update_invoice(&invoice).await?;
    }
    Ok(Recomputed {
        value: invoice,
        changed,
    })
}

/// Balance then status, in that order.
pub async fn refresh_invoice<T: LedgerTx>(
    tx: &mut T,
    id: InvoiceId,
    today: NaiveDate,
) -> LedgerResult<Recomputed<Invoice>> {
    let balance = calculate_invoice_balance(tx, id).await?;
    let status = update_invoice_status(tx, id, today).await?;
    Ok(Recomputed {
        value: status.value,
        changed: balance.changed || status.changed,
    })
}

/// `current_balance = SUM(balance_amount)` over the customer's open invoices.
pub async fn update_customer_balance<T: LedgerTx>(
    tx: &mut T,
    id: CustomerId,
) -> LedgerResult<Recomputed<Money>> {
    let customer = load_customer(tx, id).await?;
    let open: Money = tx
        .customer_invoices(id)
        .await?
        .iter()
        .filter(|i| i.status.is_open())
        .map(|i| i.balance_amount)
        .sum();

    let changed = open != customer.current_balance;
    if changed {
        debug!(
            customer_id = %id,
            before = %customer.current_balance,
            after = %open,
            "customer balance recomputed"
        );
        tx.set_customer_balance(id, open).await?;
    }
    Ok(Recomputed {
        value: open,
        changed,
    })
}
