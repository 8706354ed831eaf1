//! Receivables reconciliation: invoices, payments and the cached amounts
//! derived from them.
//!
//! Source of truth is the allocation table. Every write path finishes by
//! recomputing, in order, each touched invoice's balance, its status, and
//! each touched customer's balance, all inside the operation's transaction.

mod balances;
mod invoices;
mod payments;

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use bizbooks_core::{CustomerId, InvoiceId, Money, PaymentId, UserId};
use bizbooks_invoicing::{NewPayment, Payment, PaymentAllocation};
use bizbooks_parties::{LedgerEntryType, NewLedgerEntry};

use crate::context::LedgerContext;
use crate::customer_ledger::{append_entry, remove_entries};
use crate::error::LedgerResult;
use crate::numbering::{DocumentType, next_document_number};
use crate::store::{LedgerTx, Store};

pub use balances::{
    Recomputed, calculate_invoice_balance, refresh_invoice, update_customer_balance,
    update_invoice_status,
};
pub use invoices::{CreateInvoice, InvoiceDeletion, InvoiceDetails, UpdateInvoice};
pub use payments::{CreatePayment, PaymentDetails};

pub(crate) use balances::{load_customer, load_invoice, load_payment};

/// Invoice, payment and customer-ledger operations.
pub struct ReceivablesService<S: Store> {
    ctx: LedgerContext<S>,
}

impl<S: Store> Clone for ReceivablesService<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<S: Store> ReceivablesService<S> {
    pub fn new(ctx: LedgerContext<S>) -> Self {
        Self { ctx }
    }
}

/// Payment header fields, before a number is assigned.
struct PaymentDraft {
    customer_id: CustomerId,
    payment_date: NaiveDate,
    amount: Money,
    method: String,
    reference: Option<String>,
    notes: Option<String>,
    created_by: Option<UserId>,
}

/// Allocation target resolved by the caller.
struct AllocationTarget {
    invoice_id: InvoiceId,
    invoice_no: String,
    amount: Money,
}

/// Insert the payment, its allocations and its PAYMENT ledger entry.
///
/// Does not recompute anything; the caller refreshes the invoices.
async fn post_payment<T: LedgerTx>(
    tx: &mut T,
    draft: PaymentDraft,
    targets: &[AllocationTarget],
) -> LedgerResult<(Payment, Vec<PaymentAllocation>)> {
    let payment_no =
        next_document_number(tx, DocumentType::Payment, draft.payment_date.year()).await?;
    let payment = tx
        .insert_payment(&NewPayment {
            payment_no,
            customer_id: draft.customer_id,
            payment_date: draft.payment_date,
            amount: draft.amount,
            method: draft.method,
            reference: draft.reference,
            notes: draft.notes,
            created_by: draft.created_by,
        })
        .await?;

    let mut allocations = Vec::with_capacity(targets.len());
    for target in targets {
        allocations.push(
            tx.insert_allocation(payment.id, target.invoice_id, target.amount)
                .await?,
        );
    }

    let invoice_nos: Vec<&str> = targets.iter().map(|t| t.invoice_no.as_str()).collect();
    let entry = NewLedgerEntry::payment(
        payment.customer_id,
        payment.payment_date,
        payment.payment_no.as_str(),
        payment.amount,
        format!("Payment for {}", invoice_nos.join(", ")),
    )
    .created_by(draft.created_by);
    append_entry(tx, &entry).await?;

    debug!(
        payment_no = %payment.payment_no,
        amount = %payment.amount,
        allocations = allocations.len(),
        "payment posted"
    );
    Ok((payment, allocations))
}

/// What removing a payment touched.
struct RemovedPayment {
    payment: Payment,
    invoices: BTreeSet<InvoiceId>,
}

/// Delete a payment's ledger entry, allocations and row, then refresh every
/// invoice it was allocated to. Customer balances are left to the caller.
async fn remove_payment<T: LedgerTx>(
    tx: &mut T,
    id: PaymentId,
    today: NaiveDate,
) -> LedgerResult<RemovedPayment> {
    let payment = load_payment(tx, id).await?;

    remove_entries(
        tx,
        payment.customer_id,
        LedgerEntryType::Payment,
        &payment.payment_no,
    )
    .await?;

    let allocations = tx.payment_allocations(id).await?;
    for allocation in &allocations {
        tx.delete_allocation(allocation.id).await?;
    }
    tx.delete_payment(id).await?;

    let invoices: BTreeSet<InvoiceId> = allocations.iter().map(|a| a.invoice_id).collect();
    for invoice in &invoices {
        refresh_invoice(tx, *invoice, today).await?;
    }

    debug!(payment_no = %payment.payment_no, invoices = invoices.len(), "payment removed");
    Ok(RemovedPayment { payment, invoices })
}

async fn refresh_customers<T: LedgerTx>(
    tx: &mut T,
    customers: &BTreeSet<CustomerId>,
) -> LedgerResult<()> {
    for customer in customers {
        update_customer_balance(tx, *customer).await?;
    }
    Ok(())
}
