use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use bizbooks_core::{CustomerId, InvoiceId, Money, PaymentId, UserId, WarehouseId};
use bizbooks_inventory::{MovementType, NewStockMovement};
use bizbooks_invoicing::{
    ImmediatePayment, Invoice, InvoiceLine, InvoiceLineInput, InvoiceStatus, NewInvoice, Payment,
    PaymentAllocation, initial_status, invoice_total,
};
use bizbooks_parties::{CustomerLedgerEntry, LedgerEntryType, NewLedgerEntry};

use super::{
    AllocationTarget, PaymentDraft, ReceivablesService, calculate_invoice_balance, load_customer,
    load_invoice, load_payment, post_payment, refresh_customers, remove_payment, update_customer_balance,
};
use crate::activity_log::ActivityEntry;
use crate::config::LedgerConfig;
use crate::customer_ledger::{append_entry, remove_entries};
use crate::error::{LedgerError, LedgerResult};
use crate::numbering::{DocumentType, next_document_number};
use crate::stock_ledger::{RecordedMovement, record_movement, resolve_sale_warehouse};
use crate::store::{LedgerTx, Store};

const SALE_DOCTYPE: &str = "INVOICE";
const REVERSAL_DOCTYPE: &str = "INVOICE_DELETE";
const MAX_BASIS_POINTS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub customer_id: CustomerId,
    pub invoice_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub lines: Vec<InvoiceLineInput>,
    #[serde(default)]
    pub discount_bp: u32,
    #[serde(default)]
    pub tax_bp: u32,
    #[serde(default)]
    pub notes: Option<String>,
    /// Only Draft and Cancelled are honoured, and only with no payment.
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    #[serde(default)]
    pub payment: Option<ImmediatePayment>,
}

/// Full replacement of an invoice's header and lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInvoice {
    pub customer_id: CustomerId,
    pub invoice_date: NaiveDate,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub lines: Vec<InvoiceLineInput>,
    #[serde(default)]
    pub discount_bp: u32,
    #[serde(default)]
    pub tax_bp: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: Option<InvoiceStatus>,
    /// Payments to remove entirely before the update is applied.
    #[serde(default)]
    pub deleted_payments: Vec<PaymentId>,
    #[serde(default)]
    pub payment: Option<ImmediatePayment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub lines: Vec<InvoiceLine>,
    pub allocations: Vec<PaymentAllocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDeletion {
    pub invoice_no: String,
    /// Stock movements that put the sold quantities back.
    pub reversed_movements: Vec<String>,
    /// Payments deleted because this invoice was their only allocation.
    pub removed_payments: Vec<String>,
    /// Payments shared with other invoices, reduced by the removed allocation.
    pub reduced_payments: Vec<String>,
}

fn validate_basis_points(discount_bp: u32, tax_bp: u32) -> LedgerResult<()> {
    if discount_bp > MAX_BASIS_POINTS {
        return Err(LedgerError::validation("discount cannot exceed 100%"));
    }
    if tax_bp > MAX_BASIS_POINTS {
        return Err(LedgerError::validation("tax cannot exceed 100%"));
    }
    Ok(())
}

/// Items and explicit warehouses named on the lines must exist.
async fn ensure_line_references<T: LedgerTx>(tx: &mut T, lines: &[InvoiceLine]) -> LedgerResult<()> {
    for line in lines {
        if tx.item(line.item_id).await?.is_none() {
            return Err(LedgerError::not_found(format!("item {}", line.item_id)));
        }
        if let Some(warehouse) = line.warehouse_id {
            if tx.warehouse(warehouse).await?.is_none() {
                return Err(LedgerError::not_found(format!("warehouse {warehouse}")));
            }
        }
    }
    Ok(())
}

/// One negative SALE movement per line, in a warehouse chosen by the
/// resolution policy.
async fn post_sale_movements<T: LedgerTx>(
    tx: &mut T,
    config: &LedgerConfig,
    invoice: &Invoice,
    lines: &[InvoiceLine],
    actor: Option<UserId>,
) -> LedgerResult<Vec<RecordedMovement>> {
    let mut posted = Vec::with_capacity(lines.len());
    for line in lines {
        let resolution =
            resolve_sale_warehouse(tx, config, line.item_id, line.warehouse_id, line.quantity)
                .await?;
        let movement = NewStockMovement::new(
            line.item_id,
            resolution.warehouse_id,
            MovementType::Sale,
            -line.quantity,
            invoice.invoice_date,
        )
        .with_reference(SALE_DOCTYPE, invoice.invoice_no.as_str())
        .created_by(actor);
        posted.push(record_movement(tx, &movement).await?);
    }
    Ok(posted)
}

/// Put sold quantities back, into the warehouse each line was sold from
/// when that can still be found.
async fn reverse_sale_movements<T: LedgerTx>(
    tx: &mut T,
    config: &LedgerConfig,
    invoice: &Invoice,
    lines: &[InvoiceLine],
    actor: Option<UserId>,
) -> LedgerResult<Vec<RecordedMovement>> {
    let default_warehouse = tx
        .warehouse_by_code(&config.default_warehouse_code)
        .await?
        .map(|w| w.id);

    let mut posted = Vec::with_capacity(lines.len());
    for line in lines {
        let sold_from: Option<WarehouseId> = tx
            .find_movement(
                line.item_id,
                MovementType::Sale,
                SALE_DOCTYPE,
                &invoice.invoice_no,
            )
            .await?
            .map(|m| m.warehouse_id);
        let warehouse = sold_from
            .or(default_warehouse)
            .unwrap_or(config.fallback_warehouse_id);

        let movement = NewStockMovement::new(
            line.item_id,
            warehouse,
            MovementType::Adjustment,
            line.quantity,
            invoice.invoice_date,
        )
        .with_reference(REVERSAL_DOCTYPE, invoice.invoice_no.as_str())
        .created_by(actor);
        posted.push(record_movement(tx, &movement).await?);
    }
    Ok(posted)
}

/// Replace a payment's ledger credit with one for `amount`, described by
/// the invoices it still settles.
async fn repost_payment_entry<T: LedgerTx>(
    tx: &mut T,
    payment: &Payment,
    amount: Money,
    actor: Option<UserId>,
) -> LedgerResult<CustomerLedgerEntry> {
    remove_entries(
        tx,
        payment.customer_id,
        LedgerEntryType::Payment,
        &payment.payment_no,
    )
    .await?;

    let mut invoice_nos = Vec::new();
    for allocation in tx.payment_allocations(payment.id).await? {
        invoice_nos.push(load_invoice(tx, allocation.invoice_id).await?.invoice_no);
    }
    let entry = NewLedgerEntry::payment(
        payment.customer_id,
        payment.payment_date,
        payment.payment_no.as_str(),
        amount,
        format!("Payment for {}", invoice_nos.join(", ")),
    )
    .created_by(actor);
    append_entry(tx, &entry).await
}

async fn load_details<T: LedgerTx>(tx: &mut T, id: InvoiceId) -> LedgerResult<InvoiceDetails> {
    let invoice = load_invoice(tx, id).await?;
    let lines = tx.invoice_lines(id).await?;
    let allocations = tx.invoice_allocations(id).await?;
    Ok(InvoiceDetails {
        invoice,
        lines,
        allocations,
    })
}

fn immediate_draft(
    payment: &ImmediatePayment,
    customer_id: CustomerId,
    fallback_date: NaiveDate,
    actor: Option<UserId>,
) -> PaymentDraft {
    PaymentDraft {
        customer_id,
        payment_date: payment.payment_date.unwrap_or(fallback_date),
        amount: payment.amount,
        method: payment.method.clone(),
        reference: payment.reference.clone(),
        notes: None,
        created_by: actor,
    }
}

impl<S: Store> ReceivablesService<S> {
    /// Create an invoice with its stock movements, INVOICE ledger entry and
    /// optional immediate payment, in one transaction.
    #[instrument(skip(self, request), fields(customer_id = %request.customer_id), err)]
    pub async fn create_invoice(
        &self,
        request: CreateInvoice,
        actor: Option<UserId>,
    ) -> LedgerResult<InvoiceDetails> {
        let (lines, total) = invoice_total(&request.lines)?;
        if let Some(payment) = &request.payment {
            payment.validate()?;
        }
        validate_basis_points(request.discount_bp, request.tax_bp)?;
        let today = self.ctx.today();

        let mut tx = self.ctx.begin().await?;
        load_customer(&mut tx, request.customer_id).await?;
        ensure_line_references(&mut tx, &lines).await?;

        let invoice_no =
            next_document_number(&mut tx, DocumentType::Invoice, request.invoice_date.year())
                .await?;
        let paid = request
            .payment
            .as_ref()
            .map(|p| p.amount)
            .unwrap_or(Money::ZERO);
        let mut status = initial_status(total, paid, request.status);
        if status.is_open() && request.due_date.is_some_and(|d| d < today) {
            status = InvoiceStatus::Overdue;
        }

        let invoice = tx
            .insert_invoice(&NewInvoice {
                invoice_no: invoice_no.clone(),
                customer_id: request.customer_id,
                invoice_date: request.invoice_date,
                due_date: request.due_date,
                total_amount: total,
                paid_amount: paid,
                balance_amount: total - paid,
                status,
                discount_bp: request.discount_bp,
                tax_bp: request.tax_bp,
                notes: request.notes.clone(),
                created_by: actor,
            })
            .await?;
        tx.insert_invoice_lines(invoice.id, &lines).await?;

        let movements =
            post_sale_movements(&mut tx, &self.ctx.config, &invoice, &lines, actor).await?;

        let entry = NewLedgerEntry::invoice(
            invoice.customer_id,
            invoice.invoice_date,
            invoice_no.as_str(),
            total,
        )
        .created_by(actor);
        append_entry(&mut tx, &entry).await?;

        if let Some(payment) = &request.payment {
            let draft = immediate_draft(payment, invoice.customer_id, invoice.invoice_date, actor);
            let target = AllocationTarget {
                invoice_id: invoice.id,
                invoice_no: invoice_no.clone(),
                amount: payment.amount,
            };
            post_payment(&mut tx, draft, &[target]).await?;
        }

        update_customer_balance(&mut tx, invoice.customer_id).await?;
        let details = load_details(&mut tx, invoice.id).await?;
        tx.commit().await?;

        info!(
            invoice_no = %invoice_no,
            total = %total,
            status = %details.invoice.status,
            movements = movements.len(),
            "invoice created"
        );
        self.ctx.activity.record(
            ActivityEntry::new(actor, "invoice.created", "invoice", invoice_no).with_details(
                json!({
                    "customer_id": details.invoice.customer_id,
                    "total": total.cents(),
                    "status": details.invoice.status,
                }),
            ),
        );
        Ok(details)
    }

    /// Replace an invoice's header and lines.
    ///
    /// Listed payments are removed first. The INVOICE ledger entry is
    /// re-posted when the total or the customer changes. Stock already
    /// deducted for the previous lines is left as it is.
    #[instrument(skip(self, request), fields(invoice_id = %id), err)]
    pub async fn update_invoice(
        &self,
        id: InvoiceId,
        request: UpdateInvoice,
        actor: Option<UserId>,
    ) -> LedgerResult<InvoiceDetails> {
        let (lines, total) = invoice_total(&request.lines)?;
        if let Some(payment) = &request.payment {
            payment.validate()?;
        }
        validate_basis_points(request.discount_bp, request.tax_bp)?;
        let today = self.ctx.today();

        let mut tx = self.ctx.begin().await?;
        let before = load_invoice(&mut tx, id).await?;
        load_customer(&mut tx, request.customer_id).await?;
        ensure_line_references(&mut tx, &lines).await?;

        let mut customers = BTreeSet::from([before.customer_id, request.customer_id]);
        for payment in &request.deleted_payments {
            let removed = remove_payment(&mut tx, *payment, today).await?;
            customers.insert(removed.payment.customer_id);
        }
        if before.customer_id != request.customer_id
            && !tx.invoice_allocations(id).await?.is_empty()
        {
            return Err(LedgerError::validation(
                "remove the invoice's payments before moving it to another customer",
            ));
        }

        tx.delete_invoice_lines(id).await?;
        tx.insert_invoice_lines(id, &lines).await?;

        // Reload: removing payments may have refreshed the cached amounts.
        let mut invoice = load_invoice(&mut tx, id).await?;
        invoice.customer_id = request.customer_id;
        invoice.invoice_date = request.invoice_date;
        invoice.due_date = request.due_date;
        invoice.total_amount = total;
        invoice.discount_bp = request.discount_bp;
        invoice.tax_bp = request.tax_bp;
        invoice.notes = request.notes.clone();
        invoice.set_paid(invoice.paid_amount);
        tx.update_invoice(&invoice).await?;

        if before.customer_id != invoice.customer_id || before.total_amount != total {
            remove_entries(
                &mut tx,
                before.customer_id,
                LedgerEntryType::Invoice,
                &invoice.invoice_no,
            )
            .await?;
            let entry = NewLedgerEntry::invoice(
                invoice.customer_id,
                invoice.invoice_date,
                invoice.invoice_no.as_str(),
                total,
            )
            .created_by(actor);
            append_entry(&mut tx, &entry).await?;
        }

        if let Some(payment) = &request.payment {
            let draft = immediate_draft(payment, invoice.customer_id, today, actor);
            let target = AllocationTarget {
                invoice_id: id,
                invoice_no: invoice.invoice_no.clone(),
                amount: payment.amount,
            };
            post_payment(&mut tx, draft, &[target]).await?;
        }

        let mut invoice = calculate_invoice_balance(&mut tx, id).await?.value;
        let status = match request.status {
            Some(requested) => InvoiceStatus::resolve(
                Some(requested),
                invoice.total_amount,
                invoice.paid_amount,
                invoice.balance_amount,
                invoice.due_date,
                today,
            ),
            None => invoice.status.recompute(
                invoice.total_amount,
                invoice.paid_amount,
                invoice.balance_amount,
                invoice.due_date,
                today,
            ),
        };
        if status != invoice.status {
            invoice.status = status;
            tx.update_invoice(&invoice).await?;
        }

        refresh_customers(&mut tx, &customers).await?;
        let details = load_details(&mut tx, id).await?;
        tx.commit().await?;

        info!(
            invoice_no = %details.invoice.invoice_no,
            total = %total,
            status = %details.invoice.status,
            removed_payments = request.deleted_payments.len(),
            "invoice updated"
        );
        self.ctx.activity.record(
            ActivityEntry::new(
                actor,
                "invoice.updated",
                "invoice",
                details.invoice.invoice_no.as_str(),
            )
            .with_details(json!({
                "total_before": before.total_amount.cents(),
                "total_after": total.cents(),
                "status": details.invoice.status,
            })),
        );
        Ok(details)
    }

    /// Delete an invoice: allocations, then stock reversal, lines, INVOICE
    /// ledger entries and the row itself.
    ///
    /// A payment left without allocations is deleted with its ledger entry;
    /// a payment still allocated elsewhere is reduced by the removed amount.
    #[instrument(skip(self), fields(invoice_id = %id), err)]
    pub async fn delete_invoice(
        &self,
        id: InvoiceId,
        actor: Option<UserId>,
    ) -> LedgerResult<InvoiceDeletion> {
        let mut tx = self.ctx.begin().await?;
        let invoice = load_invoice(&mut tx, id).await?;
        let lines = tx.invoice_lines(id).await?;

        let mut customers = BTreeSet::from([invoice.customer_id]);
        let mut removed_payments = Vec::new();
        let mut reduced_payments = Vec::new();
        for allocation in tx.invoice_allocations(id).await? {
            tx.delete_allocation(allocation.id).await?;
            let payment = load_payment(&mut tx, allocation.payment_id).await?;
            customers.insert(payment.customer_id);

            if tx.payment_allocations(payment.id).await?.is_empty() {
                remove_entries(
                    &mut tx,
                    payment.customer_id,
                    LedgerEntryType::Payment,
                    &payment.payment_no,
                )
                .await?;
                tx.delete_payment(payment.id).await?;
                removed_payments.push(payment.payment_no);
            } else {
                let remaining = payment.amount - allocation.amount;
                tx.set_payment_amount(payment.id, remaining).await?;
                repost_payment_entry(&mut tx, &payment, remaining, actor).await?;
                reduced_payments.push(payment.payment_no);
            }
        }

        let reversed =
            reverse_sale_movements(&mut tx, &self.ctx.config, &invoice, &lines, actor).await?;

        tx.delete_invoice_lines(id).await?;
        remove_entries(
            &mut tx,
            invoice.customer_id,
            LedgerEntryType::Invoice,
            &invoice.invoice_no,
        )
        .await?;
        tx.delete_invoice(id).await?;

        refresh_customers(&mut tx, &customers).await?;
        tx.commit().await?;

        let deletion = InvoiceDeletion {
            invoice_no: invoice.invoice_no,
            reversed_movements: reversed.into_iter().map(|m| m.movement_no).collect(),
            removed_payments,
            reduced_payments,
        };
        info!(
            invoice_no = %deletion.invoice_no,
            reversed = deletion.reversed_movements.len(),
            removed_payments = deletion.removed_payments.len(),
            "invoice deleted"
        );
        self.ctx.activity.record(
            ActivityEntry::new(
                actor,
                "invoice.deleted",
                "invoice",
                deletion.invoice_no.as_str(),
            )
            .with_details(json!({
                "removed_payments": deletion.removed_payments,
                "reduced_payments": deletion.reduced_payments,
            })),
        );
        Ok(deletion)
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> LedgerResult<InvoiceDetails> {
        let mut tx = self.ctx.begin().await?;
        load_details(&mut tx, id).await
    }

    /// All invoices, or one customer's.
    pub async fn list_invoices(&self, customer: Option<CustomerId>) -> LedgerResult<Vec<Invoice>> {
        let mut tx = self.ctx.begin().await?;
        let invoices = match customer {
            Some(c) => {
                load_customer(&mut tx, c).await?;
                tx.customer_invoices(c).await?
            }
            None => tx.invoices().await?,
        };
        Ok(invoices)
    }

    pub async fn customer_ledger(
        &self,
        customer: CustomerId,
    ) -> LedgerResult<Vec<CustomerLedgerEntry>> {
        let mut tx = self.ctx.begin().await?;
        load_customer(&mut tx, customer).await?;
        Ok(tx.ledger_entries(customer).await?)
    }

    /// Post a customer's opening balance. Allowed once per customer.
    #[instrument(skip(self), fields(customer_id = %customer), err)]
    pub async fn record_opening_balance(
        &self,
        customer: CustomerId,
        amount: Money,
        entry_date: NaiveDate,
        actor: Option<UserId>,
    ) -> LedgerResult<CustomerLedgerEntry> {
        if amount.is_zero() {
            return Err(LedgerError::validation("opening balance cannot be zero"));
        }

        let mut tx = self.ctx.begin().await?;
        load_customer(&mut tx, customer).await?;
        let exists = tx
            .ledger_entries(customer)
            .await?
            .iter()
            .any(|e| e.entry_type == LedgerEntryType::OpeningBalance);
        if exists {
            return Err(LedgerError::conflict(format!(
                "customer {customer} already has an opening balance"
            )));
        }

        let entry = NewLedgerEntry::opening_balance(customer, entry_date, amount).created_by(actor);
        let stored = append_entry(&mut tx, &entry).await?;
        tx.set_customer_opening_balance(customer, amount).await?;
        tx.commit().await?;

        info!(customer_id = %customer, amount = %amount, "opening balance recorded");
        self.ctx.activity.record(
            ActivityEntry::new(
                actor,
                "customer.opening_balance",
                "customer",
                customer.to_string(),
            )
            .with_details(json!({ "amount": amount.cents() })),
        );
        Ok(stored)
    }
}
