use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use bizbooks_core::{CustomerId, Money, PaymentId, UserId};
use bizbooks_invoicing::{
    AllocationRequest, InvoiceStatus, Payment, PaymentAllocation, validate_allocations,
};

use super::{
    AllocationTarget, PaymentDraft, ReceivablesService, load_customer, load_invoice, load_payment,
    post_payment, refresh_customers, refresh_invoice, remove_payment,
};
use crate::activity_log::ActivityEntry;
use crate::error::{LedgerError, LedgerResult};
use crate::store::{LedgerTx, Store};

fn default_method() -> String {
    "cash".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePayment {
    pub customer_id: CustomerId,
    pub payment_date: NaiveDate,
    pub amount: Money,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub allocations: Vec<AllocationRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub payment: Payment,
    pub allocations: Vec<PaymentAllocation>,
}

impl<S: Store> ReceivablesService<S> {
    /// Record a payment split across one or more of the customer's invoices.
    ///
    /// The allocations must sum to the payment amount (within one cent)
    /// before anything is written.
    #[instrument(
        skip(self, request),
        fields(customer_id = %request.customer_id, amount = %request.amount),
        err
    )]
    pub async fn create_payment(
        &self,
        request: CreatePayment,
        actor: Option<UserId>,
    ) -> LedgerResult<PaymentDetails> {
        validate_allocations(request.amount, &request.allocations)?;
        let today = self.ctx.today();

        let mut tx = self.ctx.begin().await?;
        load_customer(&mut tx, request.customer_id).await?;

        let mut targets = Vec::with_capacity(request.allocations.len());
        for allocation in &request.allocations {
            let invoice = load_invoice(&mut tx, allocation.invoice_id).await?;
            if invoice.customer_id != request.customer_id {
                return Err(LedgerError::validation(format!(
                    "invoice {} belongs to another customer",
                    invoice.invoice_no
                )));
            }
            if invoice.status == InvoiceStatus::Cancelled {
                return Err(LedgerError::validation(format!(
                    "invoice {} is cancelled",
                    invoice.invoice_no
                )));
            }
            targets.push(AllocationTarget {
                invoice_id: invoice.id,
                invoice_no: invoice.invoice_no,
                amount: allocation.amount,
            });
        }

        let draft = PaymentDraft {
            customer_id: request.customer_id,
            payment_date: request.payment_date,
            amount: request.amount,
            method: request.method,
            reference: request.reference,
            notes: request.notes,
            created_by: actor,
        };
        let (payment, allocations) = post_payment(&mut tx, draft, &targets).await?;

        for target in &targets {
            refresh_invoice(&mut tx, target.invoice_id, today).await?;
        }
        refresh_customers(&mut tx, &BTreeSet::from([payment.customer_id])).await?;
        tx.commit().await?;

        info!(
            payment_no = %payment.payment_no,
            amount = %payment.amount,
            invoices = targets.len(),
            "payment recorded"
        );
        self.ctx.activity.record(
            ActivityEntry::new(actor, "payment.created", "payment", payment.payment_no.as_str())
                .with_details(json!({
                    "amount": payment.amount.cents(),
                    "invoices": targets.iter().map(|t| t.invoice_no.as_str()).collect::<Vec<_>>(),
                })),
        );
        Ok(PaymentDetails {
            payment,
            allocations,
        })
    }

    /// Remove a payment with its allocations and ledger entry, then
    /// recompute everything it had paid.
    #[instrument(skip(self), fields(payment_id = %id), err)]
    pub async fn delete_payment(&self, id: PaymentId, actor: Option<UserId>) -> LedgerResult<Payment> {
        let today = self.ctx.today();
        let mut tx = self.ctx.begin().await?;

        let removed = remove_payment(&mut tx, id, today).await?;
        let mut customers = BTreeSet::from([removed.payment.customer_id]);
        for invoice in &removed.invoices {
            customers.insert(load_invoice(&mut tx, *invoice).await?.customer_id);
        }
        refresh_customers(&mut tx, &customers).await?;
        tx.commit().await?;

        let payment = removed.payment;
        info!(
            payment_no = %payment.payment_no,
            invoices = removed.invoices.len(),
            "payment deleted"
        );
        self.ctx.activity.record(
            ActivityEntry::new(actor, "payment.deleted", "payment", payment.payment_no.as_str())
                .with_details(json!({ "amount": payment.amount.cents() })),
        );
        Ok(payment)
    }

    pub async fn payment_details(&self, id: PaymentId) -> LedgerResult<PaymentDetails> {
        let mut tx = self.ctx.begin().await?;
        let payment = load_payment(&mut tx, id).await?;
        let allocations = tx.payment_allocations(id).await?;
        Ok(PaymentDetails {
            payment,
            allocations,
        })
    }
}
