//! Consistency repair pass.
//!
//! Rebuilds every cached figure from its source rows in one transaction:
//! stock balances from movements, item stock from balances, invoice
//! paid/balance/status from allocations, customer balances from invoices.
//! Values already correct are not written, so a second run on a consistent
//! database writes nothing.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use bizbooks_core::{ItemId, WarehouseId};

use crate::context::LedgerContext;
use crate::error::LedgerResult;
use crate::reconciliation::{refresh_invoice, update_customer_balance};
use crate::store::{LedgerTx, Store};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    pub stock_balances_corrected: u64,
    pub stock_balances_created: u64,
    pub orphan_balances_removed: u64,
    pub items_resynced: u64,
    pub invoices_corrected: u64,
    pub customers_corrected: u64,
}

impl RepairReport {
    /// True when the pass wrote nothing.
    pub fn is_clean(&self) -> bool {
        *self == RepairReport::default()
    }

    pub fn total_writes(&self) -> u64 {
        self.stock_balances_corrected
            + self.stock_balances_created
            + self.orphan_balances_removed
            + self.items_resynced
            + self.invoices_corrected
            + self.customers_corrected
    }
}

/// Run the repair pass in its own transaction.
#[instrument(skip(ctx), err)]
pub async fn repair<S: Store>(ctx: &LedgerContext<S>) -> LedgerResult<RepairReport> {
    let today = ctx.today();
    let mut tx = ctx.begin().await?;
    let report = repair_in(&mut tx, today).await?;
    tx.commit().await?;

    if report.is_clean() {
        info!("repair pass found nothing to fix");
    } else {
        info!(?report, writes = report.total_writes(), "repair pass corrected drift");
    }
    Ok(report)
}

/// Repair inside a caller-owned transaction.
pub async fn repair_in<T: LedgerTx>(tx: &mut T, today: NaiveDate) -> LedgerResult<RepairReport> {
    let mut report = RepairReport::default();
    repair_stock_balances(tx, &mut report).await?;
    resync_items(tx, &mut report).await?;
    repair_invoices(tx, today, &mut report).await?;
    repair_customers(tx, &mut report).await?;
    Ok(report)
}

async fn repair_stock_balances<T: LedgerTx>(
    tx: &mut T,
    report: &mut RepairReport,
) -> LedgerResult<()> {
    let totals: BTreeMap<(ItemId, WarehouseId), i64> = tx
        .movement_totals()
        .await?
        .into_iter()
        .map(|t| ((t.item_id, t.warehouse_id), t.quantity))
        .collect();
    let stored: BTreeMap<(ItemId, WarehouseId), i64> = tx
        .stock_balances()
        .await?
        .into_iter()
        .map(|b| ((b.item_id, b.warehouse_id), b.quantity))
        .collect();

    for (&(item, warehouse), &expected) in &totals {
        match stored.get(&(item, warehouse)) {
            Some(&actual) if actual == expected => {}
            Some(&actual) => {
                warn!(
                    item_id = %item,
                    warehouse_id = %warehouse,
                    before = actual,
                    after = expected,
                    "stock balance drift corrected"
                );
                tx.set_stock_balance(item, warehouse, expected).await?;
                report.stock_balances_corrected += 1;
            }
            None => {
                warn!(
                    item_id = %item,
                    warehouse_id = %warehouse,
                    after = expected,
                    "missing stock balance created"
                );
                tx.insert_stock_balance(item, warehouse, expected).await?;
                report.stock_balances_created += 1;
            }
        }
    }

    for (&(item, warehouse), &actual) in &stored {
        if !totals.contains_key(&(item, warehouse)) {
            warn!(
                item_id = %item,
                warehouse_id = %warehouse,
                before = actual,
                "stock balance without movements removed"
            );
            tx.delete_stock_balance(item, warehouse).await?;
            report.orphan_balances_removed += 1;
        }
    }
    Ok(())
}

async fn resync_items<T: LedgerTx>(tx: &mut T, report: &mut RepairReport) -> LedgerResult<()> {
    let mut per_item: BTreeMap<ItemId, i64> = BTreeMap::new();
    for balance in tx.stock_balances().await? {
        *per_item.entry(balance.item_id).or_default() += balance.quantity;
    }

    for item in tx.items().await? {
        let expected = per_item.get(&item.id).copied().unwrap_or(0);
        if item.current_stock != expected {
            warn!(
                item_id = %item.id,
                code = %item.code,
                before = item.current_stock,
                after = expected,
                "item stock resynced"
            );
            tx.set_item_current_stock(item.id, expected).await?;
            report.items_resynced += 1;
        }
    }
    Ok(())
}

async fn repair_invoices<T: LedgerTx>(
    tx: &mut T,
    today: NaiveDate,
    report: &mut RepairReport,
) -> LedgerResult<()> {
    for before in tx.invoices().await? {
        let refreshed = refresh_invoice(tx, before.id, today).await?;
        if refreshed.changed {
            let after = refreshed.value;
            warn!(
                invoice_no = %before.invoice_no,
                paid_before = %before.paid_amount,
                paid_after = %after.paid_amount,
                balance_before = %before.balance_amount,
                balance_after = %after.balance_amount,
                status_before = %before.status,
                status_after = %after.status,
                "invoice drift corrected"
            );
            report.invoices_corrected += 1;
        }
    }
    Ok(())
}

async fn repair_customers<T: LedgerTx>(tx: &mut T, report: &mut RepairReport) -> LedgerResult<()> {
    for before in tx.customers().await? {
        let recomputed = update_customer_balance(tx, before.id).await?;
        if recomputed.changed {
            warn!(
                customer_id = %before.id,
                code = %before.code,
                before = %before.current_balance,
                after = %recomputed.value,
                "customer balance corrected"
            );
            report.customers_corrected += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_report_is_clean() {
        let report = RepairReport::default();
        assert!(report.is_clean());
        assert_eq!(report.total_writes(), 0);

        let dirty = RepairReport {
            items_resynced: 2,
            customers_corrected: 1,
            ..RepairReport::default()
        };
        assert!(!dirty.is_clean());
        assert_eq!(dirty.total_writes(), 3);
    }
}
