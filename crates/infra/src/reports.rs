//! Read-only reports over the cached balances.
//!
//! Nothing here writes. Reports trust `balance_amount`, `current_stock` and
//! `current_balance` as stored; fixing them is the repair pass's job.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use bizbooks_core::{CustomerId, ItemId, Money};
use bizbooks_inventory::{Item, MovementType};
use bizbooks_invoicing::InvoiceStatus;

use crate::context::LedgerContext;
use crate::error::{LedgerError, LedgerResult};
use crate::store::{LedgerTx, Store};

/// Days-past-due bucket of an open invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    Current,
    Days1To30,
    Days31To60,
    Days61To90,
    Over90,
}

impl AgingBucket {
    pub fn for_days_past_due(days: i64) -> Self {
        match days {
            i64::MIN..=0 => AgingBucket::Current,
            1..=30 => AgingBucket::Days1To30,
            31..=60 => AgingBucket::Days31To60,
            61..=90 => AgingBucket::Days61To90,
            _ => AgingBucket::Over90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAging {
    pub customer_id: CustomerId,
    pub customer_code: String,
    pub customer_name: String,
    pub current: Money,
    pub days_1_30: Money,
    pub days_31_60: Money,
    pub days_61_90: Money,
    pub over_90: Money,
    pub total: Money,
}

impl CustomerAging {
    fn new(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            customer_code: String::new(),
            customer_name: String::new(),
            current: Money::ZERO,
            days_1_30: Money::ZERO,
            days_31_60: Money::ZERO,
            days_61_90: Money::ZERO,
            over_90: Money::ZERO,
            total: Money::ZERO,
        }
    }

    fn add(&mut self, bucket: AgingBucket, amount: Money) {
        let slot = match bucket {
            AgingBucket::Current => &mut self.current,
            AgingBucket::Days1To30 => &mut self.days_1_30,
            AgingBucket::Days31To60 => &mut self.days_31_60,
            AgingBucket::Days61To90 => &mut self.days_61_90,
            AgingBucket::Over90 => &mut self.over_90,
        };
        *slot += amount;
        self.total += amount;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemValuation {
    pub item_id: ItemId,
    pub code: String,
    pub name: String,
    pub quantity: i64,
    /// Unit cost of the latest inbound purchase that carried one.
    pub unit_cost: Option<Money>,
    pub value: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockValuation {
    pub items: Vec<ItemValuation>,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaysSalesOutstanding {
    pub as_of: NaiveDate,
    pub period_days: u32,
    pub receivables: Money,
    pub credit_sales: Money,
    /// `None` when there were no sales in the period.
    pub days: Option<f64>,
}

pub struct ReportingService<S: Store> {
    ctx: LedgerContext<S>,
}

impl<S: Store> Clone for ReportingService<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<S: Store> ReportingService<S> {
    pub fn new(ctx: LedgerContext<S>) -> Self {
        Self { ctx }
    }

    /// Open invoice balances per customer, bucketed by days past due.
    ///
    /// Invoices without a due date age from their invoice date. Customers
    /// with nothing open are left out.
    pub async fn ar_aging(&self, as_of: NaiveDate) -> LedgerResult<Vec<CustomerAging>> {
        let mut tx = self.ctx.begin().await?;
        let mut rows: BTreeMap<CustomerId, CustomerAging> = BTreeMap::new();
        for invoice in tx.invoices().await? {
            if !invoice.status.is_open() || invoice.balance_amount.is_zero() {
                continue;
            }
            let due = invoice.due_date.unwrap_or(invoice.invoice_date);
            let bucket = AgingBucket::for_days_past_due((as_of - due).num_days());
            rows.entry(invoice.customer_id)
                .or_insert_with(|| CustomerAging::new(invoice.customer_id))
                .add(bucket, invoice.balance_amount);
        }

        for customer in tx.customers().await? {
            if let Some(row) = rows.get_mut(&customer.id) {
                row.customer_code = customer.code;
                row.customer_name = customer.name;
            }
        }
        Ok(rows.into_values().collect())
    }

    /// Items at or below their reorder level.
    pub async fn low_stock(&self) -> LedgerResult<Vec<Item>> {
        let mut tx = self.ctx.begin().await?;
        let mut items: Vec<Item> = tx
            .items()
            .await?
            .into_iter()
            .filter(Item::is_low_stock)
            .collect();
        items.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(items)
    }

    /// Stock on hand valued at each item's latest purchase cost.
    pub async fn stock_valuation(&self) -> LedgerResult<StockValuation> {
        let mut tx = self.ctx.begin().await?;
        let mut items = Vec::new();
        let mut total = Money::ZERO;
        for item in tx.items().await? {
            let unit_cost = tx
                .movements(item.id, None)
                .await?
                .into_iter()
                .find(|m| m.movement_type == MovementType::Purchase && m.is_inbound())
                .and_then(|m| m.unit_cost);
            let value = match unit_cost {
                Some(cost) => cost.checked_mul(item.current_stock).ok_or_else(|| {
                    LedgerError::invariant(format!("valuation overflow for item {}", item.code))
                })?,
                None => Money::ZERO,
            };
            total += value;
            items.push(ItemValuation {
                item_id: item.id,
                code: item.code,
                name: item.name,
                quantity: item.current_stock,
                unit_cost,
                value,
            });
        }
        Ok(StockValuation { items, total })
    }

    /// Receivables divided by the period's invoiced sales, times the period.
    pub async fn days_sales_outstanding(
        &self,
        as_of: NaiveDate,
        period_days: u32,
    ) -> LedgerResult<DaysSalesOutstanding> {
        if period_days == 0 {
            return Err(LedgerError::validation("period must be at least one day"));
        }
        let start = as_of - Duration::days(i64::from(period_days));

        let mut tx = self.ctx.begin().await?;
        let receivables: Money = tx.customers().await?.iter().map(|c| c.current_balance).sum();
        let credit_sales: Money = tx
            .invoices()
            .await?
            .iter()
            .filter(|i| !matches!(i.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled))
            .filter(|i| i.invoice_date > start && i.invoice_date <= as_of)
            .map(|i| i.total_amount)
            .sum();

        let days = (credit_sales.is_positive()).then(|| {
            receivables.cents() as f64 / credit_sales.cents() as f64 * f64::from(period_days)
        });
        Ok(DaysSalesOutstanding {
            as_of,
            period_days,
            receivables,
            credit_sales,
            days,
        })
    }
}
