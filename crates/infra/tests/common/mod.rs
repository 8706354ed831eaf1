#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;

use bizbooks_core::{CustomerId, ItemId, Money, WarehouseId};
use bizbooks_infra::repair::repair_in;
use bizbooks_infra::{
    CreateInvoice, FixedClock, InMemoryStore, InventoryService, InvoiceDetails, LedgerConfig,
    LedgerContext, LedgerTx, ReceivablesService, ReferenceData, ReportingService, Store,
    StockTransfer,
};
use bizbooks_inventory::{NewItem, NewWarehouse, StockLine};
use bizbooks_invoicing::{InvoiceLineInput, InvoiceStatus};
use bizbooks_parties::{LedgerEntryType, NewCustomer};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn today() -> NaiveDate {
    date(2026, 3, 15)
}

pub fn money(cents: i64) -> Money {
    Money::from_cents(cents)
}

/// A store seeded with MAIN (id 1), RAW, FG and WEST warehouses and one
/// customer, with services pinned to [`today`].
pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub ctx: LedgerContext<InMemoryStore>,
    pub receivables: ReceivablesService<InMemoryStore>,
    pub inventory: InventoryService<InMemoryStore>,
    pub reports: ReportingService<InMemoryStore>,
    pub reference: ReferenceData<InMemoryStore>,
    pub main: WarehouseId,
    pub raw: WarehouseId,
    pub finished: WarehouseId,
    pub west: WarehouseId,
    pub customer: CustomerId,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let ctx = LedgerContext::new(store.clone(), LedgerConfig::default())
            .with_clock(FixedClock(today()));
        let reference = ReferenceData::new(ctx.clone());

        let main = reference
            .register_warehouse(NewWarehouse::new("MAIN", "Main store"))
            .await
            .unwrap()
            .id;
        let raw = reference
            .register_warehouse(NewWarehouse::new("RAW", "Raw materials"))
            .await
            .unwrap()
            .id;
        let finished = reference
            .register_warehouse(NewWarehouse::new("FG", "Finished goods"))
            .await
            .unwrap()
            .id;
        let west = reference
            .register_warehouse(NewWarehouse::new("WEST", "West depot"))
            .await
            .unwrap()
            .id;
        let customer = reference
            .register_customer(NewCustomer::new("C001", "Acme Traders"))
            .await
            .unwrap()
            .id;

        Self {
            receivables: ReceivablesService::new(ctx.clone()),
            inventory: InventoryService::new(ctx.clone()),
            reports: ReportingService::new(ctx.clone()),
            reference,
            store,
            ctx,
            main,
            raw,
            finished,
            west,
            customer,
        }
    }

    pub async fn item(&self, code: &str) -> ItemId {
        self.reference
            .register_item(NewItem::new(code, format!("Item {code}")))
            .await
            .unwrap()
            .id
    }

    pub async fn customer(&self, code: &str) -> CustomerId {
        self.reference
            .register_customer(NewCustomer::new(code, format!("Customer {code}")))
            .await
            .unwrap()
            .id
    }

    /// Receive `quantity` of `item` into `warehouse` at `unit_cost` cents.
    pub async fn receive(&self, item: ItemId, warehouse: WarehouseId, quantity: i64, unit_cost: i64) {
        let mut line = StockLine::new(item, quantity);
        line.unit_cost = Some(money(unit_cost));
        self.inventory
            .receive_purchase(
                StockTransfer {
                    warehouse_id: Some(warehouse),
                    lines: vec![line],
                    reference: Some("DN-1".to_string()),
                    movement_date: Some(today()),
                },
                None,
            )
            .await
            .unwrap();
    }

    /// Invoice request due in 30 days, no payment.
    pub fn invoice_request(&self, lines: Vec<InvoiceLineInput>) -> CreateInvoice {
        CreateInvoice {
            customer_id: self.customer,
            invoice_date: today(),
            due_date: Some(date(2026, 4, 14)),
            lines,
            discount_bp: 0,
            tax_bp: 0,
            notes: None,
            status: None,
            payment: None,
        }
    }

    pub async fn invoice(&self, item: ItemId, quantity: i64, unit_price: i64) -> InvoiceDetails {
        let request =
            self.invoice_request(vec![InvoiceLineInput::new(item, quantity, money(unit_price))]);
        self.receivables.create_invoice(request, None).await.unwrap()
    }

    pub async fn stock(&self, item: ItemId, warehouse: WarehouseId) -> i64 {
        let mut tx = self.store.begin().await.unwrap();
        tx.stock_balance(item, warehouse)
            .await
            .unwrap()
            .map(|b| b.quantity)
            .unwrap_or(0)
    }

    pub async fn current_stock(&self, item: ItemId) -> i64 {
        let mut tx = self.store.begin().await.unwrap();
        tx.item(item).await.unwrap().unwrap().current_stock
    }

    pub async fn customer_balance(&self, customer: CustomerId) -> Money {
        let mut tx = self.store.begin().await.unwrap();
        tx.customer(customer).await.unwrap().unwrap().current_balance
    }

    /// Check every cached figure against its source rows.
    pub async fn assert_consistent(&self) {
        let mut tx = self.store.begin().await.unwrap();

        let totals: BTreeMap<_, _> = tx
            .movement_totals()
            .await
            .unwrap()
            .into_iter()
            .map(|t| ((t.item_id, t.warehouse_id), t.quantity))
            .collect();
        let balances: BTreeMap<_, _> = tx
            .stock_balances()
            .await
            .unwrap()
            .into_iter()
            .map(|b| ((b.item_id, b.warehouse_id), b.quantity))
            .collect();
        assert_eq!(balances, totals, "stock balances diverge from movements");

        for item in tx.items().await.unwrap() {
            let sum: i64 = balances
                .iter()
                .filter(|((i, _), _)| *i == item.id)
                .map(|(_, q)| *q)
                .sum();
            assert_eq!(item.current_stock, sum, "current_stock of {}", item.code);
        }

        let mut payment_sums: BTreeMap<_, Money> = BTreeMap::new();
        for invoice in tx.invoices().await.unwrap() {
            let allocations = tx.invoice_allocations(invoice.id).await.unwrap();
            let paid: Money = allocations.iter().map(|a| a.amount).sum();
            for a in &allocations {
                *payment_sums.entry(a.payment_id).or_default() += a.amount;
            }
            assert_eq!(invoice.paid_amount, paid, "paid of {}", invoice.invoice_no);
            assert_eq!(
                invoice.balance_amount,
                invoice.total_amount - invoice.paid_amount,
                "balance of {}",
                invoice.invoice_no
            );
            if !matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled) {
                if invoice.balance_amount.is_zero() && invoice.total_amount.is_positive() {
                    assert_eq!(invoice.status, InvoiceStatus::Paid);
                }
                if invoice.balance_amount.is_positive()
                    && invoice.balance_amount < invoice.total_amount
                {
                    assert!(matches!(
                        invoice.status,
                        InvoiceStatus::PartiallyPaid | InvoiceStatus::Overdue
                    ));
                }
            }
        }

        let mut expected_credits: BTreeMap<_, Money> = BTreeMap::new();
        for (payment, allocated) in payment_sums {
            let payment = tx.payment(payment).await.unwrap().unwrap();
            assert!(
                payment.amount.within(allocated, Money::MINOR_UNIT),
                "allocations of {} sum to {allocated}, payment is {}",
                payment.payment_no,
                payment.amount
            );
            *expected_credits.entry(payment.customer_id).or_default() += payment.amount;
        }

        for customer in tx.customers().await.unwrap() {
            let entries = tx.ledger_entries(customer.id).await.unwrap();
            let credited: Money = entries
                .iter()
                .filter(|e| e.entry_type == LedgerEntryType::Payment)
                .map(|e| e.credit)
                .sum();
            let expected = expected_credits.get(&customer.id).copied().unwrap_or_default();
            assert_eq!(credited, expected, "payment credits of {}", customer.code);

            for invoice in tx.customer_invoices(customer.id).await.unwrap() {
                let debited: Money = entries
                    .iter()
                    .filter(|e| {
                        e.entry_type == LedgerEntryType::Invoice
                            && e.reference_no == invoice.invoice_no
                    })
                    .map(|e| e.debit)
                    .sum();
                assert_eq!(
                    debited, invoice.total_amount,
                    "ledger debit of {}",
                    invoice.invoice_no
                );
            }
        }

        for customer in tx.customers().await.unwrap() {
            let open: Money = tx
                .customer_invoices(customer.id)
                .await
                .unwrap()
                .iter()
                .filter(|i| i.status.is_open())
                .map(|i| i.balance_amount)
                .sum();
            assert_eq!(customer.current_balance, open, "balance of {}", customer.code);
        }

        let report = repair_in(&mut tx, today()).await.unwrap();
        assert!(report.is_clean(), "repair would still write: {report:?}");
    }
}
