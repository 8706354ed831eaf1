use std::collections::{BTreeMap, btree_map};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use bizbooks_core::{
    AllocationId, CustomerId, Entity, InvoiceId, ItemId, LedgerEntryId, Money, MovementId,
    PaymentId, WarehouseId,
};
use bizbooks_inventory::{
    Item, MovementType, NewItem, NewStockMovement, NewWarehouse, StockBalance, StockMovement,
    Warehouse,
};
use bizbooks_invoicing::{Invoice, InvoiceLine, NewInvoice, NewPayment, Payment, PaymentAllocation};
use bizbooks_parties::{Customer, CustomerLedgerEntry, LedgerEntryType, NewCustomer, NewLedgerEntry};

use super::{LedgerTx, MovementTotal, Store, StoreResult};
use crate::activity_log::ActivityEntry;
use crate::error::StoreError;

/// Rows of one table keyed by entity id, plus its id sequence.
struct Table<E: Entity> {
    rows: BTreeMap<E::Id, E>,
    last_id: i64,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<E: Entity + Clone> Clone for Table<E> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            last_id: self.last_id,
        }
    }
}

impl<E: Entity> Table<E> {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn get(&self, id: E::Id) -> Option<&E> {
        self.rows.get(&id)
    }

    fn get_mut(&mut self, id: E::Id) -> StoreResult<&mut E> {
        self.rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::RowNotFound(format!("{id:?}")))
    }

    fn contains(&self, id: E::Id) -> bool {
        self.rows.contains_key(&id)
    }

    fn insert(&mut self, row: E) {
        self.rows.insert(row.id(), row);
    }

    fn remove(&mut self, id: E::Id) -> StoreResult<E> {
        self.rows
            .remove(&id)
            .ok_or_else(|| StoreError::RowNotFound(format!("{id:?}")))
    }

    fn values(&self) -> btree_map::Values<'_, E::Id, E> {
        self.rows.values()
    }
}

#[derive(Clone, Default)]
struct Tables {
    items: Table<Item>,
    warehouses: Table<Warehouse>,
    customers: Table<Customer>,
    counters: BTreeMap<(String, i32), i64>,
    movements: Table<StockMovement>,
    balances: Table<StockBalance>,
    ledger: Table<CustomerLedgerEntry>,
    invoices: Table<Invoice>,
    invoice_lines: BTreeMap<InvoiceId, Vec<InvoiceLine>>,
    payments: Table<Payment>,
    allocations: Table<PaymentAllocation>,
    activity: Vec<ActivityEntry>,
}

impl Tables {
    fn require_item(&self, id: ItemId) -> StoreResult<()> {
        if self.items.contains(id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(format!("item {id} does not exist")))
        }
    }

    fn require_warehouse(&self, id: WarehouseId) -> StoreResult<()> {
        if self.warehouses.contains(id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(format!(
                "warehouse {id} does not exist"
            )))
        }
    }

    fn require_customer(&self, id: CustomerId) -> StoreResult<()> {
        if self.customers.contains(id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(format!(
                "customer {id} does not exist"
            )))
        }
    }
}

fn unique<'a, E: 'a>(
    rows: impl IntoIterator<Item = &'a E>,
    key: impl Fn(&E) -> &str,
    value: &str,
    what: &str,
) -> StoreResult<()> {
    if rows.into_iter().any(|r| key(r) == value) {
        Err(StoreError::UniqueViolation(format!("{what} '{value}' already exists")))
    } else {
        Ok(())
    }
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Transactions are serialised: `begin` takes the
/// store lock and works on a copy of the tables, `commit` swaps the copy in,
/// and dropping the transaction discards it.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTx;

    async fn begin(&self) -> StoreResult<InMemoryTx> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTx { guard, working })
    }
}

pub struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn commit(self) -> StoreResult<()> {
        let InMemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn insert_item(&mut self, item: &NewItem) -> StoreResult<Item> {
        let t = &mut self.working;
        unique(t.items.values(), |i| i.code.as_str(), &item.code, "item code")?;
        let row = Item {
            id: ItemId::new(t.items.next_id()),
            code: item.code.clone(),
            name: item.name.clone(),
            unit: item.unit.clone(),
            current_stock: 0,
            reorder_level: item.reorder_level,
        };
        t.items.insert(row.clone());
        Ok(row)
    }

    async fn item(&mut self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.working.items.get(id).cloned())
    }

    async fn items(&mut self) -> StoreResult<Vec<Item>> {
        Ok(self.working.items.values().cloned().collect())
    }

    async fn set_item_current_stock(&mut self, id: ItemId, quantity: i64) -> StoreResult<()> {
        self.working.items.get_mut(id)?.current_stock = quantity;
        Ok(())
    }

    async fn insert_warehouse(&mut self, warehouse: &NewWarehouse) -> StoreResult<Warehouse> {
        let t = &mut self.working;
        unique(t.warehouses.values(), |w| w.code.as_str(), &warehouse.code, "warehouse code")?;
        let row = Warehouse {
            id: WarehouseId::new(t.warehouses.next_id()),
            code: warehouse.code.clone(),
            name: warehouse.name.clone(),
        };
        t.warehouses.insert(row.clone());
        Ok(row)
    }

    async fn warehouse(&mut self, id: WarehouseId) -> StoreResult<Option<Warehouse>> {
        Ok(self.working.warehouses.get(id).cloned())
    }

    async fn warehouse_by_code(&mut self, code: &str) -> StoreResult<Option<Warehouse>> {
        Ok(self
            .working
            .warehouses
            .values()
            .find(|w| w.code == code)
            .cloned())
    }

    async fn insert_customer(&mut self, customer: &NewCustomer) -> StoreResult<Customer> {
        let t = &mut self.working;
        unique(t.customers.values(), |c| c.code.as_str(), &customer.code, "customer code")?;
        let row = Customer {
            id: CustomerId::new(t.customers.next_id()),
            code: customer.code.clone(),
            name: customer.name.clone(),
            credit_limit: customer.credit_limit,
            opening_balance: Money::ZERO,
            current_balance: Money::ZERO,
        };
        t.customers.insert(row.clone());
        Ok(row)
    }

    async fn customer(&mut self, id: CustomerId) -> StoreResult<Option<Customer>> {
        Ok(self.working.customers.get(id).cloned())
    }

    async fn customers(&mut self) -> StoreResult<Vec<Customer>> {
        Ok(self.working.customers.values().cloned().collect())
    }

    async fn set_customer_balance(&mut self, id: CustomerId, balance: Money) -> StoreResult<()> {
        self.working.customers.get_mut(id)?.current_balance = balance;
        Ok(())
    }

    async fn set_customer_opening_balance(
        &mut self,
        id: CustomerId,
        amount: Money,
    ) -> StoreResult<()> {
        self.working.customers.get_mut(id)?.opening_balance = amount;
        Ok(())
    }

    async fn next_sequence(&mut self, prefix: &str, year: i32) -> StoreResult<i64> {
        let counter = self
            .working
            .counters
            .entry((prefix.to_string(), year))
            .or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn insert_movement(
        &mut self,
        movement_no: &str,
        movement: &NewStockMovement,
    ) -> StoreResult<StockMovement> {
        let t = &mut self.working;
        t.require_item(movement.item_id)?;
        t.require_warehouse(movement.warehouse_id)?;
        unique(t.movements.values(), |m| m.movement_no.as_str(), movement_no, "movement number")?;

        let row = StockMovement {
            id: MovementId::new(t.movements.next_id()),
            movement_no: movement_no.to_string(),
            item_id: movement.item_id,
            warehouse_id: movement.warehouse_id,
            movement_type: movement.movement_type,
            quantity: movement.quantity,
            unit_cost: movement.unit_cost,
            reference_doctype: movement.reference_doctype.clone(),
            reference_docno: movement.reference_docno.clone(),
            movement_date: movement.movement_date,
            created_by: movement.created_by,
            created_at: Utc::now(),
        };
        t.movements.insert(row.clone());
        Ok(row)
    }

    async fn movements(
        &mut self,
        item: ItemId,
        warehouse: Option<WarehouseId>,
    ) -> StoreResult<Vec<StockMovement>> {
        Ok(self
            .working
            .movements
            .values()
            .rev()
            .filter(|m| m.item_id == item && warehouse.is_none_or(|w| m.warehouse_id == w))
            .cloned()
            .collect())
    }

    async fn find_movement(
        &mut self,
        item: ItemId,
        movement_type: MovementType,
        doctype: &str,
        docno: &str,
    ) -> StoreResult<Option<StockMovement>> {
        Ok(self
            .working
            .movements
            .values()
            .rev()
            .find(|m| {
                m.item_id == item
                    && m.movement_type == movement_type
                    && m.reference_doctype == doctype
                    && m.reference_docno == docno
            })
            .cloned())
    }

    async fn movement_totals(&mut self) -> StoreResult<Vec<MovementTotal>> {
        let mut totals: BTreeMap<(ItemId, WarehouseId), i64> = BTreeMap::new();
        for m in self.working.movements.values() {
            *totals.entry((m.item_id, m.warehouse_id)).or_insert(0) += m.quantity;
        }
        Ok(totals
            .into_iter()
            .map(|((item_id, warehouse_id), quantity)| MovementTotal {
                item_id,
                warehouse_id,
                quantity,
            })
            .collect())
    }

    async fn stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
    ) -> StoreResult<Option<StockBalance>> {
        Ok(self.working.balances.get((item, warehouse)).cloned())
    }

    async fn item_balances(&mut self, item: ItemId) -> StoreResult<Vec<StockBalance>> {
        Ok(self
            .working
            .balances
            .values()
            .filter(|b| b.item_id == item)
            .cloned()
            .collect())
    }

    async fn stock_balances(&mut self) -> StoreResult<Vec<StockBalance>> {
        Ok(self.working.balances.values().cloned().collect())
    }

    async fn insert_stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
        quantity: i64,
    ) -> StoreResult<()> {
        let t = &mut self.working;
        t.require_item(item)?;
        t.require_warehouse(warehouse)?;
        if t.balances.contains((item, warehouse)) {
            return Err(StoreError::UniqueViolation(format!(
                "stock balance for item {item} in warehouse {warehouse} already exists"
            )));
        }
        t.balances.insert(StockBalance {
            item_id: item,
            warehouse_id: warehouse,
            quantity,
            updated_at: Utc::now(),
        });
        Ok(())
    }

    async fn set_stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
        quantity: i64,
    ) -> StoreResult<()> {
        let row = self.working.balances.get_mut((item, warehouse))?;
        row.quantity = quantity;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
    ) -> StoreResult<()> {
        self.working.balances.remove((item, warehouse)).map(|_| ())
    }

    async fn last_ledger_entry(
        &mut self,
        customer: CustomerId,
    ) -> StoreResult<Option<CustomerLedgerEntry>> {
        Ok(self
            .working
            .ledger
            .values()
            .rev()
            .find(|e| e.customer_id == customer)
            .cloned())
    }

    async fn insert_ledger_entry(
        &mut self,
        entry: &NewLedgerEntry,
        balance: Money,
    ) -> StoreResult<CustomerLedgerEntry> {
        let t = &mut self.working;
        t.require_customer(entry.customer_id)?;
        let row = CustomerLedgerEntry {
            id: LedgerEntryId::new(t.ledger.next_id()),
            customer_id: entry.customer_id,
            entry_date: entry.entry_date,
            entry_type: entry.entry_type,
            reference_no: entry.reference_no.clone(),
            description: entry.description.clone(),
            debit: entry.debit,
            credit: entry.credit,
            balance,
            created_by: entry.created_by,
            created_at: Utc::now(),
        };
        t.ledger.insert(row.clone());
        Ok(row)
    }

    async fn ledger_entries(
        &mut self,
        customer: CustomerId,
    ) -> StoreResult<Vec<CustomerLedgerEntry>> {
        Ok(self
            .working
            .ledger
            .values()
            .filter(|e| e.customer_id == customer)
            .cloned()
            .collect())
    }

    async fn delete_ledger_entries(
        &mut self,
        customer: CustomerId,
        entry_type: LedgerEntryType,
        reference_no: &str,
    ) -> StoreResult<u64> {
        let doomed: Vec<LedgerEntryId> = self
            .working
            .ledger
            .values()
            .filter(|e| {
                e.customer_id == customer
                    && e.entry_type == entry_type
                    && e.reference_no == reference_no
            })
            .map(|e| e.id)
            .collect();
        for id in &doomed {
            self.working.ledger.remove(*id)?;
        }
        Ok(doomed.len() as u64)
    }

    async fn insert_invoice(&mut self, invoice: &NewInvoice) -> StoreResult<Invoice> {
        let t = &mut self.working;
        t.require_customer(invoice.customer_id)?;
        unique(t.invoices.values(), |i| i.invoice_no.as_str(), &invoice.invoice_no, "invoice number")?;
        let now = Utc::now();
        let row = Invoice {
            id: InvoiceId::new(t.invoices.next_id()),
            invoice_no: invoice.invoice_no.clone(),
            customer_id: invoice.customer_id,
            invoice_date: invoice.invoice_date,
            due_date: invoice.due_date,
            total_amount: invoice.total_amount,
            paid_amount: invoice.paid_amount,
            balance_amount: invoice.balance_amount,
            status: invoice.status,
            discount_bp: invoice.discount_bp,
            tax_bp: invoice.tax_bp,
            notes: invoice.notes.clone(),
            created_by: invoice.created_by,
            created_at: now,
            updated_at: now,
        };
        t.invoices.insert(row.clone());
        Ok(row)
    }

    async fn invoice(&mut self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        Ok(self.working.invoices.get(id).cloned())
    }

    async fn invoices(&mut self) -> StoreResult<Vec<Invoice>> {
        Ok(self.working.invoices.values().cloned().collect())
    }

    async fn customer_invoices(&mut self, customer: CustomerId) -> StoreResult<Vec<Invoice>> {
        Ok(self
            .working
            .invoices
            .values()
            .filter(|i| i.customer_id == customer)
            .cloned()
            .collect())
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> StoreResult<()> {
        self.working.require_customer(invoice.customer_id)?;
        let row = self.working.invoices.get_mut(invoice.id)?;
        *row = Invoice {
            updated_at: Utc::now(),
            ..invoice.clone()
        };
        Ok(())
    }

    async fn delete_invoice(&mut self, id: InvoiceId) -> StoreResult<()> {
        let t = &mut self.working;
        if t.allocations.values().any(|a| a.invoice_id == id) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "invoice {id} is still referenced by payment allocations"
            )));
        }
        t.invoices.remove(id)?;
        t.invoice_lines.remove(&id);
        Ok(())
    }

    async fn insert_invoice_lines(
        &mut self,
        invoice: InvoiceId,
        lines: &[InvoiceLine],
    ) -> StoreResult<()> {
        let t = &mut self.working;
        if !t.invoices.contains(invoice) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "invoice {invoice} does not exist"
            )));
        }
        for line in lines {
            t.require_item(line.item_id)?;
            if let Some(w) = line.warehouse_id {
                t.require_warehouse(w)?;
            }
        }
        t.invoice_lines
            .entry(invoice)
            .or_default()
            .extend(lines.iter().cloned());
        Ok(())
    }

    async fn invoice_lines(&mut self, invoice: InvoiceId) -> StoreResult<Vec<InvoiceLine>> {
        Ok(self
            .working
            .invoice_lines
            .get(&invoice)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_invoice_lines(&mut self, invoice: InvoiceId) -> StoreResult<()> {
        self.working.invoice_lines.remove(&invoice);
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> StoreResult<Payment> {
        let t = &mut self.working;
        t.require_customer(payment.customer_id)?;
        unique(t.payments.values(), |p| p.payment_no.as_str(), &payment.payment_no, "payment number")?;
        let row = Payment {
            id: PaymentId::new(t.payments.next_id()),
            payment_no: payment.payment_no.clone(),
            customer_id: payment.customer_id,
            payment_date: payment.payment_date,
            amount: payment.amount,
            method: payment.method.clone(),
            reference: payment.reference.clone(),
            notes: payment.notes.clone(),
            created_by: payment.created_by,
            created_at: Utc::now(),
        };
        t.payments.insert(row.clone());
        Ok(row)
    }

    async fn payment(&mut self, id: PaymentId) -> StoreResult<Option<Payment>> {
        Ok(self.working.payments.get(id).cloned())
    }

    async fn set_payment_amount(&mut self, id: PaymentId, amount: Money) -> StoreResult<()> {
        self.working.payments.get_mut(id)?.amount = amount;
        Ok(())
    }

    async fn delete_payment(&mut self, id: PaymentId) -> StoreResult<()> {
        let t = &mut self.working;
        if t.allocations.values().any(|a| a.payment_id == id) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "payment {id} still has allocations"
            )));
        }
        t.payments.remove(id).map(|_| ())
    }

    async fn insert_allocation(
        &mut self,
        payment: PaymentId,
        invoice: InvoiceId,
        amount: Money,
    ) -> StoreResult<PaymentAllocation> {
        let t = &mut self.working;
        if !t.payments.contains(payment) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "payment {payment} does not exist"
            )));
        }
        if !t.invoices.contains(invoice) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "invoice {invoice} does not exist"
            )));
        }
        let row = PaymentAllocation {
            id: AllocationId::new(t.allocations.next_id()),
            payment_id: payment,
            invoice_id: invoice,
            amount,
        };
        t.allocations.insert(row.clone());
        Ok(row)
    }

    async fn invoice_allocations(
        &mut self,
        invoice: InvoiceId,
    ) -> StoreResult<Vec<PaymentAllocation>> {
        Ok(self
            .working
            .allocations
            .values()
            .filter(|a| a.invoice_id == invoice)
            .cloned()
            .collect())
    }

    async fn payment_allocations(
        &mut self,
        payment: PaymentId,
    ) -> StoreResult<Vec<PaymentAllocation>> {
        Ok(self
            .working
            .allocations
            .values()
            .filter(|a| a.payment_id == payment)
            .cloned()
            .collect())
    }

    async fn delete_allocation(&mut self, id: AllocationId) -> StoreResult<()> {
        self.working.allocations.remove(id).map(|_| ())
    }

    async fn insert_activity(&mut self, entries: &[ActivityEntry]) -> StoreResult<()> {
        self.working.activity.extend(entries.iter().cloned());
        Ok(())
    }

    async fn recent_activity(&mut self, limit: usize) -> StoreResult<Vec<ActivityEntry>> {
        Ok(self
            .working
            .activity
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_item(&NewItem::new("SKU-1", "Widget")).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn committed_writes_are_visible_to_the_next_transaction() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let item = tx.insert_item(&NewItem::new("SKU-1", "Widget")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.item(item.id).await.unwrap().unwrap().code, "SKU-1");
    }

    #[tokio::test]
    async fn movement_requires_existing_item_and_warehouse() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let m = NewStockMovement::new(
            ItemId::new(99),
            WarehouseId::new(1),
            MovementType::Purchase,
            5,
            date(),
        );
        let err = tx.insert_movement("STK-2026-00001", &m).await.unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_)));
    }

    #[tokio::test]
    async fn duplicate_codes_are_rejected() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_warehouse(&NewWarehouse::new("MAIN", "Main")).await.unwrap();
        let err = tx
            .insert_warehouse(&NewWarehouse::new("MAIN", "Other"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn counters_are_scoped_by_prefix_and_year() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.next_sequence("INV", 2026).await.unwrap(), 1);
        assert_eq!(tx.next_sequence("INV", 2026).await.unwrap(), 2);
        assert_eq!(tx.next_sequence("INV", 2027).await.unwrap(), 1);
        assert_eq!(tx.next_sequence("PAY", 2026).await.unwrap(), 1);
    }
}
