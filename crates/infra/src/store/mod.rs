//! Transactional storage for the ledger tables.
//!
//! Every service operation runs inside exactly one [`LedgerTx`]. A transaction
//! that is dropped without [`LedgerTx::commit`] is rolled back, so an early
//! `?` return leaves no partial writes behind.
//!
//! Two implementations:
//! - [`memory::InMemoryStore`]: tests/dev, serialises transactions.
//! - [`postgres::PostgresStore`]: production, one SQL transaction per unit of work.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use bizbooks_core::{
    AllocationId, CustomerId, InvoiceId, ItemId, Money, PaymentId, WarehouseId,
};
use bizbooks_inventory::{
    Item, MovementType, NewItem, NewStockMovement, NewWarehouse, StockBalance, StockMovement,
    Warehouse,
};
use bizbooks_invoicing::{Invoice, InvoiceLine, NewInvoice, NewPayment, Payment, PaymentAllocation};
use bizbooks_parties::{Customer, CustomerLedgerEntry, LedgerEntryType, NewCustomer, NewLedgerEntry};

use crate::activity_log::ActivityEntry;
use crate::error::StoreError;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Factory for units of work.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: LedgerTx;

    async fn begin(&self) -> StoreResult<Self::Tx>;
}

/// Summed movement quantity for one (item, warehouse) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementTotal {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

/// One open unit of work over all ledger tables.
///
/// Reads observe the transaction's own uncommitted writes. List methods
/// return rows in ascending id order unless stated otherwise.
#[async_trait]
pub trait LedgerTx: Send {
    async fn commit(self) -> StoreResult<()>;

    // --- reference data -------------------------------------------------

    async fn insert_item(&mut self, item: &NewItem) -> StoreResult<Item>;
    async fn item(&mut self, id: ItemId) -> StoreResult<Option<Item>>;
    async fn items(&mut self) -> StoreResult<Vec<Item>>;
    async fn set_item_current_stock(&mut self, id: ItemId, quantity: i64) -> StoreResult<()>;

    async fn insert_warehouse(&mut self, warehouse: &NewWarehouse) -> StoreResult<Warehouse>;
    async fn warehouse(&mut self, id: WarehouseId) -> StoreResult<Option<Warehouse>>;
    async fn warehouse_by_code(&mut self, code: &str) -> StoreResult<Option<Warehouse>>;

    async fn insert_customer(&mut self, customer: &NewCustomer) -> StoreResult<Customer>;
    async fn customer(&mut self, id: CustomerId) -> StoreResult<Option<Customer>>;
    async fn customers(&mut self) -> StoreResult<Vec<Customer>>;
    async fn set_customer_balance(&mut self, id: CustomerId, balance: Money) -> StoreResult<()>;
    async fn set_customer_opening_balance(&mut self, id: CustomerId, amount: Money)
    -> StoreResult<()>;

    // --- document numbering ---------------------------------------------

    /// Increment and return the counter for `(prefix, year)`, starting at 1.
    async fn next_sequence(&mut self, prefix: &str, year: i32) -> StoreResult<i64>;

    // --- stock ----------------------------------------------------------

    async fn insert_movement(
        &mut self,
        movement_no: &str,
        movement: &NewStockMovement,
    ) -> StoreResult<StockMovement>;

    /// Movements of an item, optionally in one warehouse, newest first.
    async fn movements(
        &mut self,
        item: ItemId,
        warehouse: Option<WarehouseId>,
    ) -> StoreResult<Vec<StockMovement>>;

    /// Most recent movement of `movement_type` for `item` posted under the
    /// document (`doctype`, `docno`).
    async fn find_movement(
        &mut self,
        item: ItemId,
        movement_type: MovementType,
        doctype: &str,
        docno: &str,
    ) -> StoreResult<Option<StockMovement>>;

    /// `SUM(quantity)` of all movements, grouped by (item, warehouse).
    async fn movement_totals(&mut self) -> StoreResult<Vec<MovementTotal>>;

    async fn stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
    ) -> StoreResult<Option<StockBalance>>;
    async fn item_balances(&mut self, item: ItemId) -> StoreResult<Vec<StockBalance>>;
    async fn stock_balances(&mut self) -> StoreResult<Vec<StockBalance>>;
    async fn insert_stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
        quantity: i64,
    ) -> StoreResult<()>;
    async fn set_stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
        quantity: i64,
    ) -> StoreResult<()>;
    async fn delete_stock_balance(&mut self, item: ItemId, warehouse: WarehouseId)
    -> StoreResult<()>;

    // --- customer ledger ------------------------------------------------

    /// Entry with the highest id for the customer.
    async fn last_ledger_entry(
        &mut self,
        customer: CustomerId,
    ) -> StoreResult<Option<CustomerLedgerEntry>>;
    async fn insert_ledger_entry(
        &mut self,
        entry: &NewLedgerEntry,
        balance: Money,
    ) -> StoreResult<CustomerLedgerEntry>;
    async fn ledger_entries(&mut self, customer: CustomerId) -> StoreResult<Vec<CustomerLedgerEntry>>;
    /// Returns the number of rows removed.
    async fn delete_ledger_entries(
        &mut self,
        customer: CustomerId,
        entry_type: LedgerEntryType,
        reference_no: &str,
    ) -> StoreResult<u64>;

    // --- invoices -------------------------------------------------------

    async fn insert_invoice(&mut self, invoice: &NewInvoice) -> StoreResult<Invoice>;
    async fn invoice(&mut self, id: InvoiceId) -> StoreResult<Option<Invoice>>;
    async fn invoices(&mut self) -> StoreResult<Vec<Invoice>>;
    async fn customer_invoices(&mut self, customer: CustomerId) -> StoreResult<Vec<Invoice>>;
    /// Overwrite every mutable column of an existing invoice.
    async fn update_invoice(&mut self, invoice: &Invoice) -> StoreResult<()>;
    /// Fails with [`StoreError::ForeignKeyViolation`] while allocations still
    /// reference the invoice. Lines are removed with it.
    async fn delete_invoice(&mut self, id: InvoiceId) -> StoreResult<()>;

    async fn insert_invoice_lines(
        &mut self,
        invoice: InvoiceId,
        lines: &[InvoiceLine],
    ) -> StoreResult<()>;
    async fn invoice_lines(&mut self, invoice: InvoiceId) -> StoreResult<Vec<InvoiceLine>>;
    async fn delete_invoice_lines(&mut self, invoice: InvoiceId) -> StoreResult<()>;

    // --- payments -------------------------------------------------------

    async fn insert_payment(&mut self, payment: &NewPayment) -> StoreResult<Payment>;
    async fn payment(&mut self, id: PaymentId) -> StoreResult<Option<Payment>>;
    async fn set_payment_amount(&mut self, id: PaymentId, amount: Money) -> StoreResult<()>;
    /// Fails with [`StoreError::ForeignKeyViolation`] while allocations remain.
    async fn delete_payment(&mut self, id: PaymentId) -> StoreResult<()>;

    async fn insert_allocation(
        &mut self,
        payment: PaymentId,
        invoice: InvoiceId,
        amount: Money,
    ) -> StoreResult<PaymentAllocation>;
    async fn invoice_allocations(&mut self, invoice: InvoiceId)
    -> StoreResult<Vec<PaymentAllocation>>;
    async fn payment_allocations(&mut self, payment: PaymentId)
    -> StoreResult<Vec<PaymentAllocation>>;
    async fn delete_allocation(&mut self, id: AllocationId) -> StoreResult<()>;

    // --- activity log ---------------------------------------------------

    async fn insert_activity(&mut self, entries: &[ActivityEntry]) -> StoreResult<()>;
    /// Most recent entries first.
    async fn recent_activity(&mut self, limit: usize) -> StoreResult<Vec<ActivityEntry>>;
}
