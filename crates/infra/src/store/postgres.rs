//! Postgres-backed ledger store.
//!
//! One `sqlx` transaction per unit of work. Ids come from `BIGSERIAL`
//! sequences; document counters are bumped with an upsert so two concurrent
//! transactions never hand out the same number.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (foreign key violation) | `23503` | `ForeignKeyViolation` |
//! | Database (other) | any other | `Database` |
//! | RowNotFound | N/A | `RowNotFound` |
//! | ColumnDecode / Decode | N/A | `Corrupt` |
//! | Other | N/A | `Database` |

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use bizbooks_core::{
    AllocationId, CustomerId, InvoiceId, ItemId, LedgerEntryId, Money, MovementId, PaymentId,
    UserId, WarehouseId,
};
use bizbooks_inventory::{
    Item, MovementType, NewItem, NewStockMovement, NewWarehouse, StockBalance, StockMovement,
    Warehouse,
};
use bizbooks_invoicing::{
    Invoice, InvoiceLine, InvoiceStatus, NewInvoice, NewPayment, Payment, PaymentAllocation,
};
use bizbooks_parties::{Customer, CustomerLedgerEntry, LedgerEntryType, NewCustomer, NewLedgerEntry};

use super::{LedgerTx, MovementTotal, Store, StoreResult};
use crate::activity_log::ActivityEntry;
use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connecting to postgres")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running ledger migrations")?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PgLedgerTx;

    async fn begin(&self) -> StoreResult<PgLedgerTx> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(PgLedgerTx { tx })
    }
}

pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(msg),
                Some("23503") => StoreError::ForeignKeyViolation(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::RowNotFound(operation.to_string()),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(format!("{operation}: {err}"))
        }
        other => StoreError::Database(format!("{operation}: {other}")),
    }
}

fn col<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn money(row: &PgRow, name: &str) -> StoreResult<Money> {
    col::<i64>(row, name).map(Money::from_cents)
}

fn actor(row: &PgRow, name: &str) -> StoreResult<Option<UserId>> {
    Ok(col::<Option<Uuid>>(row, name)?.map(UserId::from_uuid))
}

fn parsed<T: core::str::FromStr>(row: &PgRow, name: &str) -> StoreResult<T>
where
    T::Err: core::fmt::Display,
{
    let raw: String = col(row, name)?;
    raw.parse::<T>()
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn actor_uuid(actor: Option<UserId>) -> Option<Uuid> {
    actor.map(|a| *a.as_uuid())
}

/// Fails with `RowNotFound` when an UPDATE/DELETE touched nothing.
fn expect_rows(affected: u64, what: impl FnOnce() -> String) -> StoreResult<()> {
    if affected == 0 {
        Err(StoreError::RowNotFound(what()))
    } else {
        Ok(())
    }
}

fn item_from_row(row: &PgRow) -> StoreResult<Item> {
    Ok(Item {
        id: ItemId::new(col(row, "id")?),
        code: col(row, "code")?,
        name: col(row, "name")?,
        unit: col(row, "unit")?,
        current_stock: col(row, "current_stock")?,
        reorder_level: col(row, "reorder_level")?,
    })
}

fn warehouse_from_row(row: &PgRow) -> StoreResult<Warehouse> {
    Ok(Warehouse {
        id: WarehouseId::new(col(row, "id")?),
        code: col(row, "code")?,
        name: col(row, "name")?,
    })
}

fn customer_from_row(row: &PgRow) -> StoreResult<Customer> {
    Ok(Customer {
        id: CustomerId::new(col(row, "id")?),
        code: col(row, "code")?,
        name: col(row, "name")?,
        credit_limit: money(row, "credit_limit")?,
        opening_balance: money(row, "opening_balance")?,
        current_balance: money(row, "current_balance")?,
    })
}

fn movement_from_row(row: &PgRow) -> StoreResult<StockMovement> {
    Ok(StockMovement {
        id: MovementId::new(col(row, "id")?),
        movement_no: col(row, "movement_no")?,
        item_id: ItemId::new(col(row, "item_id")?),
        warehouse_id: WarehouseId::new(col(row, "warehouse_id")?),
        movement_type: parsed::<MovementType>(row, "movement_type")?,
        quantity: col(row, "quantity")?,
        unit_cost: col::<Option<i64>>(row, "unit_cost")?.map(Money::from_cents),
        reference_doctype: col(row, "reference_doctype")?,
        reference_docno: col(row, "reference_docno")?,
        movement_date: col(row, "movement_date")?,
        created_by: actor(row, "created_by")?,
        created_at: col(row, "created_at")?,
    })
}

fn balance_from_row(row: &PgRow) -> StoreResult<StockBalance> {
    Ok(StockBalance {
        item_id: ItemId::new(col(row, "item_id")?),
        warehouse_id: WarehouseId::new(col(row, "warehouse_id")?),
        quantity: col(row, "quantity")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn ledger_entry_from_row(row: &PgRow) -> StoreResult<CustomerLedgerEntry> {
    Ok(CustomerLedgerEntry {
        id: LedgerEntryId::new(col(row, "id")?),
        customer_id: CustomerId::new(col(row, "customer_id")?),
        entry_date: col(row, "entry_date")?,
        entry_type: parsed::<LedgerEntryType>(row, "entry_type")?,
        reference_no: col(row, "reference_no")?,
        description: col(row, "description")?,
        debit: money(row, "debit")?,
        credit: money(row, "credit")?,
        balance: money(row, "balance")?,
        created_by: actor(row, "created_by")?,
        created_at: col(row, "created_at")?,
    })
}

fn invoice_from_row(row: &PgRow) -> StoreResult<Invoice> {
    Ok(Invoice {
        id: InvoiceId::new(col(row, "id")?),
        invoice_no: col(row, "invoice_no")?,
        customer_id: CustomerId::new(col(row, "customer_id")?),
        invoice_date: col(row, "invoice_date")?,
        due_date: col(row, "due_date")?,
        total_amount: money(row, "total_amount")?,
        paid_amount: money(row, "paid_amount")?,
        balance_amount: money(row, "balance_amount")?,
        status: parsed::<InvoiceStatus>(row, "status")?,
        discount_bp: col::<i32>(row, "discount_bp")? as u32,
        tax_bp: col::<i32>(row, "tax_bp")? as u32,
        notes: col(row, "notes")?,
        created_by: actor(row, "created_by")?,
        created_at: col(row, "created_at")?,
        updated_at: col(row, "updated_at")?,
    })
}

fn invoice_line_from_row(row: &PgRow) -> StoreResult<InvoiceLine> {
    Ok(InvoiceLine {
        line_no: col::<i32>(row, "line_no")? as u32,
        item_id: ItemId::new(col(row, "item_id")?),
        warehouse_id: col::<Option<i64>>(row, "warehouse_id")?.map(WarehouseId::new),
        description: col(row, "description")?,
        quantity: col(row, "quantity")?,
        unit_price: money(row, "unit_price")?,
        amount: money(row, "amount")?,
    })
}

fn payment_from_row(row: &PgRow) -> StoreResult<Payment> {
    Ok(Payment {
        id: PaymentId::new(col(row, "id")?),
        payment_no: col(row, "payment_no")?,
        customer_id: CustomerId::new(col(row, "customer_id")?),
        payment_date: col(row, "payment_date")?,
        amount: money(row, "amount")?,
        method: col(row, "method")?,
        reference: col(row, "reference")?,
        notes: col(row, "notes")?,
        created_by: actor(row, "created_by")?,
        created_at: col(row, "created_at")?,
    })
}

fn allocation_from_row(row: &PgRow) -> StoreResult<PaymentAllocation> {
    Ok(PaymentAllocation {
        id: AllocationId::new(col(row, "id")?),
        payment_id: PaymentId::new(col(row, "payment_id")?),
        invoice_id: InvoiceId::new(col(row, "invoice_id")?),
        amount: money(row, "amount")?,
    })
}

fn activity_from_row(row: &PgRow) -> StoreResult<ActivityEntry> {
    Ok(ActivityEntry {
        actor: actor(row, "actor")?,
        action: col(row, "action")?,
        entity_type: col(row, "entity_type")?,
        entity_ref: col(row, "entity_ref")?,
        details: col::<JsonValue>(row, "details")?,
        occurred_at: col(row, "occurred_at")?,
    })
}

fn collect<T>(rows: Vec<PgRow>, f: fn(&PgRow) -> StoreResult<T>) -> StoreResult<Vec<T>> {
    rows.iter().map(f).collect()
}

const MOVEMENT_COLUMNS: &str = "id, movement_no, item_id, warehouse_id, movement_type, quantity, \
     unit_cost, reference_doctype, reference_docno, movement_date, created_by, created_at";

const LEDGER_COLUMNS: &str = "id, customer_id, entry_date, entry_type, reference_no, description, \
     debit, credit, balance, created_by, created_at";

const INVOICE_COLUMNS: &str = "id, invoice_no, customer_id, invoice_date, due_date, total_amount, \
     paid_amount, balance_amount, status, discount_bp, tax_bp, notes, created_by, created_at, \
     updated_at";

const PAYMENT_COLUMNS: &str = "id, payment_no, customer_id, payment_date, amount, method, \
     reference, notes, created_by, created_at";

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn insert_item(&mut self, item: &NewItem) -> StoreResult<Item> {
        let row = sqlx::query(
            r#"
            INSERT INTO items (code, name, unit, reorder_level)
            VALUES ($1, $2, $3, $4)
            RETURNING id, code, name, unit, current_stock, reorder_level
            "#,
        )
        .bind(&item.code)
        .bind(&item.name)
        .bind(&item.unit)
        .bind(item.reorder_level)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        item_from_row(&row)
    }

    async fn item(&mut self, id: ItemId) -> StoreResult<Option<Item>> {
        let row = sqlx::query(
            "SELECT id, code, name, unit, current_stock, reorder_level FROM items WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("item", e))?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn items(&mut self) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query(
            "SELECT id, code, name, unit, current_stock, reorder_level FROM items ORDER BY id",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("items", e))?;
        collect(rows, item_from_row)
    }

    async fn set_item_current_stock(&mut self, id: ItemId, quantity: i64) -> StoreResult<()> {
        let done = sqlx::query("UPDATE items SET current_stock = $2 WHERE id = $1")
            .bind(id.get())
            .bind(quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_item_current_stock", e))?;
        expect_rows(done.rows_affected(), || format!("item {id}"))
    }

    async fn insert_warehouse(&mut self, warehouse: &NewWarehouse) -> StoreResult<Warehouse> {
        let row = sqlx::query(
            "INSERT INTO warehouses (code, name) VALUES ($1, $2) RETURNING id, code, name",
        )
        .bind(&warehouse.code)
        .bind(&warehouse.name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_warehouse", e))?;
        warehouse_from_row(&row)
    }

    async fn warehouse(&mut self, id: WarehouseId) -> StoreResult<Option<Warehouse>> {
        let row = sqlx::query("SELECT id, code, name FROM warehouses WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("warehouse", e))?;
        row.as_ref().map(warehouse_from_row).transpose()
    }

    async fn warehouse_by_code(&mut self, code: &str) -> StoreResult<Option<Warehouse>> {
        let row = sqlx::query("SELECT id, code, name FROM warehouses WHERE code = $1")
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("warehouse_by_code", e))?;
        row.as_ref().map(warehouse_from_row).transpose()
    }

    async fn insert_customer(&mut self, customer: &NewCustomer) -> StoreResult<Customer> {
        let row = sqlx::query(
            r#"
            INSERT INTO customers (code, name, credit_limit)
            VALUES ($1, $2, $3)
            RETURNING id, code, name, credit_limit, opening_balance, current_balance
            "#,
        )
        .bind(&customer.code)
        .bind(&customer.name)
        .bind(customer.credit_limit.cents())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?;
        customer_from_row(&row)
    }

    async fn customer(&mut self, id: CustomerId) -> StoreResult<Option<Customer>> {
        let row = sqlx::query(
            "SELECT id, code, name, credit_limit, opening_balance, current_balance \
             FROM customers WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("customer", e))?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn customers(&mut self) -> StoreResult<Vec<Customer>> {
        let rows = sqlx::query(
            "SELECT id, code, name, credit_limit, opening_balance, current_balance \
             FROM customers ORDER BY id",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("customers", e))?;
        collect(rows, customer_from_row)
    }

    async fn set_customer_balance(&mut self, id: CustomerId, balance: Money) -> StoreResult<()> {
        let done = sqlx::query("UPDATE customers SET current_balance = $2 WHERE id = $1")
            .bind(id.get())
            .bind(balance.cents())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_customer_balance", e))?;
        expect_rows(done.rows_affected(), || format!("customer {id}"))
    }

    async fn set_customer_opening_balance(
        &mut self,
        id: CustomerId,
        amount: Money,
    ) -> StoreResult<()> {
        let done = sqlx::query("UPDATE customers SET opening_balance = $2 WHERE id = $1")
            .bind(id.get())
            .bind(amount.cents())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_customer_opening_balance", e))?;
        expect_rows(done.rows_affected(), || format!("customer {id}"))
    }

    #[instrument(skip(self), err)]
    async fn next_sequence(&mut self, prefix: &str, year: i32) -> StoreResult<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO document_counters (prefix, year, last_value)
            VALUES ($1, $2, 1)
            ON CONFLICT (prefix, year)
            DO UPDATE SET last_value = document_counters.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(prefix)
        .bind(year)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("next_sequence", e))?;
        col(&row, "last_value")
    }

    async fn insert_movement(
        &mut self,
        movement_no: &str,
        movement: &NewStockMovement,
    ) -> StoreResult<StockMovement> {
        let sql = format!(
            "INSERT INTO stock_movements (movement_no, item_id, warehouse_id, movement_type, \
             quantity, unit_cost, reference_doctype, reference_docno, movement_date, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {MOVEMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(movement_no)
            .bind(movement.item_id.get())
            .bind(movement.warehouse_id.get())
            .bind(movement.movement_type.as_str())
            .bind(movement.quantity)
            .bind(movement.unit_cost.map(Money::cents))
            .bind(&movement.reference_doctype)
            .bind(&movement.reference_docno)
            .bind(movement.movement_date)
            .bind(actor_uuid(movement.created_by))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_movement", e))?;
        movement_from_row(&row)
    }

    async fn movements(
        &mut self,
        item: ItemId,
        warehouse: Option<WarehouseId>,
    ) -> StoreResult<Vec<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE item_id = $1 AND ($2::BIGINT IS NULL OR warehouse_id = $2) \
             ORDER BY id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(item.get())
            .bind(warehouse.map(WarehouseId::get))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("movements", e))?;
        collect(rows, movement_from_row)
    }

    async fn find_movement(
        &mut self,
        item: ItemId,
        movement_type: MovementType,
        doctype: &str,
        docno: &str,
    ) -> StoreResult<Option<StockMovement>> {
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE item_id = $1 AND movement_type = $2 \
               AND reference_doctype = $3 AND reference_docno = $4 \
             ORDER BY id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(item.get())
            .bind(movement_type.as_str())
            .bind(doctype)
            .bind(docno)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_movement", e))?;
        row.as_ref().map(movement_from_row).transpose()
    }

    async fn movement_totals(&mut self) -> StoreResult<Vec<MovementTotal>> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, warehouse_id, SUM(quantity)::BIGINT AS quantity
            FROM stock_movements
            GROUP BY item_id, warehouse_id
            ORDER BY item_id, warehouse_id
            "#,
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("movement_totals", e))?;
        rows.iter()
            .map(|row| {
                Ok(MovementTotal {
                    item_id: ItemId::new(col(row, "item_id")?),
                    warehouse_id: WarehouseId::new(col(row, "warehouse_id")?),
                    quantity: col(row, "quantity")?,
                })
            })
            .collect()
    }

    async fn stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
    ) -> StoreResult<Option<StockBalance>> {
        let row = sqlx::query(
            "SELECT item_id, warehouse_id, quantity, updated_at FROM stock_balances \
             WHERE item_id = $1 AND warehouse_id = $2 FOR UPDATE",
        )
        .bind(item.get())
        .bind(warehouse.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("stock_balance", e))?;
        row.as_ref().map(balance_from_row).transpose()
    }

    async fn item_balances(&mut self, item: ItemId) -> StoreResult<Vec<StockBalance>> {
        let rows = sqlx::query(
            "SELECT item_id, warehouse_id, quantity, updated_at FROM stock_balances \
             WHERE item_id = $1 ORDER BY warehouse_id",
        )
        .bind(item.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("item_balances", e))?;
        collect(rows, balance_from_row)
    }

    async fn stock_balances(&mut self) -> StoreResult<Vec<StockBalance>> {
        let rows = sqlx::query(
            "SELECT item_id, warehouse_id, quantity, updated_at FROM stock_balances \
             ORDER BY item_id, warehouse_id",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("stock_balances", e))?;
        collect(rows, balance_from_row)
    }

    async fn insert_stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
        quantity: i64,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO stock_balances (item_id, warehouse_id, quantity) VALUES ($1, $2, $3)",
        )
        .bind(item.get())
        .bind(warehouse.get())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_stock_balance", e))?;
        Ok(())
    }

    async fn set_stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
        quantity: i64,
    ) -> StoreResult<()> {
        let done = sqlx::query(
            "UPDATE stock_balances SET quantity = $3, updated_at = NOW() \
             WHERE item_id = $1 AND warehouse_id = $2",
        )
        .bind(item.get())
        .bind(warehouse.get())
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("set_stock_balance", e))?;
        expect_rows(done.rows_affected(), || {
            format!("stock balance ({item}, {warehouse})")
        })
    }

    async fn delete_stock_balance(
        &mut self,
        item: ItemId,
        warehouse: WarehouseId,
    ) -> StoreResult<()> {
        let done =
            sqlx::query("DELETE FROM stock_balances WHERE item_id = $1 AND warehouse_id = $2")
                .bind(item.get())
                .bind(warehouse.get())
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("delete_stock_balance", e))?;
        expect_rows(done.rows_affected(), || {
            format!("stock balance ({item}, {warehouse})")
        })
    }

    async fn last_ledger_entry(
        &mut self,
        customer: CustomerId,
    ) -> StoreResult<Option<CustomerLedgerEntry>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM customer_ledger WHERE customer_id = $1 \
             ORDER BY id DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(customer.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("last_ledger_entry", e))?;
        row.as_ref().map(ledger_entry_from_row).transpose()
    }

    async fn insert_ledger_entry(
        &mut self,
        entry: &NewLedgerEntry,
        balance: Money,
    ) -> StoreResult<CustomerLedgerEntry> {
        let sql = format!(
            "INSERT INTO customer_ledger (customer_id, entry_date, entry_type, reference_no, \
             description, debit, credit, balance, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {LEDGER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(entry.customer_id.get())
            .bind(entry.entry_date)
            .bind(entry.entry_type.as_str())
            .bind(&entry.reference_no)
            .bind(&entry.description)
            .bind(entry.debit.cents())
            .bind(entry.credit.cents())
            .bind(balance.cents())
            .bind(actor_uuid(entry.created_by))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_ledger_entry", e))?;
        ledger_entry_from_row(&row)
    }

    async fn ledger_entries(
        &mut self,
        customer: CustomerId,
    ) -> StoreResult<Vec<CustomerLedgerEntry>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM customer_ledger WHERE customer_id = $1 ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(customer.get())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("ledger_entries", e))?;
        collect(rows, ledger_entry_from_row)
    }

    async fn delete_ledger_entries(
        &mut self,
        customer: CustomerId,
        entry_type: LedgerEntryType,
        reference_no: &str,
    ) -> StoreResult<u64> {
        let done = sqlx::query(
            "DELETE FROM customer_ledger \
             WHERE customer_id = $1 AND entry_type = $2 AND reference_no = $3",
        )
        .bind(customer.get())
        .bind(entry_type.as_str())
        .bind(reference_no)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("delete_ledger_entries", e))?;
        Ok(done.rows_affected())
    }

    async fn insert_invoice(&mut self, invoice: &NewInvoice) -> StoreResult<Invoice> {
        let sql = format!(
            "INSERT INTO invoices (invoice_no, customer_id, invoice_date, due_date, total_amount, \
             paid_amount, balance_amount, status, discount_bp, tax_bp, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {INVOICE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&invoice.invoice_no)
            .bind(invoice.customer_id.get())
            .bind(invoice.invoice_date)
            .bind(invoice.due_date)
            .bind(invoice.total_amount.cents())
            .bind(invoice.paid_amount.cents())
            .bind(invoice.balance_amount.cents())
            .bind(invoice.status.as_str())
            .bind(invoice.discount_bp as i32)
            .bind(invoice.tax_bp as i32)
            .bind(&invoice.notes)
            .bind(actor_uuid(invoice.created_by))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        invoice_from_row(&row)
    }

    async fn invoice(&mut self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("invoice", e))?;
        row.as_ref().map(invoice_from_row).transpose()
    }

    async fn invoices(&mut self) -> StoreResult<Vec<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoices ORDER BY id");
        let rows = sqlx::query(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("invoices", e))?;
        collect(rows, invoice_from_row)
    }

    async fn customer_invoices(&mut self, customer: CustomerId) -> StoreResult<Vec<Invoice>> {
        let sql =
            format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE customer_id = $1 ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(customer.get())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("customer_invoices", e))?;
        collect(rows, invoice_from_row)
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> StoreResult<()> {
        let done = sqlx::query(
            r#"
            UPDATE invoices SET
                customer_id = $2,
                invoice_date = $3,
                due_date = $4,
                total_amount = $5,
                paid_amount = $6,
                balance_amount = $7,
                status = $8,
                discount_bp = $9,
                tax_bp = $10,
                notes = $11,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(invoice.id.get())
        .bind(invoice.customer_id.get())
        .bind(invoice.invoice_date)
        .bind(invoice.due_date)
        .bind(invoice.total_amount.cents())
        .bind(invoice.paid_amount.cents())
        .bind(invoice.balance_amount.cents())
        .bind(invoice.status.as_str())
        .bind(invoice.discount_bp as i32)
        .bind(invoice.tax_bp as i32)
        .bind(&invoice.notes)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_invoice", e))?;
        expect_rows(done.rows_affected(), || format!("invoice {}", invoice.id))
    }

    async fn delete_invoice(&mut self, id: InvoiceId) -> StoreResult<()> {
        let done = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_invoice", e))?;
        expect_rows(done.rows_affected(), || format!("invoice {id}"))
    }

    async fn insert_invoice_lines(
        &mut self,
        invoice: InvoiceId,
        lines: &[InvoiceLine],
    ) -> StoreResult<()> {
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    invoice_id, line_no, item_id, warehouse_id, description,
                    quantity, unit_price, amount
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(invoice.get())
            .bind(line.line_no as i32)
            .bind(line.item_id.get())
            .bind(line.warehouse_id.map(WarehouseId::get))
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price.cents())
            .bind(line.amount.cents())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_invoice_lines", e))?;
        }
        Ok(())
    }

    async fn invoice_lines(&mut self, invoice: InvoiceId) -> StoreResult<Vec<InvoiceLine>> {
        let rows = sqlx::query(
            r#"
            SELECT line_no, item_id, warehouse_id, description, quantity, unit_price, amount
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY line_no
            "#,
        )
        .bind(invoice.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("invoice_lines", e))?;
        collect(rows, invoice_line_from_row)
    }

    async fn delete_invoice_lines(&mut self, invoice: InvoiceId) -> StoreResult<()> {
        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = $1")
            .bind(invoice.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_invoice_lines", e))?;
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> StoreResult<Payment> {
        let sql = format!(
            "INSERT INTO payments (payment_no, customer_id, payment_date, amount, method, \
             reference, notes, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {PAYMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&payment.payment_no)
            .bind(payment.customer_id.get())
            .bind(payment.payment_date)
            .bind(payment.amount.cents())
            .bind(&payment.method)
            .bind(&payment.reference)
            .bind(&payment.notes)
            .bind(actor_uuid(payment.created_by))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_payment", e))?;
        payment_from_row(&row)
    }

    async fn payment(&mut self, id: PaymentId) -> StoreResult<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("payment", e))?;
        row.as_ref().map(payment_from_row).transpose()
    }

    async fn set_payment_amount(&mut self, id: PaymentId, amount: Money) -> StoreResult<()> {
        let done = sqlx::query("UPDATE payments SET amount = $2 WHERE id = $1")
            .bind(id.get())
            .bind(amount.cents())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("set_payment_amount", e))?;
        expect_rows(done.rows_affected(), || format!("payment {id}"))
    }

    async fn delete_payment(&mut self, id: PaymentId) -> StoreResult<()> {
        let done = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_payment", e))?;
        expect_rows(done.rows_affected(), || format!("payment {id}"))
    }

    async fn insert_allocation(
        &mut self,
        payment: PaymentId,
        invoice: InvoiceId,
        amount: Money,
    ) -> StoreResult<PaymentAllocation> {
        let row = sqlx::query(
            r#"
            INSERT INTO payment_allocations (payment_id, invoice_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id, payment_id, invoice_id, amount
            "#,
        )
        .bind(payment.get())
        .bind(invoice.get())
        .bind(amount.cents())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_allocation", e))?;
        allocation_from_row(&row)
    }

    async fn invoice_allocations(
        &mut self,
        invoice: InvoiceId,
    ) -> StoreResult<Vec<PaymentAllocation>> {
        let rows = sqlx::query(
            "SELECT id, payment_id, invoice_id, amount FROM payment_allocations \
             WHERE invoice_id = $1 ORDER BY id",
        )
        .bind(invoice.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("invoice_allocations", e))?;
        collect(rows, allocation_from_row)
    }

    async fn payment_allocations(
        &mut self,
        payment: PaymentId,
    ) -> StoreResult<Vec<PaymentAllocation>> {
        let rows = sqlx::query(
            "SELECT id, payment_id, invoice_id, amount FROM payment_allocations \
             WHERE payment_id = $1 ORDER BY id",
        )
        .bind(payment.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("payment_allocations", e))?;
        collect(rows, allocation_from_row)
    }

    async fn delete_allocation(&mut self, id: AllocationId) -> StoreResult<()> {
        let done = sqlx::query("DELETE FROM payment_allocations WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_allocation", e))?;
        expect_rows(done.rows_affected(), || format!("allocation {id}"))
    }

    async fn insert_activity(&mut self, entries: &[ActivityEntry]) -> StoreResult<()> {
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO activity_log (actor, action, entity_type, entity_ref, details, occurred_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(actor_uuid(entry.actor))
            .bind(&entry.action)
            .bind(&entry.entity_type)
            .bind(&entry.entity_ref)
            .bind(&entry.details)
            .bind(entry.occurred_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_activity", e))?;
        }
        Ok(())
    }

    async fn recent_activity(&mut self, limit: usize) -> StoreResult<Vec<ActivityEntry>> {
        let rows = sqlx::query(
            "SELECT actor, action, entity_type, entity_ref, details, occurred_at \
             FROM activity_log ORDER BY id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("recent_activity", e))?;
        collect(rows, activity_from_row)
    }
}
