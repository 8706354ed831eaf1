//! Stock operations outside invoicing: purchase receipts and returns, direct
//! sales, manual adjustments and production runs.
//!
//! Each operation validates its lines, posts one movement per line through
//! the stock ledger inside a single transaction, and logs one activity entry
//! once that transaction has committed.

mod production;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use bizbooks_core::{ItemId, UserId, WarehouseId};
use bizbooks_inventory::{
    MovementType, NewStockMovement, StockBalance, StockLine, StockMovement, Warehouse,
    ensure_available,
};

use crate::activity_log::ActivityEntry;
use crate::context::LedgerContext;
use crate::error::{LedgerError, LedgerResult};
use crate::numbering::{DocumentType, next_document_number};
use crate::stock_ledger::{RecordedMovement, available_quantity, item_ledger, record_movement};
use crate::store::{LedgerTx, Store};

pub use production::{ProductionRun, RunProduction};

const RECEIPT_DOCTYPE: &str = "GOODS_RECEIPT";
const PURCHASE_RETURN_DOCTYPE: &str = "PURCHASE_RETURN";
const SALE_DOCTYPE: &str = "SALE";
const ADJUSTMENT_DOCTYPE: &str = "ADJUSTMENT";

/// Lines moved in or out of one warehouse.
///
/// Without a warehouse the configured default warehouse is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransfer {
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    pub lines: Vec<StockLine>,
    /// Supplier delivery note, return note or sale reference.
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub movement_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    /// Signed; zero is rejected.
    pub quantity: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub movement_date: Option<NaiveDate>,
}

/// Outcome of a multi-line stock operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOperation {
    /// Document number assigned to the operation, or the caller's reference.
    pub document_no: String,
    pub warehouse_id: WarehouseId,
    pub movements: Vec<RecordedMovement>,
}

/// Inventory operations over one store.
pub struct InventoryService<S: Store> {
    ctx: LedgerContext<S>,
}

impl<S: Store> Clone for InventoryService<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

async fn warehouse_or_default<T: LedgerTx>(
    tx: &mut T,
    explicit: Option<WarehouseId>,
    default_code: &str,
) -> LedgerResult<Warehouse> {
    let found = match explicit {
        Some(id) => tx.warehouse(id).await?,
        None => tx.warehouse_by_code(default_code).await?,
    };
    found.ok_or_else(|| match explicit {
        Some(id) => LedgerError::not_found(format!("warehouse {id}")),
        None => LedgerError::not_found(format!("warehouse with code {default_code}")),
    })
}

pub(crate) async fn warehouse_by_code<T: LedgerTx>(tx: &mut T, code: &str) -> LedgerResult<Warehouse> {
    tx.warehouse_by_code(code)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("warehouse with code {code}")))
}

pub(crate) async fn ensure_item<T: LedgerTx>(tx: &mut T, item: ItemId) -> LedgerResult<()> {
    if tx.item(item).await?.is_none() {
        return Err(LedgerError::not_found(format!("item {item}")));
    }
    Ok(())
}

/// Reference stamped on every movement of one operation.
pub(crate) struct Posting<'a> {
    pub movement_type: MovementType,
    pub doctype: &'a str,
    pub docno: &'a str,
    pub date: NaiveDate,
    pub actor: Option<UserId>,
}

impl Posting<'_> {
    pub fn movement(&self, item: ItemId, warehouse: WarehouseId, quantity: i64) -> NewStockMovement {
        NewStockMovement::new(item, warehouse, self.movement_type, quantity, self.date)
            .with_reference(self.doctype, self.docno)
            .created_by(self.actor)
    }
}

/// Check-then-write for each outbound line, in order.
///
/// Repeated items see the balance left by the earlier line.
async fn post_outbound<T: LedgerTx>(
    tx: &mut T,
    warehouse: WarehouseId,
    lines: &[StockLine],
    posting: &Posting<'_>,
) -> LedgerResult<Vec<RecordedMovement>> {
    let mut posted = Vec::with_capacity(lines.len());
    for line in lines {
        let available = available_quantity(tx, line.item_id, warehouse).await?;
        ensure_available(line.item_id, warehouse, available, line.quantity)?;
        let movement = posting
            .movement(line.item_id, warehouse, -line.quantity)
            .with_unit_cost(line.unit_cost);
        posted.push(record_movement(tx, &movement).await?);
    }
    Ok(posted)
}

impl<S: Store> InventoryService<S> {
    pub fn new(ctx: LedgerContext<S>) -> Self {
        Self { ctx }
    }

    async fn prepare(
        &self,
        tx: &mut S::Tx,
        request: &StockTransfer,
    ) -> LedgerResult<Warehouse> {
        StockLine::validate_all(&request.lines)?;
        let warehouse = warehouse_or_default(
            tx,
            request.warehouse_id,
            &self.ctx.config.default_warehouse_code,
        )
        .await?;
        for line in &request.lines {
            ensure_item(tx, line.item_id).await?;
        }
        Ok(warehouse)
    }

    /// Receive purchased goods: one positive PURCHASE movement per line,
    /// under a fresh `GR` number.
    #[instrument(skip(self, request), fields(lines = request.lines.len()), err)]
    pub async fn receive_purchase(
        &self,
        request: StockTransfer,
        actor: Option<UserId>,
    ) -> LedgerResult<StockOperation> {
        let date = request.movement_date.unwrap_or_else(|| self.ctx.today());
        let mut tx = self.ctx.begin().await?;
        let warehouse = self.prepare(&mut tx, &request).await?;

        let receipt_no =
            next_document_number(&mut tx, DocumentType::GoodsReceipt, date.year()).await?;
        let mut movements = Vec::with_capacity(request.lines.len());
        let posting = Posting {
            movement_type: MovementType::Purchase,
            doctype: RECEIPT_DOCTYPE,
            docno: &receipt_no,
            date,
            actor,
        };
        for line in &request.lines {
            let movement = posting
                .movement(line.item_id, warehouse.id, line.quantity)
                .with_unit_cost(line.unit_cost);
            movements.push(record_movement(&mut tx, &movement).await?);
        }
        tx.commit().await?;

        info!(
            receipt_no = %receipt_no,
            warehouse = %warehouse.code,
            lines = movements.len(),
            "purchase received"
        );
        self.ctx.activity.record(
            ActivityEntry::new(actor, "stock.purchase_received", "goods_receipt", receipt_no.as_str())
                .with_details(json!({
                    "warehouse_id": warehouse.id,
                    "supplier_ref": request.reference,
                    "lines": request.lines.len(),
                })),
        );
        Ok(StockOperation {
            document_no: receipt_no,
            warehouse_id: warehouse.id,
            movements,
        })
    }

    /// Send purchased goods back to the supplier. Refuses to go negative.
    #[instrument(skip(self, request), fields(lines = request.lines.len()), err)]
    pub async fn return_purchase(
        &self,
        request: StockTransfer,
        actor: Option<UserId>,
    ) -> LedgerResult<StockOperation> {
        let date = request.movement_date.unwrap_or_else(|| self.ctx.today());
        let mut tx = self.ctx.begin().await?;
        let warehouse = self.prepare(&mut tx, &request).await?;

        let return_no = next_document_number(&mut tx, DocumentType::Purchase, date.year()).await?;
        let posting = Posting {
            movement_type: MovementType::Purchase,
            doctype: PURCHASE_RETURN_DOCTYPE,
            docno: &return_no,
            date,
            actor,
        };
        let movements = post_outbound(&mut tx, warehouse.id, &request.lines, &posting).await?;
        tx.commit().await?;

        info!(return_no = %return_no, warehouse = %warehouse.code, "purchase returned");
        self.ctx.activity.record(
            ActivityEntry::new(actor, "stock.purchase_returned", "purchase_return", return_no.as_str())
                .with_details(json!({
                    "warehouse_id": warehouse.id,
                    "reference": request.reference,
                    "lines": request.lines.len(),
                })),
        );
        Ok(StockOperation {
            document_no: return_no,
            warehouse_id: warehouse.id,
            movements,
        })
    }

    /// Direct sale outside invoicing. Unlike invoices, refuses to go negative.
    #[instrument(skip(self, request), fields(lines = request.lines.len()), err)]
    pub async fn record_sale(
        &self,
        request: StockTransfer,
        actor: Option<UserId>,
    ) -> LedgerResult<StockOperation> {
        let reference = request
            .reference
            .clone()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| LedgerError::validation("a sale reference is required"))?;
        let date = request.movement_date.unwrap_or_else(|| self.ctx.today());
        let mut tx = self.ctx.begin().await?;
        let warehouse = self.prepare(&mut tx, &request).await?;

        let posting = Posting {
            movement_type: MovementType::Sale,
            doctype: SALE_DOCTYPE,
            docno: &reference,
            date,
            actor,
        };
        let movements = post_outbound(&mut tx, warehouse.id, &request.lines, &posting).await?;
        tx.commit().await?;

        info!(reference = %reference, warehouse = %warehouse.code, "sale recorded");
        self.ctx.activity.record(
            ActivityEntry::new(actor, "stock.sale_recorded", "sale", reference.as_str()).with_details(
                json!({ "warehouse_id": warehouse.id, "lines": request.lines.len() }),
            ),
        );
        Ok(StockOperation {
            document_no: reference,
            warehouse_id: warehouse.id,
            movements,
        })
    }

    /// Manual correction of one (item, warehouse) balance.
    ///
    /// Adjustments may take a balance negative.
    #[instrument(
        skip(self, request),
        fields(item_id = %request.item_id, warehouse_id = %request.warehouse_id, quantity = request.quantity),
        err
    )]
    pub async fn adjust_stock(
        &self,
        request: AdjustStock,
        actor: Option<UserId>,
    ) -> LedgerResult<RecordedMovement> {
        if request.quantity == 0 {
            return Err(LedgerError::validation("adjustment quantity cannot be zero"));
        }
        let date = request.movement_date.unwrap_or_else(|| self.ctx.today());
        let mut tx = self.ctx.begin().await?;
        ensure_item(&mut tx, request.item_id).await?;
        if tx.warehouse(request.warehouse_id).await?.is_none() {
            return Err(LedgerError::not_found(format!(
                "warehouse {}",
                request.warehouse_id
            )));
        }

        let reason = request.reason.clone().unwrap_or_default();
        let movement = Posting {
            movement_type: MovementType::Adjustment,
            doctype: ADJUSTMENT_DOCTYPE,
            docno: &reason,
            date,
            actor,
        }
        .movement(request.item_id, request.warehouse_id, request.quantity);
        let recorded = record_movement(&mut tx, &movement).await?;
        tx.commit().await?;

        info!(
            movement_no = %recorded.movement_no,
            balance_after = recorded.balance_after,
            "stock adjusted"
        );
        self.ctx.activity.record(
            ActivityEntry::new(actor, "stock.adjusted", "stock_movement", recorded.movement_no.as_str())
                .with_details(json!({
                    "item_id": request.item_id,
                    "warehouse_id": request.warehouse_id,
                    "quantity": request.quantity,
                    "reason": reason,
                })),
        );
        Ok(recorded)
    }

    /// Movements of an item, newest first.
    pub async fn item_ledger(
        &self,
        item: ItemId,
        warehouse: Option<WarehouseId>,
    ) -> LedgerResult<Vec<StockMovement>> {
        let mut tx = self.ctx.begin().await?;
        item_ledger(&mut tx, item, warehouse).await
    }

    /// Per-warehouse balances of an item.
    pub async fn item_balances(&self, item: ItemId) -> LedgerResult<Vec<StockBalance>> {
        let mut tx = self.ctx.begin().await?;
        ensure_item(&mut tx, item).await?;
        Ok(tx.item_balances(item).await?)
    }
}
