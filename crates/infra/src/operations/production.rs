use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};

use bizbooks_core::{UserId, WarehouseId};
use bizbooks_inventory::{MovementType, ProductionOrder, ensure_available};

use super::{InventoryService, Posting, ensure_item, warehouse_by_code};
use crate::activity_log::ActivityEntry;
use crate::error::LedgerResult;
use crate::numbering::{DocumentType, next_document_number};
use crate::stock_ledger::{RecordedMovement, available_quantity, record_movement};
use crate::store::{LedgerTx, Store};

const PRODUCTION_DOCTYPE: &str = "PRODUCTION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunProduction {
    #[serde(flatten)]
    pub order: ProductionOrder,
    #[serde(default)]
    pub production_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionRun {
    pub production_no: String,
    pub raw_materials_warehouse: WarehouseId,
    pub finished_goods_warehouse: WarehouseId,
    pub consumed: Vec<RecordedMovement>,
    pub produced: RecordedMovement,
}

impl<S: Store> InventoryService<S> {
    /// Consume the inputs from the raw-materials warehouse and put the
    /// output into finished goods, all in one transaction.
    ///
    /// Each input is checked against its balance just before it is written;
    /// the first shortage abandons the transaction and with it every
    /// movement already posted for the run.
    #[instrument(
        skip(self, request),
        fields(output_item = %request.order.output_item, inputs = request.order.inputs.len()),
        err
    )]
    pub async fn run_production(
        &self,
        request: RunProduction,
        actor: Option<UserId>,
    ) -> LedgerResult<ProductionRun> {
        let order = &request.order;
        order.validate()?;
        let date = request.production_date.unwrap_or_else(|| self.ctx.today());

        let mut tx = self.ctx.begin().await?;
        let raw = warehouse_by_code(&mut tx, &self.ctx.config.raw_materials_warehouse_code).await?;
        let finished =
            warehouse_by_code(&mut tx, &self.ctx.config.finished_goods_warehouse_code).await?;
        ensure_item(&mut tx, order.output_item).await?;
        for input in &order.inputs {
            ensure_item(&mut tx, input.item_id).await?;
        }

        let production_no =
            next_document_number(&mut tx, DocumentType::Production, date.year()).await?;
        let posting = Posting {
            movement_type: MovementType::Production,
            doctype: PRODUCTION_DOCTYPE,
            docno: &production_no,
            date,
            actor,
        };

        let mut consumed = Vec::with_capacity(order.inputs.len());
        for input in &order.inputs {
            let available = available_quantity(&mut tx, input.item_id, raw.id).await?;
            ensure_available(input.item_id, raw.id, available, input.quantity)?;
            let movement = posting.movement(input.item_id, raw.id, -input.quantity);
            consumed.push(record_movement(&mut tx, &movement).await?);
            debug!(item_id = %input.item_id, quantity = input.quantity, "input consumed");
        }

        let movement = posting.movement(order.output_item, finished.id, order.output_quantity);
        let produced = record_movement(&mut tx, &movement).await?;
        tx.commit().await?;

        info!(
            production_no = %production_no,
            output_item = %order.output_item,
            output_quantity = order.output_quantity,
            inputs = consumed.len(),
            "production completed"
        );
        self.ctx.activity.record(
            ActivityEntry::new(actor, "stock.production", "production", production_no.as_str())
                .with_details(json!({
                    "output_item": order.output_item,
                    "output_quantity": order.output_quantity,
                    "inputs": order.inputs,
                    "notes": order.notes,
                })),
        );
        Ok(ProductionRun {
            production_no,
            raw_materials_warehouse: raw.id,
            finished_goods_warehouse: finished.id,
            consumed,
            produced,
        })
    }
}
