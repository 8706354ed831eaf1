//! Stock ledger: the only writer of stock movements, stock balances and
//! `items.current_stock`.
//!
//! Every movement updates its (item, warehouse) balance in the same
//! transaction, then re-derives the item's cached total from all of its
//! balances. Nothing here checks availability; callers that must not go
//! negative check first.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use bizbooks_core::{ItemId, MovementId, WarehouseId};
use bizbooks_inventory::{
    NewStockMovement, StockMovement, WarehouseCandidates, WarehouseResolution, resolve_warehouse,
};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::numbering::{DocumentType, next_document_number};
use crate::store::LedgerTx;

/// Result of posting one movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMovement {
    pub movement_id: MovementId,
    pub movement_no: String,
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    /// Balance of the (item, warehouse) pair after the movement.
    pub balance_after: i64,
    /// `items.current_stock` after the movement.
    pub item_stock_after: i64,
}

/// Append a movement and bring the balance and item caches in line with it.
///
/// The quantity is taken as given, zero included; operations validate their
/// own quantities. An unknown item or warehouse surfaces as a foreign-key
/// store error.
#[instrument(
    skip(tx, movement),
    fields(
        item_id = %movement.item_id,
        warehouse_id = %movement.warehouse_id,
        movement_type = %movement.movement_type,
        quantity = movement.quantity
    ),
    err
)]
pub async fn record_movement<T: LedgerTx>(
    tx: &mut T,
    movement: &NewStockMovement,
) -> LedgerResult<RecordedMovement> {
    let year = movement.movement_date.year();
    let movement_no = next_document_number(tx, DocumentType::StockMovement, year).await?;
    let stored = tx.insert_movement(&movement_no, movement).await?;

    let balance_after = match tx.stock_balance(movement.item_id, movement.warehouse_id).await? {
        Some(current) => {
            let next = current.quantity + movement.quantity;
            tx.set_stock_balance(movement.item_id, movement.warehouse_id, next)
                .await?;
            next
        }
        None => {
            tx.insert_stock_balance(movement.item_id, movement.warehouse_id, movement.quantity)
                .await?;
            movement.quantity
        }
    };
    if balance_after < 0 {
        warn!(
            movement_no = %movement_no,
            balance_after,
            "stock balance went negative"
        );
    }

    let item_stock_after = resync_item_stock(tx, movement.item_id).await?;

    debug!(movement_no = %movement_no, balance_after, item_stock_after, "movement recorded");
    Ok(RecordedMovement {
        movement_id: stored.id,
        movement_no,
        item_id: movement.item_id,
        warehouse_id: movement.warehouse_id,
        quantity: movement.quantity,
        balance_after,
        item_stock_after,
    })
}

/// Recompute `items.current_stock` as the sum of the item's balances.
pub async fn resync_item_stock<T: LedgerTx>(tx: &mut T, item: ItemId) -> LedgerResult<i64> {
    let total: i64 = tx
        .item_balances(item)
        .await?
        .iter()
        .map(|b| b.quantity)
        .sum();
    tx.set_item_current_stock(item, total).await?;
    Ok(total)
}

/// Quantity on hand for one (item, warehouse) pair; zero when no balance row exists.
pub async fn available_quantity<T: LedgerTx>(
    tx: &mut T,
    item: ItemId,
    warehouse: WarehouseId,
) -> LedgerResult<i64> {
    Ok(tx
        .stock_balance(item, warehouse)
        .await?
        .map(|b| b.quantity)
        .unwrap_or(0))
}

/// Movements of an item, newest first, optionally limited to one warehouse.
pub async fn item_ledger<T: LedgerTx>(
    tx: &mut T,
    item: ItemId,
    warehouse: Option<WarehouseId>,
) -> LedgerResult<Vec<StockMovement>> {
    if tx.item(item).await?.is_none() {
        return Err(LedgerError::not_found(format!("item {item}")));
    }
    Ok(tx.movements(item, warehouse).await?)
}

/// Pick the warehouse a sale line draws from.
///
/// `explicit` must already be known to exist. Always resolves; the chosen
/// warehouse may not cover `required`, in which case the sale drives it
/// negative.
pub async fn resolve_sale_warehouse<T: LedgerTx>(
    tx: &mut T,
    config: &LedgerConfig,
    item: ItemId,
    explicit: Option<WarehouseId>,
    required: i64,
) -> LedgerResult<WarehouseResolution> {
    let balances = tx
        .item_balances(item)
        .await?
        .into_iter()
        .map(|b| (b.warehouse_id, b.quantity))
        .collect();
    let default_warehouse = tx
        .warehouse_by_code(&config.default_warehouse_code)
        .await?
        .map(|w| w.id);

    let candidates = WarehouseCandidates {
        explicit,
        balances,
        default_warehouse,
        fallback: config.fallback_warehouse_id,
    };
    let resolution = resolve_warehouse(&config.warehouse_strategies, &candidates, required);

    debug!(
        item_id = %item,
        warehouse_id = %resolution.warehouse_id,
        strategy = ?resolution.strategy,
        available = resolution.available,
        required,
        "sale warehouse resolved"
    );
    if !resolution.covers(required) {
        warn!(
            item_id = %item,
            warehouse_id = %resolution.warehouse_id,
            available = resolution.available,
            required,
            "sale exceeds stock on hand; balance will go negative"
        );
    }
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::StoreError;
    use crate::store::{InMemoryStore, Store};
    use bizbooks_inventory::{MovementType, NewItem, NewWarehouse};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()
    }

    async fn seeded() -> (InMemoryStore, ItemId, WarehouseId) {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let wh = tx
            .insert_warehouse(&NewWarehouse::new("MAIN", "Main"))
            .await
            .unwrap();
        let item = tx
            .insert_item(&NewItem::new("SKU-1", "Widget"))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        (store, item.id, wh.id)
    }

    #[tokio::test]
    async fn first_movement_creates_the_balance_row() {
        let (store, item, wh) = seeded().await;
        let mut tx = store.begin().await.unwrap();

        let m = NewStockMovement::new(item, wh, MovementType::Purchase, 10, date());
        let recorded = record_movement(&mut tx, &m).await.unwrap();

        assert_eq!(recorded.movement_no, "STK-2026-00001");
        assert_eq!(recorded.balance_after, 10);
        assert_eq!(recorded.item_stock_after, 10);
        assert_eq!(tx.item(item).await.unwrap().unwrap().current_stock, 10);
    }

    #[tokio::test]
    async fn zero_quantity_is_posted_as_given() {
        let (store, item, wh) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let m = NewStockMovement::new(item, wh, MovementType::Adjustment, 0, date());
        let recorded = record_movement(&mut tx, &m).await.unwrap();
        assert_eq!(recorded.quantity, 0);
        assert_eq!(recorded.balance_after, 0);
        assert_eq!(tx.movements(item, Some(wh)).await.unwrap().len(), 1);
        assert!(tx.stock_balance(item, wh).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unknown_warehouse_is_a_foreign_key_error() {
        let (store, item, _) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let m = NewStockMovement::new(item, WarehouseId::new(42), MovementType::Purchase, 1, date());
        assert!(matches!(
            record_movement(&mut tx, &m).await,
            Err(LedgerError::Store(StoreError::ForeignKeyViolation(_)))
        ));
    }

    #[tokio::test]
    async fn resolution_prefers_the_best_stocked_warehouse() {
        let (store, item, main) = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let second = tx
            .insert_warehouse(&NewWarehouse::new("WEST", "West"))
            .await
            .unwrap()
            .id;
        record_movement(
            &mut tx,
            &NewStockMovement::new(item, main, MovementType::Purchase, 3, date()),
        )
        .await
        .unwrap();
        record_movement(
            &mut tx,
            &NewStockMovement::new(item, second, MovementType::Purchase, 8, date()),
        )
        .await
        .unwrap();

        let cfg = LedgerConfig::default();
        let r = resolve_sale_warehouse(&mut tx, &cfg, item, None, 5).await.unwrap();
        assert_eq!(r.warehouse_id, second);
        assert!(r.covers(5));
    }
}
