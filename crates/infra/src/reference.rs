//! Registration of the reference rows the ledger points at.

use tracing::{info, instrument};

use bizbooks_core::{CustomerId, ItemId};
use bizbooks_inventory::{Item, NewItem, NewWarehouse, Warehouse};
use bizbooks_parties::{Customer, NewCustomer};

use crate::context::LedgerContext;
use crate::error::{LedgerError, LedgerResult, StoreError};
use crate::store::{LedgerTx, Store};

/// Turn a duplicate-code store error into a domain conflict.
fn duplicate_as_conflict(err: StoreError) -> LedgerError {
    match err {
        StoreError::UniqueViolation(what) => LedgerError::conflict(what),
        other => other.into(),
    }
}

pub struct ReferenceData<S: Store> {
    ctx: LedgerContext<S>,
}

impl<S: Store> Clone for ReferenceData<S> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
        }
    }
}

impl<S: Store> ReferenceData<S> {
    pub fn new(ctx: LedgerContext<S>) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, item), fields(code = %item.code), err)]
    pub async fn register_item(&self, item: NewItem) -> LedgerResult<Item> {
        item.validate()?;
        if item.reorder_level < 0 {
            return Err(LedgerError::validation("reorder level cannot be negative"));
        }
        let mut tx = self.ctx.begin().await?;
        let stored = tx.insert_item(&item).await.map_err(duplicate_as_conflict)?;
        tx.commit().await?;
        info!(item_id = %stored.id, code = %stored.code, "item registered");
        Ok(stored)
    }

    #[instrument(skip(self, warehouse), fields(code = %warehouse.code), err)]
    pub async fn register_warehouse(&self, warehouse: NewWarehouse) -> LedgerResult<Warehouse> {
        warehouse.validate()?;
        let mut tx = self.ctx.begin().await?;
        let stored = tx
            .insert_warehouse(&warehouse)
            .await
            .map_err(duplicate_as_conflict)?;
        tx.commit().await?;
        info!(warehouse_id = %stored.id, code = %stored.code, "warehouse registered");
        Ok(stored)
    }

    #[instrument(skip(self, customer), fields(code = %customer.code), err)]
    pub async fn register_customer(&self, customer: NewCustomer) -> LedgerResult<Customer> {
        customer.validate()?;
        let mut tx = self.ctx.begin().await?;
        let stored = tx
            .insert_customer(&customer)
            .await
            .map_err(duplicate_as_conflict)?;
        tx.commit().await?;
        info!(customer_id = %stored.id, code = %stored.code, "customer registered");
        Ok(stored)
    }

    pub async fn item(&self, id: ItemId) -> LedgerResult<Item> {
        let mut tx = self.ctx.begin().await?;
        tx.item(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("item {id}")))
    }

    pub async fn items(&self) -> LedgerResult<Vec<Item>> {
        let mut tx = self.ctx.begin().await?;
        Ok(tx.items().await?)
    }

    pub async fn customer(&self, id: CustomerId) -> LedgerResult<Customer> {
        let mut tx = self.ctx.begin().await?;
        tx.customer(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("customer {id}")))
    }

    pub async fn customers(&self) -> LedgerResult<Vec<Customer>> {
        let mut tx = self.ctx.begin().await?;
        Ok(tx.customers().await?)
    }
}
