use serde::{Deserialize, Serialize};

use bizbooks_core::{DomainError, DomainResult, Entity, ItemId, WarehouseId};

/// Stock-keeping item.
///
/// `current_stock` is a cache of the sum of all stock balance rows for the
/// item. Only the stock ledger writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub code: String,
    pub name: String,
    pub unit: String,
    pub current_stock: i64,
    /// Threshold for the low-stock report.
    pub reorder_level: i64,
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }
}

impl Item {
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.reorder_level
    }
}

/// Reference data needed to register an item (created outside the core).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub code: String,
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub reorder_level: i64,
}

impl NewItem {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            unit: "pcs".to_string(),
            reorder_level: 0,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.code.trim().is_empty() {
            return Err(DomainError::validation("item code cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("item name cannot be empty"));
        }
        Ok(())
    }
}

/// Warehouse: pure reference entity, one half of the stock balance key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub code: String,
    pub name: String,
}

impl Entity for Warehouse {
    type Id = WarehouseId;

    fn id(&self) -> WarehouseId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub code: String,
    pub name: String,
}

impl NewWarehouse {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.code.trim().is_empty() {
            return Err(DomainError::validation("warehouse code cannot be empty"));
        }
        Ok(())
    }
}
