//! Validation rules for the stock-consuming and stock-producing operations.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use bizbooks_core::{DomainError, DomainResult, ItemId, Money, WarehouseId};

/// One line of a purchase receipt, purchase return or direct sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub item_id: ItemId,
    /// Always positive; the operation decides the movement sign.
    pub quantity: i64,
    #[serde(default)]
    pub unit_cost: Option<Money>,
}

impl StockLine {
    pub fn new(item_id: ItemId, quantity: i64) -> Self {
        Self {
            item_id,
            quantity,
            unit_cost: None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "quantity for item {} must be positive",
                self.item_id
            )));
        }
        if let Some(cost) = self.unit_cost {
            if cost.is_negative() {
                return Err(DomainError::validation(format!(
                    "unit cost for item {} cannot be negative",
                    self.item_id
                )));
            }
        }
        Ok(())
    }

    pub fn validate_all(lines: &[StockLine]) -> DomainResult<()> {
        if lines.is_empty() {
            return Err(DomainError::validation("at least one line is required"));
        }
        lines.iter().try_for_each(StockLine::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionInput {
    pub item_id: ItemId,
    pub quantity: i64,
}

/// Consume N input items from raw materials, produce one output item into
/// finished goods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub output_item: ItemId,
    pub output_quantity: i64,
    pub inputs: Vec<ProductionInput>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ProductionOrder {
    pub fn validate(&self) -> DomainResult<()> {
        if self.output_quantity <= 0 {
            return Err(DomainError::validation("output quantity must be positive"));
        }
        if self.inputs.is_empty() {
            return Err(DomainError::validation(
                "production requires at least one input item",
            ));
        }

        let mut seen = HashSet::new();
        for input in &self.inputs {
            if input.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "input quantity for item {} must be positive",
                    input.item_id
                )));
            }
            if input.item_id == self.output_item {
                return Err(DomainError::validation(
                    "output item cannot be consumed as its own input",
                ));
            }
            if !seen.insert(input.item_id) {
                return Err(DomainError::validation(format!(
                    "input item {} listed more than once",
                    input.item_id
                )));
            }
        }
        Ok(())
    }
}

/// Availability gate used by paths that refuse to go negative.
pub fn ensure_available(
    item: ItemId,
    warehouse: WarehouseId,
    available: i64,
    required: i64,
) -> DomainResult<()> {
    if available < required {
        return Err(DomainError::insufficient_stock(
            item, warehouse, available, required,
        ));
    }
    Ok(())
}
