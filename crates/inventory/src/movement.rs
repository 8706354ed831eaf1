use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use bizbooks_core::{DomainError, Entity, ItemId, Money, MovementId, UserId, WarehouseId};

/// Kind of stock movement. The quantity sign, not the type, encodes direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Purchase,
    Sale,
    Production,
    Adjustment,
}

impl MovementType {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementType::Purchase => "PURCHASE",
            MovementType::Sale => "SALE",
            MovementType::Production => "PRODUCTION",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }
}

impl core::fmt::Display for MovementType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PURCHASE" => Ok(MovementType::Purchase),
            "SALE" => Ok(MovementType::Sale),
            "PRODUCTION" => Ok(MovementType::Production),
            "ADJUSTMENT" => Ok(MovementType::Adjustment),
            other => Err(DomainError::validation(format!(
                "unknown movement type '{other}'"
            ))),
        }
    }
}

/// Immutable stock fact. Positive quantity = stock in, negative = stock out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    /// `STK-{year}-{seq}`.
    pub movement_no: String,
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub unit_cost: Option<Money>,
    pub reference_doctype: String,
    pub reference_docno: String,
    pub movement_date: NaiveDate,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> MovementId {
        self.id
    }
}

impl StockMovement {
    pub fn is_inbound(&self) -> bool {
        self.quantity > 0
    }
}

/// A movement about to be recorded (the ledger assigns id and number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockMovement {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub movement_type: MovementType,
    pub quantity: i64,
    pub unit_cost: Option<Money>,
    pub reference_doctype: String,
    pub reference_docno: String,
    pub movement_date: NaiveDate,
    pub created_by: Option<UserId>,
}

impl NewStockMovement {
    pub fn new(
        item_id: ItemId,
        warehouse_id: WarehouseId,
        movement_type: MovementType,
        quantity: i64,
        movement_date: NaiveDate,
    ) -> Self {
        Self {
            item_id,
            warehouse_id,
            movement_type,
            quantity,
            unit_cost: None,
            reference_doctype: String::new(),
            reference_docno: String::new(),
            movement_date,
            created_by: None,
        }
    }

    pub fn with_reference(mut self, doctype: impl Into<String>, docno: impl Into<String>) -> Self {
        self.reference_doctype = doctype.into();
        self.reference_docno = docno.into();
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: Option<Money>) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    pub fn created_by(mut self, actor: Option<UserId>) -> Self {
        self.created_by = actor;
        self
    }
}

/// Cached quantity of one item in one warehouse.
///
/// Invariant: `quantity == SUM(movements.quantity)` for the pair after every
/// committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

impl Entity for StockBalance {
    type Id = (ItemId, WarehouseId);

    fn id(&self) -> (ItemId, WarehouseId) {
        (self.item_id, self.warehouse_id)
    }
}
