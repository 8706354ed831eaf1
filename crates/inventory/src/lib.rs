//! Inventory domain module.
//!
//! Items, warehouses, the append-only stock movement record and the cached
//! per-warehouse stock balance, plus the pure rules the stock ledger relies
//! on (warehouse resolution, stock-line and production validation). No IO.

pub mod item;
pub mod movement;
pub mod policy;
pub mod production;

pub use item::{Item, NewItem, NewWarehouse, Warehouse};
pub use movement::{MovementType, NewStockMovement, StockBalance, StockMovement};
pub use policy::{WarehouseCandidates, WarehouseResolution, WarehouseStrategy, resolve_warehouse};
pub use production::{ProductionInput, ProductionOrder, StockLine, ensure_available};
