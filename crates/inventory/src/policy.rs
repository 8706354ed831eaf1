//! Warehouse resolution for invoice lines.
//!
//! An invoice must never fail to post for lack of an explicit warehouse. Each
//! line is resolved by trying an ordered list of strategies; the first one that
//! yields a warehouse wins. The final strategy always succeeds, so a sale can
//! land in an under-stocked warehouse and drive its balance negative.

use serde::{Deserialize, Serialize};

use bizbooks_core::WarehouseId;

/// One resolution strategy. Declaration order is the default ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseStrategy {
    /// The warehouse named on the line, if it exists.
    Explicit,
    /// The warehouse holding the most stock, provided it covers the line.
    SufficientStock,
    /// The warehouse holding the most stock, provided it has any.
    AnyPositiveStock,
    /// The warehouse registered under the configured default code.
    DefaultCode,
    /// The configured last-resort warehouse id.
    FallbackId,
}

impl WarehouseStrategy {
    /// Default ranking, tried front to back.
    pub const DEFAULT_ORDER: [WarehouseStrategy; 5] = [
        WarehouseStrategy::Explicit,
        WarehouseStrategy::SufficientStock,
        WarehouseStrategy::AnyPositiveStock,
        WarehouseStrategy::DefaultCode,
        WarehouseStrategy::FallbackId,
    ];

    fn try_resolve(self, candidates: &WarehouseCandidates, required: i64) -> Option<WarehouseId> {
        match self {
            WarehouseStrategy::Explicit => candidates.explicit,
            WarehouseStrategy::SufficientStock => candidates.best_stocked(|q| q >= required),
            WarehouseStrategy::AnyPositiveStock => candidates.best_stocked(|q| q > 0),
            WarehouseStrategy::DefaultCode => candidates.default_warehouse,
            WarehouseStrategy::FallbackId => Some(candidates.fallback),
        }
    }
}

/// Everything the policy may choose from, loaded by the caller for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseCandidates {
    /// Line-level warehouse, already checked to exist.
    pub explicit: Option<WarehouseId>,
    /// Current balances of the item, one entry per warehouse.
    pub balances: Vec<(WarehouseId, i64)>,
    /// Warehouse registered under the default code, if any.
    pub default_warehouse: Option<WarehouseId>,
    pub fallback: WarehouseId,
}

impl WarehouseCandidates {
    /// Highest balance accepted by `accept`; ties go to the lower id.
    fn best_stocked(&self, accept: impl Fn(i64) -> bool) -> Option<WarehouseId> {
        self.balances
            .iter()
            .filter(|(_, qty)| accept(*qty))
            .max_by(|(a_id, a_qty), (b_id, b_qty)| a_qty.cmp(b_qty).then(b_id.cmp(a_id)))
            .map(|(id, _)| *id)
    }

    fn available_in(&self, warehouse: WarehouseId) -> i64 {
        self.balances
            .iter()
            .find(|(id, _)| *id == warehouse)
            .map(|(_, qty)| *qty)
            .unwrap_or(0)
    }
}

/// Outcome of resolving one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseResolution {
    pub warehouse_id: WarehouseId,
    pub strategy: WarehouseStrategy,
    /// Balance in the chosen warehouse before the sale.
    pub available: i64,
}

impl WarehouseResolution {
    pub fn covers(&self, required: i64) -> bool {
        self.available >= required
    }
}

/// Try `order` front to back; falls back to `candidates.fallback` if no
/// strategy in `order` resolves.
pub fn resolve_warehouse(
    order: &[WarehouseStrategy],
    candidates: &WarehouseCandidates,
    required: i64,
) -> WarehouseResolution {
    let (warehouse_id, strategy) = order
        .iter()
        .find_map(|s| s.try_resolve(candidates, required).map(|w| (w, *s)))
        .unwrap_or((candidates.fallback, WarehouseStrategy::FallbackId));

    WarehouseResolution {
        warehouse_id,
        strategy,
        available: candidates.available_in(warehouse_id),
    }
}
