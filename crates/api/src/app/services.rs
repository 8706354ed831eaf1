//! Service wiring shared by every route.

use tracing::info;

use bizbooks_core::Money;
use bizbooks_infra::{
    InventoryService, LedgerContext, LedgerResult, ReceivablesService, ReferenceData,
    ReportingService, Store, StockTransfer,
};
use bizbooks_inventory::{NewItem, NewWarehouse, StockLine};
use bizbooks_parties::NewCustomer;

pub struct AppServices<S: Store> {
    pub ctx: LedgerContext<S>,
    pub receivables: ReceivablesService<S>,
    pub inventory: InventoryService<S>,
    pub reports: ReportingService<S>,
    pub reference: ReferenceData<S>,
}

impl<S: Store> AppServices<S> {
    pub fn new(ctx: LedgerContext<S>) -> Self {
        Self {
            receivables: ReceivablesService::new(ctx.clone()),
            inventory: InventoryService::new(ctx.clone()),
            reports: ReportingService::new(ctx.clone()),
            reference: ReferenceData::new(ctx.clone()),
            ctx,
        }
    }
}

/// Populate an empty store with the configured warehouses, a few items, a
/// customer and some opening stock. Does nothing once any customer exists.
pub async fn seed_demo_data<S: Store>(services: &AppServices<S>) -> LedgerResult<bool> {
    if !services.reference.customers().await?.is_empty() {
        return Ok(false);
    }

    let config = &services.ctx.config;
    let main = services
        .reference
        .register_warehouse(NewWarehouse::new(config.default_warehouse_code.as_str(), "Main store"))
        .await?;
    let raw = services
        .reference
        .register_warehouse(NewWarehouse::new(
            config.raw_materials_warehouse_code.as_str(),
            "Raw materials",
        ))
        .await?;
    services
        .reference
        .register_warehouse(NewWarehouse::new(
            config.finished_goods_warehouse_code.as_str(),
            "Finished goods",
        ))
        .await?;

    let mut widget = NewItem::new("WIDGET", "Widget");
    widget.reorder_level = 10;
    let widget = services.reference.register_item(widget).await?;
    let steel = services
        .reference
        .register_item(NewItem::new("STEEL", "Steel sheet"))
        .await?;
    services
        .reference
        .register_item(NewItem::new("FRAME", "Steel frame"))
        .await?;
    services
        .reference
        .register_customer(NewCustomer::new("C001", "Demo Customer"))
        .await?;

    for (warehouse, item, quantity, cents) in
        [(main.id, widget.id, 100, 450), (raw.id, steel.id, 50, 1_200)]
    {
        let mut line = StockLine::new(item, quantity);
        line.unit_cost = Some(Money::from_cents(cents));
        services
            .inventory
            .receive_purchase(
                StockTransfer {
                    warehouse_id: Some(warehouse),
                    lines: vec![line],
                    reference: Some("OPENING".to_string()),
                    movement_date: None,
                },
                None,
            )
            .await?;
    }

    info!("demo data seeded");
    Ok(true)
}
