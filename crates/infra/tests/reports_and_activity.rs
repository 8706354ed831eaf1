mod common;

use std::time::Duration;

use bizbooks_core::Money;
use bizbooks_infra::{
    ActivityLogConfig, ActivityLogger, InventoryService, LedgerTx, ReceivablesService, Store,
};
use bizbooks_inventory::NewItem;
use bizbooks_invoicing::InvoiceLineInput;

use common::{Fixture, date, money};

#[tokio::test]
async fn ar_aging_buckets_open_balances_by_days_past_due() {
    let fx = Fixture::new().await;
    let widget = fx.item("W-1").await;
    let other = fx.customer("C002").await;

    for (customer, due, cents) in [
        (fx.customer, date(2026, 4, 1), 1_000),  // not yet due
        (fx.customer, date(2026, 3, 1), 2_000),  // 14 days
        (fx.customer, date(2025, 12, 1), 4_000), // 104 days
        (other, date(2026, 1, 20), 8_000),       // 54 days
    ] {
        let mut request = fx.invoice_request(vec![InvoiceLineInput::new(widget, 1, money(cents))]);
        request.customer_id = customer;
        request.invoice_date = date(2025, 11, 1);
        request.due_date = Some(due);
        fx.receivables.create_invoice(request, None).await.unwrap();
    }

    let aging = fx.reports.ar_aging(date(2026, 3, 15)).await.unwrap();
    assert_eq!(aging.len(), 2);

    let acme = &aging[0];
    assert_eq!(acme.customer_code, "C001");
    assert_eq!(acme.current, money(1_000));
    assert_eq!(acme.days_1_30, money(2_000));
    assert_eq!(acme.over_90, money(4_000));
    assert_eq!(acme.total, money(7_000));

    let second = &aging[1];
    assert_eq!(second.customer_id, other);
    assert_eq!(second.days_31_60, money(8_000));
    assert_eq!(second.total, money(8_000));
}

#[tokio::test]
async fn low_stock_and_valuation_read_cached_figures() {
    let fx = Fixture::new().await;
    let mut reorder = NewItem::new("BOLT", "Bolt");
    reorder.reorder_level = 20;
    let bolt = fx.reference.register_item(reorder).await.unwrap().id;
    let nut = fx.item("NUT").await;

    fx.receive(bolt, fx.main, 10, 30).await;
    fx.receive(bolt, fx.west, 5, 40).await;
    fx.receive(nut, fx.main, 100, 2).await;

    let low = fx.reports.low_stock().await.unwrap();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].id, bolt);

    let valuation = fx.reports.stock_valuation().await.unwrap();
    let bolt_value = valuation.items.iter().find(|v| v.item_id == bolt).unwrap();
    assert_eq!(bolt_value.quantity, 15);
    assert_eq!(bolt_value.unit_cost, Some(money(40)));
    assert_eq!(bolt_value.value, money(600));
    assert_eq!(valuation.total, money(800));
}

#[tokio::test]
async fn dso_divides_receivables_by_period_sales() {
    let fx = Fixture::new().await;
    let widget = fx.item("W-1").await;
    fx.invoice(widget, 1, 9_000).await;

    let dso = fx
        .reports
        .days_sales_outstanding(date(2026, 3, 15), 90)
        .await
        .unwrap();
    assert_eq!(dso.receivables, money(9_000));
    assert_eq!(dso.credit_sales, money(9_000));
    assert_eq!(dso.days, Some(90.0));

    let empty = fx
        .reports
        .days_sales_outstanding(date(2020, 1, 1), 30)
        .await
        .unwrap();
    assert_eq!(empty.days, None);
    assert!(fx.reports.days_sales_outstanding(date(2026, 3, 15), 0).await.is_err());
}

#[tokio::test]
async fn committed_operations_reach_the_activity_log() {
    let fx = Fixture::new().await;
    let config = ActivityLogConfig {
        enabled: true,
        batch_size: 100,
        flush_interval: Duration::from_secs(60),
    };
    let (logger, _writer) = ActivityLogger::spawn(fx.store.clone(), config);
    let ctx = fx.ctx.clone().with_activity(logger.clone());
    let receivables = ReceivablesService::new(ctx.clone());
    let inventory = InventoryService::new(ctx);

    let widget = fx.item("W-1").await;
    let mut line = bizbooks_inventory::StockLine::new(widget, 3);
    line.unit_cost = Some(Money::from_cents(10));
    inventory
        .receive_purchase(
            bizbooks_infra::StockTransfer {
                warehouse_id: None,
                lines: vec![line],
                reference: None,
                movement_date: None,
            },
            None,
        )
        .await
        .unwrap();
    let request = fx.invoice_request(vec![InvoiceLineInput::new(widget, 1, money(500))]);
    let invoice = receivables.create_invoice(request, None).await.unwrap();

    // A rejected operation logs nothing.
    let bad = fx.invoice_request(vec![InvoiceLineInput::new(widget, 0, money(500))]);
    assert!(receivables.create_invoice(bad, None).await.is_err());

    logger.flush().await;
    let mut tx = fx.store.begin().await.unwrap();
    let recent = tx.recent_activity(10).await.unwrap();
    let actions: Vec<_> = recent.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["invoice.created", "stock.purchase_received"]);
    assert_eq!(recent[0].entity_ref, invoice.invoice.invoice_no);
}
