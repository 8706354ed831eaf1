mod common;

use bizbooks_core::{DomainError, ItemId, WarehouseId};
use bizbooks_infra::{AdjustStock, LedgerError, LedgerTx, RunProduction, Store, StockTransfer};
use bizbooks_inventory::{MovementType, ProductionInput, ProductionOrder, StockLine};

use common::{Fixture, money, today};

fn transfer(warehouse: Option<WarehouseId>, lines: Vec<StockLine>, reference: &str) -> StockTransfer {
    StockTransfer {
        warehouse_id: warehouse,
        lines,
        reference: Some(reference.to_string()),
        movement_date: Some(today()),
    }
}

fn production(output: ItemId, quantity: i64, inputs: &[(ItemId, i64)]) -> RunProduction {
    RunProduction {
        order: ProductionOrder {
            output_item: output,
            output_quantity: quantity,
            inputs: inputs
                .iter()
                .map(|&(item_id, quantity)| ProductionInput { item_id, quantity })
                .collect(),
            notes: None,
        },
        production_date: Some(today()),
    }
}

#[tokio::test]
async fn receipt_posts_one_purchase_per_line_under_a_gr_number() {
    let fx = Fixture::new().await;
    let bolt = fx.item("BOLT").await;
    let nut = fx.item("NUT").await;

    let mut costed = StockLine::new(bolt, 100);
    costed.unit_cost = Some(money(25));
    let receipt = fx
        .inventory
        .receive_purchase(
            transfer(None, vec![costed, StockLine::new(nut, 40)], "SUP-77"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(receipt.document_no, "GR-2026-00001");
    assert_eq!(receipt.warehouse_id, fx.main);
    assert_eq!(receipt.movements.len(), 2);
    assert_eq!(fx.stock(bolt, fx.main).await, 100);
    assert_eq!(fx.current_stock(nut).await, 40);

    let ledger = fx.inventory.item_ledger(bolt, None).await.unwrap();
    assert_eq!(ledger[0].movement_type, MovementType::Purchase);
    assert_eq!(ledger[0].unit_cost, Some(money(25)));
    assert_eq!(ledger[0].reference_docno, "GR-2026-00001");
    fx.assert_consistent().await;
}

#[tokio::test]
async fn non_positive_lines_are_rejected() {
    let fx = Fixture::new().await;
    let bolt = fx.item("BOLT").await;
    let err = fx
        .inventory
        .receive_purchase(transfer(None, vec![StockLine::new(bolt, 0)], "X"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Domain(DomainError::Validation(_))));
}

#[tokio::test]
async fn purchase_return_and_direct_sale_refuse_to_go_negative() {
    let fx = Fixture::new().await;
    let bolt = fx.item("BOLT").await;
    fx.receive(bolt, fx.main, 5, 100).await;

    let err = fx
        .inventory
        .return_purchase(transfer(Some(fx.main), vec![StockLine::new(bolt, 6)], "RET-1"), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Domain(DomainError::InsufficientStock {
            available: 5,
            required: 6,
            ..
        })
    ));

    let returned = fx
        .inventory
        .return_purchase(transfer(Some(fx.main), vec![StockLine::new(bolt, 2)], "RET-1"), None)
        .await
        .unwrap();
    assert_eq!(returned.document_no, "PURCH-2026-00001");
    assert_eq!(returned.movements[0].quantity, -2);
    assert_eq!(fx.stock(bolt, fx.main).await, 3);

    // Two lines of the same item share the balance.
    let err = fx
        .inventory
        .record_sale(
            transfer(
                Some(fx.main),
                vec![StockLine::new(bolt, 2), StockLine::new(bolt, 2)],
                "POS-9",
            ),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Domain(DomainError::InsufficientStock { .. })
    ));
    assert_eq!(fx.stock(bolt, fx.main).await, 3);

    let sale = fx
        .inventory
        .record_sale(transfer(Some(fx.main), vec![StockLine::new(bolt, 3)], "POS-9"), None)
        .await
        .unwrap();
    assert_eq!(sale.document_no, "POS-9");
    assert_eq!(fx.stock(bolt, fx.main).await, 0);
    fx.assert_consistent().await;
}

#[tokio::test]
async fn adjustment_may_go_negative_but_not_be_zero() {
    let fx = Fixture::new().await;
    let bolt = fx.item("BOLT").await;

    let err = fx
        .inventory
        .adjust_stock(
            AdjustStock {
                item_id: bolt,
                warehouse_id: fx.west,
                quantity: 0,
                reason: None,
                movement_date: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Domain(DomainError::Validation(_))));

    let recorded = fx
        .inventory
        .adjust_stock(
            AdjustStock {
                item_id: bolt,
                warehouse_id: fx.west,
                quantity: -4,
                reason: Some("count correction".to_string()),
                movement_date: None,
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(recorded.movement_no, "STK-2026-00001");
    assert_eq!(recorded.balance_after, -4);
    assert_eq!(fx.current_stock(bolt).await, -4);

    let err = fx
        .inventory
        .adjust_stock(
            AdjustStock {
                item_id: bolt,
                warehouse_id: WarehouseId::new(404),
                quantity: 1,
                reason: None,
                movement_date: None,
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Domain(DomainError::NotFound(_))));
    fx.assert_consistent().await;
}

#[tokio::test]
async fn production_consumes_raw_and_produces_finished_goods() {
    let fx = Fixture::new().await;
    let steel = fx.item("STEEL").await;
    let paint = fx.item("PAINT").await;
    let frame = fx.item("FRAME").await;
    fx.receive(steel, fx.raw, 10, 400).await;
    fx.receive(paint, fx.raw, 4, 900).await;

    let run = fx
        .inventory
        .run_production(production(frame, 2, &[(steel, 6), (paint, 1)]), None)
        .await
        .unwrap();

    assert_eq!(run.production_no, "PROD-2026-00001");
    assert_eq!(run.consumed.len(), 2);
    assert_eq!(run.produced.warehouse_id, fx.finished);
    assert_eq!(fx.stock(steel, fx.raw).await, 4);
    assert_eq!(fx.stock(paint, fx.raw).await, 3);
    assert_eq!(fx.stock(frame, fx.finished).await, 2);

    let ledger = fx.inventory.item_ledger(frame, Some(fx.finished)).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].movement_type, MovementType::Production);
    assert_eq!(ledger[0].reference_docno, run.production_no);
    fx.assert_consistent().await;
}

#[tokio::test]
async fn production_shortage_on_one_input_rolls_back_every_movement() {
    let fx = Fixture::new().await;
    let a = fx.item("IN-A").await;
    let b = fx.item("IN-B").await;
    let c = fx.item("IN-C").await;
    let out = fx.item("OUT").await;
    fx.receive(a, fx.raw, 10, 100).await;
    fx.receive(b, fx.raw, 10, 100).await;
    fx.receive(c, fx.raw, 1, 100).await;

    let movements_before = {
        let mut tx = fx.store.begin().await.unwrap();
        let mut count = 0;
        for item in [a, b, c, out] {
            count += tx.movements(item, None).await.unwrap().len();
        }
        count
    };

    // The first two inputs are covered and written before the third fails.
    let err = fx
        .inventory
        .run_production(production(out, 1, &[(a, 2), (b, 2), (c, 5)]), None)
        .await
        .unwrap_err();
    match err {
        LedgerError::Domain(DomainError::InsufficientStock {
            item,
            warehouse,
            available,
            required,
        }) => {
            assert_eq!(item, c);
            assert_eq!(warehouse, fx.raw);
            assert_eq!(available, 1);
            assert_eq!(required, 5);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let mut tx = fx.store.begin().await.unwrap();
    let mut movements_after = 0;
    for item in [a, b, c, out] {
        movements_after += tx.movements(item, None).await.unwrap().len();
    }
    assert_eq!(movements_after, movements_before);
    assert_eq!(tx.next_sequence("PROD", 2026).await.unwrap(), 1);
    drop(tx);

    assert_eq!(fx.stock(a, fx.raw).await, 10);
    assert_eq!(fx.stock(b, fx.raw).await, 10);
    assert_eq!(fx.stock(out, fx.finished).await, 0);
    fx.assert_consistent().await;
}

#[tokio::test]
async fn production_needs_its_warehouses() {
    let fx = Fixture::new().await;
    let input = fx.item("IN").await;
    let output = fx.item("OUT").await;

    let mut config = (*fx.ctx.config).clone();
    config.raw_materials_warehouse_code = "NOPE".to_string();
    let ctx = bizbooks_infra::LedgerContext::new(fx.store.clone(), config);
    let inventory = bizbooks_infra::InventoryService::new(ctx);

    let err = inventory
        .run_production(production(output, 1, &[(input, 1)]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Domain(DomainError::NotFound(_))));
}

#[tokio::test]
async fn item_ledger_of_unknown_item_is_not_found() {
    let fx = Fixture::new().await;
    let err = fx
        .inventory
        .item_ledger(ItemId::new(77), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Domain(DomainError::NotFound(_))));
}
