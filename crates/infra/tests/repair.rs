mod common;

use bizbooks_core::{AllocationId, Money};
use bizbooks_infra::{CreatePayment, LedgerTx, RepairReport, Store, repair};
use bizbooks_invoicing::{AllocationRequest, InvoiceStatus};

use common::{Fixture, money, today};

#[tokio::test]
async fn consistent_database_needs_no_writes() {
    let fx = Fixture::new().await;
    let widget = fx.item("W-1").await;
    fx.receive(widget, fx.main, 10, 250).await;
    fx.invoice(widget, 4, 1_000).await;

    let report = repair(&fx.ctx).await.unwrap();
    assert!(report.is_clean(), "{report:?}");
}

#[tokio::test]
async fn drift_is_corrected_and_second_run_is_clean() {
    let fx = Fixture::new().await;
    let widget = fx.item("W-1").await;
    let gadget = fx.item("G-1").await;
    fx.receive(widget, fx.main, 10, 250).await;
    let invoice = fx.invoice(widget, 2, 5_000).await.invoice;
    fx.receivables
        .create_payment(
            CreatePayment {
                customer_id: fx.customer,
                payment_date: today(),
                amount: money(3_000),
                method: "cash".to_string(),
                reference: None,
                notes: None,
                allocations: vec![AllocationRequest {
                    invoice_id: invoice.id,
                    amount: money(3_000),
                }],
            },
            None,
        )
        .await
        .unwrap();

    // Corrupt every cache behind the services' backs.
    {
        let mut tx = fx.store.begin().await.unwrap();
        tx.set_stock_balance(widget, fx.main, 99).await.unwrap();
        tx.insert_stock_balance(gadget, fx.west, 5).await.unwrap();
        tx.set_item_current_stock(gadget, 5).await.unwrap();
        let mut stale = tx.invoice(invoice.id).await.unwrap().unwrap();
        stale.paid_amount = Money::ZERO;
        stale.balance_amount = stale.total_amount;
        stale.status = InvoiceStatus::Unpaid;
        tx.update_invoice(&stale).await.unwrap();
        tx.set_customer_balance(fx.customer, money(1)).await.unwrap();
        tx.commit().await.unwrap();
    }

    let report = repair(&fx.ctx).await.unwrap();
    assert_eq!(
        report,
        RepairReport {
            stock_balances_corrected: 1,
            stock_balances_created: 0,
            orphan_balances_removed: 1,
            // gadget only: widget's cached total was never touched
            items_resynced: 1,
            invoices_corrected: 1,
            customers_corrected: 1,
        }
    );
    assert_eq!(fx.stock(widget, fx.main).await, 8);
    assert_eq!(fx.current_stock(gadget).await, 0);
    let repaired = fx.receivables.get_invoice(invoice.id).await.unwrap().invoice;
    assert_eq!(repaired.paid_amount, money(3_000));
    assert_eq!(repaired.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(fx.customer_balance(fx.customer).await, money(7_000));

    let second = repair(&fx.ctx).await.unwrap();
    assert!(second.is_clean(), "{second:?}");
    fx.assert_consistent().await;
}

#[tokio::test]
async fn missing_balance_row_is_recreated() {
    let fx = Fixture::new().await;
    let widget = fx.item("W-1").await;
    fx.receive(widget, fx.west, 6, 100).await;

    {
        let mut tx = fx.store.begin().await.unwrap();
        tx.delete_stock_balance(widget, fx.west).await.unwrap();
        tx.commit().await.unwrap();
    }

    let report = repair(&fx.ctx).await.unwrap();
    assert_eq!(report.stock_balances_created, 1);
    assert_eq!(report.items_resynced, 0);
    assert_eq!(fx.stock(widget, fx.west).await, 6);
    assert!(repair(&fx.ctx).await.unwrap().is_clean());
}

#[tokio::test]
async fn removed_allocation_reopens_invoice_on_repair() {
    let fx = Fixture::new().await;
    let widget = fx.item("W-1").await;
    let invoice = fx.invoice(widget, 1, 2_000).await.invoice;
    let paid = fx
        .receivables
        .create_payment(
            CreatePayment {
                customer_id: fx.customer,
                payment_date: today(),
                amount: money(2_000),
                method: "cash".to_string(),
                reference: None,
                notes: None,
                allocations: vec![AllocationRequest {
                    invoice_id: invoice.id,
                    amount: money(2_000),
                }],
            },
            None,
        )
        .await
        .unwrap();
    let allocation: AllocationId = paid.allocations[0].id;

    {
        let mut tx = fx.store.begin().await.unwrap();
        tx.delete_allocation(allocation).await.unwrap();
        tx.commit().await.unwrap();
    }

    let report = repair(&fx.ctx).await.unwrap();
    assert_eq!(report.invoices_corrected, 1);
    assert_eq!(report.customers_corrected, 1);
    let invoice = fx.receivables.get_invoice(invoice.id).await.unwrap().invoice;
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
    assert_eq!(fx.customer_balance(fx.customer).await, money(2_000));
}
