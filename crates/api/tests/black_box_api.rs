use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use bizbooks_api::app::{build_app, AppServices};
use bizbooks_api::middleware::ACTOR_HEADER;
use bizbooks_infra::{InMemoryStore, LedgerConfig, LedgerContext};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    actor: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over a fresh in-memory store, on an ephemeral port.
        let ctx = LedgerContext::new(Arc::new(InMemoryStore::new()), LedgerConfig::default());
        let app = build_app(Arc::new(AppServices::new(ctx)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            actor: "0190f5b2-7c3e-7a10-9b7e-3f6a2d1c4b5e".to_string(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(self.url(path))
            .header(ACTOR_HEADER, &self.actor)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self.client.get(self.url(path)).send().await.unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .delete(self.url(path))
            .header(ACTOR_HEADER, &self.actor)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    /// MAIN, RAW and FG warehouses, one customer, returns its id.
    async fn seed_reference(&self) -> i64 {
        for (code, name) in [("MAIN", "Main"), ("RAW", "Raw"), ("FG", "Finished")] {
            let (status, _) = self
                .post("/admin/warehouses", json!({ "code": code, "name": name }))
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (status, customer) = self
            .post("/admin/customers", json!({ "code": "C001", "name": "Acme" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        customer["id"].as_i64().unwrap()
    }

    async fn item(&self, code: &str) -> i64 {
        let (status, item) = self
            .post(
                "/admin/items",
                json!({ "code": code, "name": code, "unit": "pcs" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{item}");
        item["id"].as_i64().unwrap()
    }

    async fn receive(&self, item: i64, warehouse: i64, quantity: i64) {
        let (status, body) = self
            .post(
                "/stock/purchases",
                json!({
                    "warehouse_id": warehouse,
                    "lines": [{ "item_id": item, "quantity": quantity, "unit_cost": 100 }],
                    "reference": "DN-1",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
    }

    async fn balance(&self, item: i64, warehouse: i64) -> i64 {
        let (status, balances) = self.get(&format!("/stock/items/{item}/balances")).await;
        assert_eq!(status, StatusCode::OK);
        balances
            .as_array()
            .unwrap()
            .iter()
            .find(|b| b["warehouse_id"] == warehouse)
            .map(|b| b["quantity"].as_i64().unwrap())
            .unwrap_or(0)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_needs_no_actor() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn writes_require_an_actor_header() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/admin/repair"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .post(srv.url("/admin/repair"))
        .header(ACTOR_HEADER, "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Reads run without one.
    let (status, _) = srv.get("/reports/low-stock").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reference_lists_are_readable() {
    let srv = TestServer::spawn().await;
    srv.seed_reference().await;
    let bolt = srv.item("BOLT").await;

    let (status, items) = srv.get("/admin/items").await;
    assert_eq!(status, StatusCode::OK);
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], bolt);
    assert_eq!(items[0]["code"], "BOLT");

    let (status, customers) = srv.get("/admin/customers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customers.as_array().unwrap().len(), 1);
    assert_eq!(customers[0]["code"], "C001");
}

#[tokio::test]
async fn invoice_lifecycle_over_http() {
    let srv = TestServer::spawn().await;
    let customer = srv.seed_reference().await;
    let widget = srv.item("WIDGET").await;
    srv.receive(widget, 1, 10).await;

    let (status, created) = srv
        .post(
            "/invoices",
            json!({
                "customer_id": customer,
                "invoice_date": "2026-01-10",
                "due_date": "2099-12-31",
                "lines": [{ "item_id": widget, "quantity": 3, "unit_price": 2500 }],
                "payment": { "amount": 2500 },
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let invoice_id = created["invoice"]["id"].as_i64().unwrap();
    assert_eq!(created["invoice"]["invoice_no"], "INV-2026-00001");
    assert_eq!(created["invoice"]["status"], "Partially Paid");
    assert_eq!(created["invoice"]["balance_amount"], 5000);
    assert_eq!(srv.balance(widget, 1).await, 7);

    let (status, customer_row) = srv.get(&format!("/customers/{customer}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(customer_row["current_balance"], 5000);

    let (status, ledger) = srv.get(&format!("/customers/{customer}/ledger")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.as_array().unwrap().len(), 2);

    let (status, payment) = srv
        .post(
            "/payments",
            json!({
                "customer_id": customer,
                "payment_date": "2026-01-20",
                "amount": 5000,
                "allocations": [{ "invoice_id": invoice_id, "amount": 5000 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{payment}");
    let (_, fetched) = srv.get(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(fetched["invoice"]["status"], "Paid");
    assert_eq!(fetched["allocations"].as_array().unwrap().len(), 2);

    let (status, deletion) = srv.delete(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(status, StatusCode::OK, "{deletion}");
    assert_eq!(deletion["removed_payments"].as_array().unwrap().len(), 2);
    assert_eq!(srv.balance(widget, 1).await, 10);

    let (status, _) = srv.get(&format!("/invoices/{invoice_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, report) = srv.post("/admin/repair", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["invoices_corrected"], 0);
    assert_eq!(report["stock_balances_corrected"], 0);
}

#[tokio::test]
async fn errors_carry_status_and_code() {
    let srv = TestServer::spawn().await;
    srv.seed_reference().await;
    let bolt = srv.item("BOLT").await;
    srv.receive(bolt, 1, 2).await;

    let (status, body) = srv.get("/invoices/404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = srv.get("/invoices/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, body) = srv
        .post(
            "/stock/sales",
            json!({
                "warehouse_id": 1,
                "lines": [{ "item_id": bolt, "quantity": 5 }],
                "reference": "POS-1",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "insufficient_stock");

    let (status, body) = srv
        .post(
            "/stock/movements",
            json!({ "item_id": bolt, "warehouse_id": 1, "quantity": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = srv
        .post("/admin/warehouses", json!({ "code": "MAIN", "name": "Again" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
}

#[tokio::test]
async fn production_and_reports_over_http() {
    let srv = TestServer::spawn().await;
    srv.seed_reference().await;
    let steel = srv.item("STEEL").await;
    let frame = srv.item("FRAME").await;
    srv.receive(steel, 2, 10).await;

    let (status, run) = srv
        .post(
            "/production",
            json!({
                "output_item": frame,
                "output_quantity": 2,
                "inputs": [{ "item_id": steel, "quantity": 4 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{run}");
    assert!(run["production_no"].as_str().unwrap().starts_with("PROD-"));
    assert_eq!(srv.balance(steel, 2).await, 6);
    assert_eq!(srv.balance(frame, 3).await, 2);

    let (status, ledger) = srv.get(&format!("/stock/items/{frame}/ledger")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger[0]["movement_type"], "PRODUCTION");

    let (status, valuation) = srv.get("/reports/stock-valuation").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(valuation["total"], 600);

    let (status, aging) = srv.get("/reports/ar-aging?as_of=2026-03-15").await;
    assert_eq!(status, StatusCode::OK);
    assert!(aging.as_array().unwrap().is_empty());
}
