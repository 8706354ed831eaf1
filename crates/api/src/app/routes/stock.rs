use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use bizbooks_core::ItemId;
use bizbooks_infra::{AdjustStock, Store, StockTransfer};

use crate::app::{dto, errors, AppServices};
use crate::context::ActorContext;

pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/movements", post(adjust_stock::<S>))
        .route("/purchases", post(receive_purchase::<S>))
        .route("/purchase-returns", post(return_purchase::<S>))
        .route("/sales", post(record_sale::<S>))
        .route("/items/:id/ledger", get(item_ledger::<S>))
        .route("/items/:id/balances", get(item_balances::<S>))
}

pub async fn adjust_stock<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<AdjustStock>,
) -> axum::response::Response {
    match services.inventory.adjust_stock(body, actor.user_id()).await {
        Ok(movement) => (StatusCode::CREATED, Json(movement)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn receive_purchase<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<StockTransfer>,
) -> axum::response::Response {
    match services.inventory.receive_purchase(body, actor.user_id()).await {
        Ok(op) => (StatusCode::CREATED, Json(op)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn return_purchase<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<StockTransfer>,
) -> axum::response::Response {
    match services.inventory.return_purchase(body, actor.user_id()).await {
        Ok(op) => (StatusCode::CREATED, Json(op)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn record_sale<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<StockTransfer>,
) -> axum::response::Response {
    match services.inventory.record_sale(body, actor.user_id()).await {
        Ok(op) => (StatusCode::CREATED, Json(op)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn item_ledger<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
    Query(query): Query<dto::ItemLedgerQuery>,
) -> axum::response::Response {
    let id: ItemId = match dto::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.inventory.item_ledger(id, query.warehouse_id).await {
        Ok(movements) => Json(movements).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn item_balances<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ItemId = match dto::parse_id(&id, "item") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.inventory.item_balances(id).await {
        Ok(balances) => Json(balances).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
