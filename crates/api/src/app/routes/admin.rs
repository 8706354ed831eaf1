use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use tracing::info;

use bizbooks_infra::{repair, Store};
use bizbooks_inventory::{NewItem, NewWarehouse};
use bizbooks_parties::NewCustomer;

use crate::app::{errors, AppServices};
use crate::context::ActorContext;

pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/repair", post(run_repair::<S>))
        .route("/items", post(register_item::<S>).get(list_items::<S>))
        .route("/warehouses", post(register_warehouse::<S>))
        .route("/customers", post(register_customer::<S>).get(list_customers::<S>))
}

pub async fn run_repair<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
) -> axum::response::Response {
    match repair(&services.ctx).await {
        Ok(report) => {
            info!(
                actor = ?actor.user_id(),
                writes = report.total_writes(),
                "repair requested over http"
            );
            Json(report).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn register_item<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<NewItem>,
) -> axum::response::Response {
    match services.reference.register_item(body).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_items<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
) -> axum::response::Response {
    match services.reference.items().await {
        Ok(items) => Json(items).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn register_warehouse<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<NewWarehouse>,
) -> axum::response::Response {
    match services.reference.register_warehouse(body).await {
        Ok(warehouse) => (StatusCode::CREATED, Json(warehouse)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn register_customer<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Json(body): Json<NewCustomer>,
) -> axum::response::Response {
    match services.reference.register_customer(body).await {
        Ok(customer) => (StatusCode::CREATED, Json(customer)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_customers<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
) -> axum::response::Response {
    match services.reference.customers().await {
        Ok(customers) => Json(customers).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
