use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use bizbooks_core::CustomerId;
use bizbooks_infra::Store;

use crate::app::{dto, errors, AppServices};
use crate::context::ActorContext;

pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/:id", get(get_customer::<S>))
        .route("/:id/ledger", get(customer_ledger::<S>))
        .route("/:id/opening-balance", post(record_opening_balance::<S>))
}

pub async fn get_customer<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match dto::parse_id(&id, "customer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.reference.customer(id).await {
        Ok(customer) => Json(customer).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn customer_ledger<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CustomerId = match dto::parse_id(&id, "customer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.receivables.customer_ledger(id).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn record_opening_balance<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::OpeningBalanceRequest>,
) -> axum::response::Response {
    let id: CustomerId = match dto::parse_id(&id, "customer") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let entry_date = body.entry_date.unwrap_or_else(|| services.ctx.today());
    match services
        .receivables
        .record_opening_balance(id, body.amount, entry_date, actor.user_id())
        .await
    {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
