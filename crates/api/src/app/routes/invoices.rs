use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use bizbooks_core::InvoiceId;
use bizbooks_infra::{CreateInvoice, Store, UpdateInvoice};

use crate::app::{dto, errors, AppServices};
use crate::context::ActorContext;

pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/", post(create_invoice::<S>).get(list_invoices::<S>))
        .route(
            "/:id",
            get(get_invoice::<S>)
                .put(update_invoice::<S>)
                .delete(delete_invoice::<S>),
        )
}

pub async fn create_invoice<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<CreateInvoice>,
) -> axum::response::Response {
    match services
        .receivables
        .create_invoice(body, actor.user_id())
        .await
    {
        Ok(details) => (StatusCode::CREATED, Json(details)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_invoices<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(query): Query<dto::InvoiceListQuery>,
) -> axum::response::Response {
    match services.receivables.list_invoices(query.customer_id).await {
        Ok(invoices) => Json(invoices).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_invoice<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match dto::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.receivables.get_invoice(id).await {
        Ok(details) => Json(details).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_invoice<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateInvoice>,
) -> axum::response::Response {
    let id: InvoiceId = match dto::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services
        .receivables
        .update_invoice(id, body, actor.user_id())
        .await
    {
        Ok(details) => Json(details).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_invoice<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match dto::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.receivables.delete_invoice(id, actor.user_id()).await {
        Ok(deletion) => Json(deletion).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
