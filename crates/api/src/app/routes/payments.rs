use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use bizbooks_core::PaymentId;
use bizbooks_infra::{CreatePayment, Store};

use crate::app::{dto, errors, AppServices};
use crate::context::ActorContext;

pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/", post(create_payment::<S>))
        .route("/:id", get(get_payment::<S>).delete(delete_payment::<S>))
}

pub async fn create_payment<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<CreatePayment>,
) -> axum::response::Response {
    match services
        .receivables
        .create_payment(body, actor.user_id())
        .await
    {
        Ok(details) => (StatusCode::CREATED, Json(details)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_payment<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PaymentId = match dto::parse_id(&id, "payment") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.receivables.payment_details(id).await {
        Ok(details) => Json(details).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn delete_payment<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PaymentId = match dto::parse_id(&id, "payment") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.receivables.delete_payment(id, actor.user_id()).await {
        Ok(payment) => Json(payment).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
