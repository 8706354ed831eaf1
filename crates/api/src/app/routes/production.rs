use std::sync::Arc;

use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};

use bizbooks_infra::{RunProduction, Store};

use crate::app::{errors, AppServices};
use crate::context::ActorContext;

pub fn router<S: Store>() -> Router {
    Router::new().route("/", post(run_production::<S>))
}

pub async fn run_production<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Extension(actor): Extension<ActorContext>,
    Json(body): Json<RunProduction>,
) -> axum::response::Response {
    match services.inventory.run_production(body, actor.user_id()).await {
        Ok(run) => (StatusCode::CREATED, Json(run)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
