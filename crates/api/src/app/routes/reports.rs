use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use bizbooks_infra::Store;

use crate::app::{dto, errors, AppServices};

const DEFAULT_DSO_PERIOD_DAYS: u32 = 90;

pub fn router<S: Store>() -> Router {
    Router::new()
        .route("/ar-aging", get(ar_aging::<S>))
        .route("/low-stock", get(low_stock::<S>))
        .route("/stock-valuation", get(stock_valuation::<S>))
        .route("/dso", get(days_sales_outstanding::<S>))
}

pub async fn ar_aging<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(query): Query<dto::AgingQuery>,
) -> axum::response::Response {
    let as_of = query.as_of.unwrap_or_else(|| services.ctx.today());
    match services.reports.ar_aging(as_of).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn low_stock<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
) -> axum::response::Response {
    match services.reports.low_stock().await {
        Ok(items) => Json(items).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn stock_valuation<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
) -> axum::response::Response {
    match services.reports.stock_valuation().await {
        Ok(valuation) => Json(valuation).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn days_sales_outstanding<S: Store>(
    Extension(services): Extension<Arc<AppServices<S>>>,
    Query(query): Query<dto::DsoQuery>,
) -> axum::response::Response {
    let as_of = query.as_of.unwrap_or_else(|| services.ctx.today());
    let period = query.period_days.unwrap_or(DEFAULT_DSO_PERIOD_DAYS);
    match services.reports.days_sales_outstanding(as_of, period).await {
        Ok(dso) => Json(dso).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
