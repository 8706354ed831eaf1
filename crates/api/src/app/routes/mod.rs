use axum::Router;

use bizbooks_infra::Store;

pub mod admin;
pub mod customers;
pub mod invoices;
pub mod payments;
pub mod production;
pub mod reports;
pub mod stock;
pub mod system;

/// Router for all ledger endpoints.
pub fn router<S: Store>() -> Router {
    Router::new()
        .nest("/invoices", invoices::router::<S>())
        .nest("/payments", payments::router::<S>())
        .nest("/stock", stock::router::<S>())
        .nest("/production", production::router::<S>())
        .nest("/customers", customers::router::<S>())
        .nest("/reports", reports::router::<S>())
        .nest("/admin", admin::router::<S>())
}
