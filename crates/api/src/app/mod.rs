//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: the ledger services shared by every handler
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: query/request DTOs and path parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use bizbooks_infra::Store;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app<S: Store>(services: Arc<AppServices<S>>) -> Router {
    // Every ledger route carries an actor context; writes require one.
    let ledger = routes::router::<S>()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::actor_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(ledger)
        .layer(ServiceBuilder::new())
}
