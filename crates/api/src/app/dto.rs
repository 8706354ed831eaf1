use std::str::FromStr;

use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use bizbooks_core::{CustomerId, Money, WarehouseId};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OpeningBalanceRequest {
    /// Signed; negative means the business owes the customer.
    pub amount: Money,
    /// Defaults to today.
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemLedgerQuery {
    pub warehouse_id: Option<WarehouseId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListQuery {
    pub customer_id: Option<CustomerId>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgingQuery {
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DsoQuery {
    pub as_of: Option<NaiveDate>,
    pub period_days: Option<u32>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

// -------------------------
// Helpers
// -------------------------

/// Parse a path id, answering 400 `invalid_id` on garbage.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse::<T>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id: {raw:?}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizbooks_core::InvoiceId;

    #[test]
    fn path_ids_parse_or_answer_bad_request() {
        assert_eq!(parse_id::<InvoiceId>("12", "invoice").ok(), Some(InvoiceId::new(12)));
        let err = parse_id::<InvoiceId>("twelve", "invoice").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
