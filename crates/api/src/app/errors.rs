use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use bizbooks_core::DomainError;
use bizbooks_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Domain(e) => domain_error_to_response(e),
        LedgerError::Store(e) => {
            error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", message)
        }
        DomainError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::InsufficientStock { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_stock", message)
        }
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizbooks_core::{ItemId, WarehouseId};
    use bizbooks_infra::StoreError;

    #[test]
    fn statuses_follow_the_error_kind() {
        let cases = [
            (LedgerError::validation("bad"), StatusCode::BAD_REQUEST),
            (LedgerError::not_found("invoice 9"), StatusCode::NOT_FOUND),
            (LedgerError::conflict("dup"), StatusCode::CONFLICT),
            (LedgerError::invariant("broken"), StatusCode::UNPROCESSABLE_ENTITY),
            (
                LedgerError::Domain(DomainError::InsufficientStock {
                    item: ItemId::new(1),
                    warehouse: WarehouseId::new(1),
                    available: 0,
                    required: 1,
                }),
                StatusCode::CONFLICT,
            ),
            (
                LedgerError::Store(StoreError::Database("down".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ledger_error_to_response(err).status(), status);
        }
    }
}
