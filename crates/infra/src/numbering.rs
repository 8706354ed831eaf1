//! Document numbers: `{PREFIX}-{YEAR}-{SEQ:05}`.
//!
//! Sequences are per (prefix, year) and allocated inside the caller's
//! transaction, so a rolled-back operation gives its number back.

use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;
use crate::store::LedgerTx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    PurchaseOrder,
    Invoice,
    Payment,
    StockMovement,
    Production,
    Purchase,
    GoodsReceipt,
}

impl DocumentType {
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentType::PurchaseOrder => "PO",
            DocumentType::Invoice => "INV",
            DocumentType::Payment => "PAY",
            DocumentType::StockMovement => "STK",
            DocumentType::Production => "PROD",
            DocumentType::Purchase => "PURCH",
            DocumentType::GoodsReceipt => "GR",
        }
    }
}

pub fn format_document_number(doc: DocumentType, year: i32, sequence: i64) -> String {
    format!("{}-{year}-{sequence:05}", doc.prefix())
}

/// Allocate the next number for `doc` in `year`.
pub async fn next_document_number<T: LedgerTx>(
    tx: &mut T,
    doc: DocumentType,
    year: i32,
) -> LedgerResult<String> {
    let sequence = tx.next_sequence(doc.prefix(), year).await?;
    Ok(format_document_number(doc, year, sequence))
}
