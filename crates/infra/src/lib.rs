//! Infrastructure layer: storage, the stock and customer ledgers, and the
//! services that keep the cached balances consistent with them.
//!
//! Domain crates decide *what* a status or a warehouse should be; this crate
//! decides *when* those rules run and makes every operation one transaction.

pub mod activity_log;
pub mod clock;
pub mod config;
pub mod context;
pub mod customer_ledger;
pub mod error;
pub mod numbering;
pub mod operations;
pub mod reconciliation;
pub mod reference;
pub mod repair;
pub mod reports;
pub mod stock_ledger;
pub mod store;

pub use activity_log::{ActivityEntry, ActivityLogger};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ActivityLogConfig, ConfigError, LedgerConfig};
pub use context::LedgerContext;
pub use error::{LedgerError, LedgerResult, StoreError};
pub use numbering::{DocumentType, next_document_number};
pub use operations::{
    AdjustStock, InventoryService, ProductionRun, RunProduction, StockOperation, StockTransfer,
};
pub use reconciliation::{
    CreateInvoice, CreatePayment, InvoiceDeletion, InvoiceDetails, PaymentDetails,
    ReceivablesService, UpdateInvoice,
};
pub use reference::ReferenceData;
pub use repair::{RepairReport, repair};
pub use reports::{
    AgingBucket, CustomerAging, DaysSalesOutstanding, ItemValuation, ReportingService,
    StockValuation,
};
pub use stock_ledger::{RecordedMovement, record_movement};
pub use store::{InMemoryStore, LedgerTx, PostgresStore, Store};
