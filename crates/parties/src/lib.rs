//! Customer domain module: customers and their append-only receivables ledger.

pub mod customer;
pub mod ledger;

pub use customer::{Customer, NewCustomer};
pub use ledger::{CustomerLedgerEntry, LedgerEntryType, NewLedgerEntry, running_balance};
