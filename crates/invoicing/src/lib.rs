//! Invoicing domain module.
//!
//! Invoices, their lines, payments and payment allocations, and the pure rules
//! that tie them together: line totals, status derivation and the allocation
//! sum gate. Persistence and recomputation live in the infrastructure crate.

pub mod invoice;
pub mod payment;

pub use invoice::{
    Invoice, InvoiceLine, InvoiceLineInput, InvoiceStatus, NewInvoice, derive_status, initial_status,
    invoice_total,
};
pub use payment::{
    ALLOCATION_TOLERANCE, AllocationRequest, ImmediatePayment, NewPayment, Payment, PaymentAllocation,
    validate_allocations,
};
