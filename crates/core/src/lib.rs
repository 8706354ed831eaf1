//! `bizbooks-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the inventory,
//! customer and invoicing crates: typed row identifiers, the `Money` value
//! object and the domain error taxonomy. No infrastructure concerns.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AllocationId, CustomerId, InvoiceId, ItemId, LedgerEntryId, MovementId, PaymentId, UserId,
    WarehouseId,
};
pub use value_object::{Money, ValueObject};
