//! Inventory ledger domain module.
//!
//! Pure stock rules (no IO, no HTTP, no storage): what a ledger row looks like,
//! how a debit changes it, and how a batch of requested quantities is assessed
//! against locked stock levels before anything is written.

pub mod availability;
pub mod stock;

pub use availability::{AvailabilityCheck, StockRequest, StockShortfall};
pub use stock::{Debit, StockEntry};
