//! Sales domain module.
//!
//! Sale records, their snapshotted line items, the status lifecycle and the
//! checkout request rules, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage). Order-number generation is the only source
//! of randomness and takes an injectable RNG.

pub mod checkout;
pub mod order_number;
pub mod sale;
pub mod status;

pub use checkout::{CheckoutLine, CheckoutRequest, NewSale, NewSaleItem, normalize_money};
pub use order_number::OrderNumber;
pub use sale::{
    CustomerSnapshot, PaymentDescriptor, Sale, SaleItem, SaleSummary, SaleTotals, SaleWithItems,
    ShippingSnapshot,
};
pub use status::{SaleStatus, TransitionPolicy};
