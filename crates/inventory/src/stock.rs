use serde::{Deserialize, Serialize};

use stylehub_core::{DomainError, ProductId};

/// Current ledger row for a product, as read inside a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    pub name: String,
    pub stock: i32,
}

/// A committed-on-success decrement of one product's stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debit {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl Debit {
    pub fn new(product_id: ProductId, quantity: i32) -> Result<Self, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::validation("debit quantity must be positive"));
        }
        Ok(Self {
            product_id,
            quantity,
        })
    }

    /// Stock level after this debit. Never negative.
    pub fn apply(&self, stock: i32) -> Result<i32, DomainError> {
        let remaining = stock
            .checked_sub(self.quantity)
            .ok_or_else(|| DomainError::invariant("stock arithmetic overflow"))?;
        if remaining < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        Ok(remaining)
    }
}
