//! Batch stock validation.
//!
//! Every line of a checkout is assessed, and every violation is reported, so
//! the caller sees the complete set of obstacles in one round trip. Lines that
//! reference the same product draw from the same stock: a later line only sees
//! what the earlier lines of the same request left over.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stylehub_core::ProductId;

use crate::stock::{Debit, StockEntry};

/// Message attached to shortfalls for products that do not exist.
pub const PRODUCT_NOT_FOUND: &str = "not found";

/// One requested line, as far as the ledger is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRequest {
    pub product_id: ProductId,
    /// Name supplied by the caller; only used when the product is missing.
    pub product_name: String,
    pub quantity: i32,
}

/// A line that cannot be fulfilled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub product: String,
    pub requested: i32,
    pub available: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Accumulates the assessment of a whole request.
#[derive(Debug, Default)]
pub struct AvailabilityCheck {
    remaining: HashMap<ProductId, i32>,
    debits: Vec<Debit>,
    shortfalls: Vec<StockShortfall>,
}

impl AvailabilityCheck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assess one line against the locked ledger row (`None` = product missing).
    pub fn assess(&mut self, request: &StockRequest, entry: Option<&StockEntry>) {
        let Some(entry) = entry else {
            self.shortfalls.push(StockShortfall {
                product: request.product_name.clone(),
                requested: request.quantity,
                available: 0,
                error: Some(PRODUCT_NOT_FOUND.to_string()),
            });
            return;
        };

        let available = *self
            .remaining
            .entry(request.product_id)
            .or_insert(entry.stock);

        if available < request.quantity {
            self.shortfalls.push(StockShortfall {
                product: entry.name.clone(),
                requested: request.quantity,
                available,
                error: None,
            });
            return;
        }

        self.remaining
            .insert(request.product_id, available - request.quantity);
        self.debits.push(Debit {
            product_id: request.product_id,
            quantity: request.quantity,
        });
    }

    /// Debits to apply (in request order) when nothing fell short, otherwise every shortfall.
    pub fn finish(self) -> Result<Vec<Debit>, Vec<StockShortfall>> {
        if self.shortfalls.is_empty() {
            Ok(self.debits)
        } else {
            Err(self.shortfalls)
        }
    }
}
