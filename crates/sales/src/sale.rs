use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stylehub_core::{ProductId, SaleId, SaleItemId};

use crate::order_number::OrderNumber;
use crate::status::SaleStatus;

/// Customer contact details copied into the sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Shipping destination copied into the sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSnapshot {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// How the sale was paid. Only a masked card reference is ever kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDescriptor {
    pub method: String,
    pub card_last4: Option<String>,
}

/// Monetary totals as computed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl SaleTotals {
    /// `total == subtotal + shipping + tax`. Callers rely on it; the store does not enforce it.
    pub fn is_consistent(&self) -> bool {
        self.subtotal
            .checked_add(self.shipping)
            .and_then(|v| v.checked_add(self.tax))
            .is_some_and(|sum| sum == self.total)
    }
}

/// A persisted sale header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    pub order_number: OrderNumber,
    pub customer: CustomerSnapshot,
    pub shipping: ShippingSnapshot,
    pub payment: PaymentDescriptor,
    pub totals: SaleTotals,
    pub status: SaleStatus,
    pub order_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted, immutable line of a sale.
///
/// `product_id` is a soft reference: the product may be deleted later, the
/// snapshot fields keep the history intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub id: SaleItemId,
    pub sale_id: SaleId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Decimal,
    pub subtotal: Decimal,
}

/// A sale together with its line items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

/// List row: a sale plus item aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleSummary {
    pub sale: Sale,
    pub items_count: i64,
    pub total_items: i64,
}

impl SaleSummary {
    pub fn from_items(sale: Sale, items: &[SaleItem]) -> Self {
        Self {
            sale,
            items_count: items.len() as i64,
            total_items: items.iter().map(|i| i64::from(i.quantity)).sum(),
        }
    }
}
