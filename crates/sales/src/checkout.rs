//! Checkout request rules.
//!
//! A [`CheckoutRequest`] is what the caller sends. [`CheckoutRequest::prepare`]
//! validates it and normalizes money to cents, producing a [`NewSale`] that can
//! be materialized into persisted records once an order number is known.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stylehub_core::{DomainError, DomainResult, ProductId, SaleId, SaleItemId};
use stylehub_inventory::StockRequest;

use crate::order_number::OrderNumber;
use crate::sale::{
    CustomerSnapshot, PaymentDescriptor, Sale, SaleItem, SaleTotals, SaleWithItems,
    ShippingSnapshot,
};
use crate::status::SaleStatus;

const MAX_CARD_DIGITS: usize = 4;

/// Largest amount a `NUMERIC(12, 2)` column holds.
fn max_amount() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Round to cents and pin the scale so `25` and `25.00` serialize the same.
pub fn normalize_money(value: Decimal) -> Decimal {
    let mut v = value.round_dp(2);
    v.rescale(2);
    v
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Decimal,
    /// Caller-computed line subtotal. Derived from `quantity * price` when absent.
    pub subtotal: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub customer: CustomerSnapshot,
    pub shipping: ShippingSnapshot,
    pub payment: PaymentDescriptor,
    pub items: Vec<CheckoutLine>,
    pub totals: SaleTotals,
    pub order_date: Option<DateTime<Utc>>,
}

/// A normalized line, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSaleItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Decimal,
    pub subtotal: Decimal,
}

/// A validated checkout, independent of the order number it will get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    pub customer: CustomerSnapshot,
    pub shipping: ShippingSnapshot,
    pub payment: PaymentDescriptor,
    pub totals: SaleTotals,
    pub order_date: DateTime<Utc>,
    pub items: Vec<NewSaleItem>,
}

fn require(value: &str, field: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn amount(value: Decimal, field: &str) -> DomainResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(DomainError::validation(format!("{field} must be >= 0")));
    }
    if value > max_amount() {
        return Err(DomainError::validation(format!(
            "{field} must not exceed {}",
            max_amount()
        )));
    }
    Ok(())
}

impl CheckoutLine {
    /// Check the line and return its subtotal, computed from the price in cents.
    fn validate(&self, index: usize) -> DomainResult<Decimal> {
        if self.quantity <= 0 {
            return Err(DomainError::validation(format!(
                "items[{index}].quantity must be > 0"
            )));
        }
        amount(self.price, &format!("items[{index}].price"))?;

        let expected = normalize_money(self.price)
            .checked_mul(Decimal::from(self.quantity))
            .filter(|v| *v <= max_amount())
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "items[{index}]: quantity * price must not exceed {}",
                    max_amount()
                ))
            })
            .map(normalize_money)?;

        if let Some(subtotal) = self.subtotal {
            if normalize_money(subtotal) != expected {
                return Err(DomainError::validation(format!(
                    "items[{index}].subtotal must equal quantity * price"
                )));
            }
        }
        Ok(expected)
    }
}

impl CheckoutRequest {
    pub fn validate(&self) -> DomainResult<()> {
        if self.items.is_empty() {
            return Err(DomainError::validation("items must not be empty"));
        }

        require(&self.customer.first_name, "customer.firstName")?;
        require(&self.customer.last_name, "customer.lastName")?;
        require(&self.customer.email, "customer.email")?;
        if !self.customer.email.contains('@') {
            return Err(DomainError::validation("customer.email is not a valid email"));
        }

        require(&self.shipping.address, "shipping.address")?;
        require(&self.shipping.city, "shipping.city")?;
        require(&self.shipping.country, "shipping.country")?;

        require(&self.payment.method, "payment.method")?;
        if let Some(last4) = &self.payment.card_last4 {
            if last4.len() > MAX_CARD_DIGITS || !last4.chars().all(|c| c.is_ascii_digit()) {
                return Err(DomainError::validation(
                    "payment.cardLast4 must be at most 4 digits",
                ));
            }
        }

        amount(self.totals.subtotal, "totals.subtotal")?;
        amount(self.totals.shipping, "totals.shipping")?;
        amount(self.totals.tax, "totals.tax")?;
        amount(self.totals.total, "totals.total")?;

        for (index, line) in self.items.iter().enumerate() {
            line.validate(index)?;
        }

        Ok(())
    }

    /// Validate and normalize. `now` is used when no order date was supplied.
    pub fn prepare(self, now: DateTime<Utc>) -> DomainResult<NewSale> {
        self.validate()?;

        let items = self
            .items
            .into_iter()
            .enumerate()
            .map(|(index, line)| {
                let subtotal = line.validate(index)?;
                Ok(NewSaleItem {
                    product_id: line.product_id,
                    product_name: line.product_name,
                    quantity: line.quantity,
                    size: line.size,
                    color: line.color,
                    price: normalize_money(line.price),
                    subtotal,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let payment = PaymentDescriptor {
            method: self.payment.method,
            card_last4: self.payment.card_last4.filter(|s| !s.is_empty()),
        };

        Ok(NewSale {
            customer: self.customer,
            shipping: self.shipping,
            payment,
            totals: SaleTotals {
                subtotal: normalize_money(self.totals.subtotal),
                shipping: normalize_money(self.totals.shipping),
                tax: normalize_money(self.totals.tax),
                total: normalize_money(self.totals.total),
            },
            order_date: self.order_date.unwrap_or(now),
            items,
        })
    }
}

impl NewSale {
    /// Ledger view of the lines, in request order.
    pub fn stock_requests(&self) -> Vec<StockRequest> {
        self.items
            .iter()
            .map(|line| StockRequest {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
            })
            .collect()
    }

    /// Build the records for one persistence attempt. Status starts at `completed`.
    pub fn materialize(&self, order_number: OrderNumber, now: DateTime<Utc>) -> SaleWithItems {
        let sale_id = SaleId::new();
        let sale = Sale {
            id: sale_id,
            order_number,
            customer: self.customer.clone(),
            shipping: self.shipping.clone(),
            payment: self.payment.clone(),
            totals: self.totals,
            status: SaleStatus::Completed,
            order_date: self.order_date,
            created_at: now,
            updated_at: now,
        };

        let items = self
            .items
            .iter()
            .map(|line| SaleItem {
                id: SaleItemId::new(),
                sale_id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                size: line.size.clone(),
                color: line.color.clone(),
                price: line.price,
                subtotal: line.subtotal,
            })
            .collect();

        SaleWithItems { sale, items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    fn line(product_id: ProductId, quantity: i32, price: i64) -> CheckoutLine {
        CheckoutLine {
            product_id,
            product_name: "Line".to_string(),
            quantity,
            size: Some("M".to_string()),
            color: None,
            price: d(price),
            subtotal: None,
        }
    }

    fn request(items: Vec<CheckoutLine>) -> CheckoutRequest {
        CheckoutRequest {
            customer: CustomerSnapshot {
                first_name: "Ana".to_string(),
                last_name: "Diaz".to_string(),
                email: "ana@example.com".to_string(),
                phone: None,
            },
            shipping: ShippingSnapshot {
                address: "1 Main St".to_string(),
                city: "Lima".to_string(),
                state: String::new(),
                zip_code: String::new(),
                country: "PE".to_string(),
            },
            payment: PaymentDescriptor {
                method: "card".to_string(),
                card_last4: Some("4242".to_string()),
            },
            items,
            totals: SaleTotals {
                subtotal: d(25),
                shipping: d(0),
                tax: d(0),
                total: d(25),
            },
            order_date: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn prepare_derives_line_subtotals() {
        let a = ProductId::new();
        let b = ProductId::new();
        let new_sale = request(vec![line(a, 2, 10), line(b, 1, 5)])
            .prepare(now())
            .unwrap();

        assert_eq!(new_sale.items[0].subtotal, d(20));
        assert_eq!(new_sale.items[1].subtotal, d(5));
        assert_eq!(new_sale.totals.subtotal.to_string(), "25.00");
        assert_eq!(new_sale.order_date, now());
    }

    #[test]
    fn materialize_links_items_and_starts_completed() {
        let new_sale = request(vec![line(ProductId::new(), 2, 10)])
            .prepare(now())
            .unwrap();
        let record = new_sale.materialize(OrderNumber::from_stored("ORD-1-ABCDEF".to_string()), now());

        assert_eq!(record.sale.status, SaleStatus::Completed);
        assert_eq!(record.sale.order_number.as_str(), "ORD-1-ABCDEF");
        assert!(record.items.iter().all(|i| i.sale_id == record.sale.id));
    }

    #[test]
    fn rejects_empty_items() {
        let err = request(vec![]).validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_non_positive_quantity() {
        let err = request(vec![line(ProductId::new(), 0, 10)])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("quantity"));
    }

    #[test]
    fn rejects_inconsistent_line_subtotal() {
        let mut l = line(ProductId::new(), 2, 10);
        l.subtotal = Some(d(15));
        assert!(request(vec![l.clone()]).validate().is_err());

        l.subtotal = Some(Decimal::new(2000, 2));
        assert!(request(vec![l]).validate().is_ok());
    }

    #[test]
    fn sub_cent_prices_are_rounded_before_the_subtotal() {
        let mut l = line(ProductId::new(), 2, 0);
        l.price = Decimal::new(2505, 3);

        let new_sale = request(vec![l.clone()]).prepare(now()).unwrap();
        let item = &new_sale.items[0];
        assert_eq!(item.price.to_string(), "2.50");
        assert_eq!(item.subtotal, item.price * Decimal::from(item.quantity));
        assert_eq!(item.subtotal.to_string(), "5.00");

        l.subtotal = Some(Decimal::new(501, 2));
        assert!(request(vec![l]).validate().is_err());
    }

    #[test]
    fn oversized_amounts_are_validation_errors() {
        let mut huge_price = line(ProductId::new(), 2, 0);
        huge_price.price = Decimal::MAX;
        let err = request(vec![huge_price]).prepare(now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut overflowing_line = line(ProductId::new(), i32::MAX, 0);
        overflowing_line.price = max_amount();
        let err = request(vec![overflowing_line]).prepare(now()).unwrap_err();
        assert!(err.to_string().contains("quantity * price"));

        let mut req = request(vec![line(ProductId::new(), 1, 25)]);
        req.totals.total = Decimal::MAX;
        assert!(matches!(req.validate(), Err(DomainError::Validation(_))));

        let mut at_limit = line(ProductId::new(), 1, 0);
        at_limit.price = max_amount();
        assert!(request(vec![at_limit]).validate().is_ok());
    }

    #[test]
    fn rejects_full_card_numbers() {
        let mut req = request(vec![line(ProductId::new(), 1, 10)]);
        req.payment.card_last4 = Some("4242424242424242".to_string());
        assert!(req.validate().is_err());
    }

    #[test]
    fn stock_requests_keep_request_order() {
        let a = ProductId::new();
        let b = ProductId::new();
        let new_sale = request(vec![line(b, 1, 5), line(a, 2, 10)])
            .prepare(now())
            .unwrap();
        let ids: Vec<_> = new_sale.stock_requests().iter().map(|r| r.product_id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn normalize_money_rounds_to_cents() {
        assert_eq!(normalize_money(Decimal::new(10_005, 3)).to_string(), "10.00");
        assert_eq!(normalize_money(d(7)).to_string(), "7.00");
    }
}
