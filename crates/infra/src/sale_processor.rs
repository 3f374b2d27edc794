//! Checkout orchestration.
//!
//! One call to [`SaleProcessor::process`] is one atomic unit of work: lock the
//! referenced products, assess every line, and only when nothing falls short
//! insert the sale, its items and the stock debits, then commit. Any error
//! before commit drops the unit of work, which rolls it back.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{Span, instrument};

use stylehub_core::{DomainError, ProductId};
use stylehub_inventory::{AvailabilityCheck, StockShortfall};
use stylehub_sales::{CheckoutRequest, NewSale, OrderNumber, SaleWithItems};

use crate::store::{ORDER_NUMBER_CONSTRAINT, SalesStore, StoreError};

/// Attempts per checkout when the generated order number collides.
pub const MAX_ORDER_NUMBER_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Validation(DomainError),

    #[error("insufficient stock for {} line(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),

    #[error("sale transaction exceeded {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Source of order numbers.
pub trait OrderNumberSource: Send + Sync {
    fn next(&self, now: DateTime<Utc>) -> OrderNumber;
}

/// `ORD-<millis>-<random suffix>` from the thread RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomOrderNumbers;

impl OrderNumberSource for RandomOrderNumbers {
    fn next(&self, now: DateTime<Utc>) -> OrderNumber {
        OrderNumber::generate(now)
    }
}

#[derive(Clone)]
pub struct SaleProcessor {
    store: Arc<dyn SalesStore>,
    tx_timeout: Duration,
    order_numbers: Arc<dyn OrderNumberSource>,
}

impl SaleProcessor {
    pub fn new(store: Arc<dyn SalesStore>, tx_timeout: Duration) -> Self {
        Self {
            store,
            tx_timeout,
            order_numbers: Arc::new(RandomOrderNumbers),
        }
    }

    pub fn with_order_numbers(mut self, source: Arc<dyn OrderNumberSource>) -> Self {
        self.order_numbers = source;
        self
    }

    /// Validate, check stock and persist one checkout.
    ///
    /// Returns every shortfall when any line cannot be fulfilled. Regenerates
    /// the order number (up to [`MAX_ORDER_NUMBER_ATTEMPTS`] attempts) when the
    /// store rejects it as a duplicate; no other failure is retried.
    #[instrument(
        skip(self, request),
        fields(line_count = request.items.len(), order_number, attempts),
        err
    )]
    pub async fn process(&self, request: CheckoutRequest) -> Result<SaleWithItems, CheckoutError> {
        let new_sale = request
            .prepare(Utc::now())
            .map_err(CheckoutError::Validation)?;

        if !new_sale.totals.is_consistent() {
            tracing::warn!(
                subtotal = %new_sale.totals.subtotal,
                shipping = %new_sale.totals.shipping,
                tax = %new_sale.totals.tax,
                total = %new_sale.totals.total,
                "sale total does not equal subtotal + shipping + tax"
            );
        }

        let span = Span::current();
        let mut attempt = 0;
        loop {
            attempt += 1;
            span.record("attempts", attempt);
            let order_number = self.order_numbers.next(Utc::now());

            let outcome = tokio::time::timeout(self.tx_timeout, self.persist(&new_sale, order_number))
                .await;

            match outcome {
                Ok(Ok(record)) => {
                    span.record("order_number", record.sale.order_number.as_str());
                    tracing::info!(sale_id = %record.sale.id, "sale committed");
                    return Ok(record);
                }
                Ok(Err(CheckoutError::Store(e)))
                    if e.is_unique_violation_of(ORDER_NUMBER_CONSTRAINT)
                        && attempt < MAX_ORDER_NUMBER_ATTEMPTS =>
                {
                    tracing::warn!(attempt, "order number collision; regenerating");
                }
                Ok(Err(CheckoutError::InsufficientStock(shortfalls))) => {
                    tracing::info!(shortfalls = shortfalls.len(), "sale rejected: insufficient stock");
                    return Err(CheckoutError::InsufficientStock(shortfalls));
                }
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "sale transaction failed");
                    return Err(e);
                }
                Err(_) => {
                    tracing::error!(timeout = ?self.tx_timeout, "sale transaction timed out");
                    return Err(CheckoutError::TimedOut(self.tx_timeout));
                }
            }
        }
    }

    async fn persist(
        &self,
        new_sale: &NewSale,
        order_number: OrderNumber,
    ) -> Result<SaleWithItems, CheckoutError> {
        let mut uow = self.store.begin().await?;

        let requests = new_sale.stock_requests();
        let mut ids: Vec<ProductId> = requests.iter().map(|r| r.product_id).collect();
        ids.sort();
        ids.dedup();
        uow.lock_products(&ids).await?;

        let mut check = AvailabilityCheck::new();
        for request in &requests {
            let entry = uow.get_stock_and_name(request.product_id).await?;
            check.assess(request, entry.as_ref());
        }

        let debits = match check.finish() {
            Ok(debits) => debits,
            Err(shortfalls) => {
                if let Err(e) = uow.rollback().await {
                    tracing::warn!(error = %e, "rollback after stock shortfall failed");
                }
                return Err(CheckoutError::InsufficientStock(shortfalls));
            }
        };

        let record = new_sale.materialize(order_number, Utc::now());
        uow.insert_sale(&record.sale).await?;
        for (item, debit) in record.items.iter().zip(debits) {
            uow.insert_sale_item(item).await?;
            uow.debit(debit).await?;
        }

        uow.commit().await?;
        Ok(record)
    }
}
