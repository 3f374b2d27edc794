//! Postgres-backed store.
//!
//! Every unit of work is one database transaction. Stock rows are locked with
//! `SELECT ... FOR UPDATE` in ascending id order, and the debit is guarded by
//! `WHERE stock >= qty` on top of the `CHECK (stock >= 0)` constraint.
//!
//! SQLx errors are mapped by SQLSTATE in [`super::error`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{Span, instrument};

use stylehub_auth::user::normalize_email;
use stylehub_auth::{Role, UserAccount};
use stylehub_core::{ProductId, SaleId, SaleItemId, UserId};
use stylehub_inventory::{Debit, StockEntry};
use stylehub_products::{NewProduct, Product, ProductAttributes};
use stylehub_sales::{
    CustomerSnapshot, OrderNumber, PaymentDescriptor, Sale, SaleItem, SaleStatus, SaleSummary,
    SaleTotals, SaleWithItems, ShippingSnapshot, TransitionPolicy,
};

use super::error::map_sqlx_error;
use super::{InventoryLedger, SaleFilter, SalesStore, StoreError, UnitOfWork};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const SALE_COLUMNS: &str = r#"
    s.id, s.order_number,
    s.customer_first_name, s.customer_last_name, s.customer_email, s.customer_phone,
    s.shipping_address, s.shipping_city, s.shipping_state, s.shipping_zip_code, s.shipping_country,
    s.payment_method, s.payment_card_last4,
    s.subtotal, s.shipping_cost, s.tax, s.total,
    s.status, s.order_date, s.created_at, s.updated_at
"#;

/// Postgres store over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
}

impl PostgresStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout,
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        lock_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(lock_timeout)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, lock_timeout))
    }

    /// Create tables, constraints and indexes if they are missing.
    #[instrument(skip(self), err)]
    pub async fn bootstrap_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("bootstrap_schema", e))?;
        Ok(())
    }

    async fn begin_tx(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        // SET LOCAL takes no bind parameters; the value is an integer we own.
        let millis = self.lock_timeout.as_millis();
        sqlx::query(&format!("SET LOCAL lock_timeout = {millis}"))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;
        sqlx::query(&format!("SET LOCAL statement_timeout = {millis}"))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_statement_timeout", e))?;

        Ok(tx)
    }

    async fn load_items(&self, sale_id: SaleId) -> Result<Vec<SaleItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, sale_id, product_id, product_name, quantity, size, color, price, subtotal
            FROM sale_items
            WHERE sale_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(sale_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_items", e))?;

        rows.iter()
            .map(sale_item_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("decode_sale_item", e))
    }
}

/// One open transaction.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl InventoryLedger for PgUnitOfWork {
    #[instrument(skip(self, ids), fields(product_count = ids.len()), err)]
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<(), StoreError> {
        let mut ids: Vec<uuid::Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        ids.sort();
        ids.dedup();

        sqlx::query("SELECT id FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_products", e))?;
        Ok(())
    }

    async fn get_stock_and_name(&mut self, id: ProductId) -> Result<Option<StockEntry>, StoreError> {
        let row = sqlx::query("SELECT name, stock FROM products WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_stock_and_name", e))?;

        row.map(|r| -> Result<StockEntry, sqlx::Error> {
            Ok(StockEntry {
                name: r.try_get("name")?,
                stock: r.try_get("stock")?,
            })
        })
        .transpose()
        .map_err(|e| map_sqlx_error("decode_stock", e))
    }

    #[instrument(
        skip(self),
        fields(product_id = %debit.product_id, quantity = debit.quantity),
        err
    )]
    async fn debit(&mut self, debit: Debit) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock = stock - $1, units_sold = units_sold + $1, updated_at = NOW()
            WHERE id = $2 AND stock >= $1
            "#,
        )
        .bind(debit.quantity)
        .bind(debit.product_id.as_uuid())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("debit", e))?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM products WHERE id = $1")
                .bind(debit.product_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error("debit", e))?
                .is_some();
            return Err(if exists {
                StoreError::InsufficientStock(debit.product_id)
            } else {
                StoreError::NotFound
            });
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    #[instrument(skip(self, sale), fields(sale_id = %sale.id, order_number = %sale.order_number), err)]
    async fn insert_sale(&mut self, sale: &Sale) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, order_number,
                customer_first_name, customer_last_name, customer_email, customer_phone,
                shipping_address, shipping_city, shipping_state, shipping_zip_code, shipping_country,
                payment_method, payment_card_last4,
                subtotal, shipping_cost, tax, total,
                status, order_date, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21
            )
            "#,
        )
        .bind(sale.id.as_uuid())
        .bind(sale.order_number.as_str())
        .bind(&sale.customer.first_name)
        .bind(&sale.customer.last_name)
        .bind(&sale.customer.email)
        .bind(&sale.customer.phone)
        .bind(&sale.shipping.address)
        .bind(&sale.shipping.city)
        .bind(&sale.shipping.state)
        .bind(&sale.shipping.zip_code)
        .bind(&sale.shipping.country)
        .bind(&sale.payment.method)
        .bind(&sale.payment.card_last4)
        .bind(sale.totals.subtotal)
        .bind(sale.totals.shipping)
        .bind(sale.totals.tax)
        .bind(sale.totals.total)
        .bind(sale.status.as_str())
        .bind(sale.order_date)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_sale", e))?;
        Ok(())
    }

    async fn insert_sale_item(&mut self, item: &SaleItem) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, product_name, quantity, size, color, price, subtotal
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id.as_uuid())
        .bind(item.sale_id.as_uuid())
        .bind(item.product_id.as_uuid())
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(&item.size)
        .bind(&item.color)
        .bind(item.price)
        .bind(item.subtotal)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_sale_item", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit", e))
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

#[async_trait]
impl SalesStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.begin_tx().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    #[instrument(skip(self), fields(sale_id = %id), err)]
    async fn get_sale(&self, id: SaleId) -> Result<Option<SaleWithItems>, StoreError> {
        let row = sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales s WHERE s.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_sale", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let sale = sale_from_row(&row)?;
        let items = self.load_items(id).await?;
        Ok(Some(SaleWithItems { sale, items }))
    }

    #[instrument(skip(self), fields(sale_count = tracing::field::Empty), err)]
    async fn list_sales(&self, filter: &SaleFilter) -> Result<Vec<SaleSummary>, StoreError> {
        let span = Span::current();

        let status: Option<&str> = filter.status.as_ref().map(|s| s.as_str());
        let month: Option<i32> = filter.month.map(|(m, _)| m as i32);
        let year: Option<i32> = filter.month.map(|(_, y)| y);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {SALE_COLUMNS},
                COUNT(si.id) AS items_count,
                COALESCE(SUM(si.quantity), 0)::BIGINT AS total_items
            FROM sales s
            LEFT JOIN sale_items si ON si.sale_id = s.id
            WHERE ($1::text IS NULL OR s.status = $1)
                AND ($2::timestamptz IS NULL OR s.order_date >= $2)
                AND ($3::timestamptz IS NULL OR s.order_date <= $3)
                AND ($4::int IS NULL OR (
                    EXTRACT(MONTH FROM s.order_date AT TIME ZONE 'UTC') = $4
                    AND EXTRACT(YEAR FROM s.order_date AT TIME ZONE 'UTC') = $5
                ))
            GROUP BY s.id
            ORDER BY s.order_date DESC
            "#
        ))
        .bind(status)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .bind(month)
        .bind(year)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_sales", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(SaleSummary {
                sale: sale_from_row(row)?,
                items_count: row
                    .try_get("items_count")
                    .map_err(|e| map_sqlx_error("decode_sale_summary", e))?,
                total_items: row
                    .try_get("total_items")
                    .map_err(|e| map_sqlx_error("decode_sale_summary", e))?,
            });
        }

        span.record("sale_count", out.len());
        Ok(out)
    }

    #[instrument(skip(self), fields(sale_id = %id, status = %status), err)]
    async fn update_sale_status(
        &self,
        id: SaleId,
        status: SaleStatus,
        policy: TransitionPolicy,
    ) -> Result<Sale, StoreError> {
        let mut tx = self.begin_tx().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM sales WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_sale_status", e))?;
        let current = current.ok_or(StoreError::NotFound)?;
        let current: SaleStatus = current
            .parse()
            .map_err(|_| StoreError::Database(format!("unknown stored status '{current}'")))?;

        policy.ensure_allowed(current, status)?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE sales s SET status = $1, updated_at = NOW()
            WHERE s.id = $2
            RETURNING {SALE_COLUMNS}
            "#
        ))
        .bind(status.as_str())
        .bind(id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_sale_status", e))?;
        let sale = sale_from_row(&row)?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update_sale_status", e))?;
        Ok(sale)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, category, description, price, old_price, stock, sku, badge,
                rating, units_sold, attributes, images, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref()
            .map(product_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("decode_product", e))
    }

    #[instrument(skip(self, product), fields(sku = %product.sku), err)]
    async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        product.validate()?;
        let product = product.into_product(ProductId::new(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, description, price, old_price, stock, sku, badge,
                rating, units_sold, attributes, images, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.old_price)
        .bind(product.stock)
        .bind(&product.sku)
        .bind(&product.badge)
        .bind(product.rating)
        .bind(product.units_sold)
        .bind(Json(&product.attributes))
        .bind(Json(&product.images))
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        Ok(product)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, phone, role, avatar, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_email", e))?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(|e| map_sqlx_error("decode_user", e))
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, phone, role, avatar, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(&user.avatar)
        .bind(user.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }
}

// -------------------------
// Row mapping
// -------------------------

fn sale_from_row(row: &PgRow) -> Result<Sale, StoreError> {
    let decode = |e| map_sqlx_error("decode_sale", e);

    let status: String = row.try_get("status").map_err(decode)?;
    let status: SaleStatus = status
        .parse()
        .map_err(|_| StoreError::Database(format!("unknown stored status '{status}'")))?;

    let id: uuid::Uuid = row.try_get("id").map_err(decode)?;
    let order_number: String = row.try_get("order_number").map_err(decode)?;
    let subtotal: Decimal = row.try_get("subtotal").map_err(decode)?;
    let shipping: Decimal = row.try_get("shipping_cost").map_err(decode)?;
    let tax: Decimal = row.try_get("tax").map_err(decode)?;
    let total: Decimal = row.try_get("total").map_err(decode)?;
    let order_date: DateTime<Utc> = row.try_get("order_date").map_err(decode)?;

    Ok(Sale {
        id: SaleId::from_uuid(id),
        order_number: OrderNumber::from_stored(order_number),
        customer: CustomerSnapshot {
            first_name: row.try_get("customer_first_name").map_err(decode)?,
            last_name: row.try_get("customer_last_name").map_err(decode)?,
            email: row.try_get("customer_email").map_err(decode)?,
            phone: row.try_get("customer_phone").map_err(decode)?,
        },
        shipping: ShippingSnapshot {
            address: row.try_get("shipping_address").map_err(decode)?,
            city: row.try_get("shipping_city").map_err(decode)?,
            state: row.try_get("shipping_state").map_err(decode)?,
            zip_code: row.try_get("shipping_zip_code").map_err(decode)?,
            country: row.try_get("shipping_country").map_err(decode)?,
        },
        payment: PaymentDescriptor {
            method: row.try_get("payment_method").map_err(decode)?,
            card_last4: row.try_get("payment_card_last4").map_err(decode)?,
        },
        totals: SaleTotals {
            subtotal,
            shipping,
            tax,
            total,
        },
        status,
        order_date,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn sale_item_from_row(row: &PgRow) -> Result<SaleItem, sqlx::Error> {
    let id: uuid::Uuid = row.try_get("id")?;
    let sale_id: uuid::Uuid = row.try_get("sale_id")?;
    let product_id: uuid::Uuid = row.try_get("product_id")?;
    Ok(SaleItem {
        id: SaleItemId::from_uuid(id),
        sale_id: SaleId::from_uuid(sale_id),
        product_id: ProductId::from_uuid(product_id),
        product_name: row.try_get("product_name")?,
        quantity: row.try_get("quantity")?,
        size: row.try_get("size")?,
        color: row.try_get("color")?,
        price: row.try_get("price")?,
        subtotal: row.try_get("subtotal")?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, sqlx::Error> {
    let id: uuid::Uuid = row.try_get("id")?;
    let attributes: Json<ProductAttributes> = row.try_get("attributes")?;
    let images: Json<Vec<String>> = row.try_get("images")?;
    Ok(Product {
        id: ProductId::from_uuid(id),
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        description: row.try_get("description")?,
        price: row.try_get("price")?,
        old_price: row.try_get("old_price")?,
        stock: row.try_get("stock")?,
        sku: row.try_get("sku")?,
        badge: row.try_get("badge")?,
        rating: row.try_get("rating")?,
        units_sold: row.try_get("units_sold")?,
        attributes: attributes.0,
        images: images.0,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn user_from_row(row: &PgRow) -> Result<UserAccount, sqlx::Error> {
    let id: uuid::Uuid = row.try_get("id")?;
    let role: String = row.try_get("role")?;
    Ok(UserAccount {
        id: UserId::from_uuid(id),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        phone: row.try_get("phone")?,
        role: Role::new(role),
        avatar: row.try_get("avatar")?,
        created_at: row.try_get("created_at")?,
    })
}

