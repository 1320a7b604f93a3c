//! PostgreSQL implementation of the persistence contract.
//!
//! Every `lock_*` call is a `SELECT ... FOR UPDATE` inside the transaction,
//! so concurrent units of work on one order or one product queue up on the
//! row lock instead of overwriting each other.

use async_trait::async_trait;
use bazaar_core::{CoreError, CoreResult, Store, StoreTx};
use bazaar_shared::models::{
    DailyRevenue, Order, OrderId, OrderItem, OrderStatus, OrderSummary, PaymentDetails, Product,
    ProductId, ReturnId, ReturnRequest, ShippingDetails, StageTimestamps, TopProduct, UserId,
};
use bazaar_shared::Masked;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;

const ORDER_COLUMNS: &str = "id, order_number, user_id, subtotal, shipping_cost, total_amount, \
    status, payment_method, payment_status, payment_provider, sender_number, transaction_id, \
    shipping_name, shipping_phone, shipping_address, shipping_city, shipping_postal_code, \
    shipping_notes, processing_time, packed_time, shipped_time, out_for_delivery_time, \
    delivered_time, created_at, updated_at";

const PRODUCT_COLUMNS: &str =
    "id, title, price, discount_percent, stock, main_image, created_at, updated_at";

const RETURN_COLUMNS: &str = "id, order_id, user_id, reason, reason_category, product_id, \
    contact_phone, contact_email, photo_urls, status, created_at, completed_at";

fn db_error(e: sqlx::Error) -> CoreError {
    tracing::error!("Database error: {}", e);
    CoreError::internal(e)
}

fn to_db_int(value: u32, what: &str) -> CoreResult<i32> {
    i32::try_from(value).map_err(|_| CoreError::InternalError(format!("{} out of range: {}", what, value)))
}

fn to_db_bigint(value: u64, what: &str) -> CoreResult<i64> {
    i64::try_from(value).map_err(|_| CoreError::ValidationError(format!("{} out of range: {}", what, value)))
}

fn from_db_count(value: i64, what: &str) -> CoreResult<u64> {
    u64::try_from(value).map_err(|_| CoreError::InternalError(format!("{} is negative: {}", what, value)))
}

fn from_db_int(value: i32, what: &str) -> CoreResult<u32> {
    u32::try_from(value).map_err(|_| CoreError::InternalError(format!("stored {} is negative: {}", what, value)))
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    user_id: i64,
    subtotal: Decimal,
    shipping_cost: Decimal,
    total_amount: Decimal,
    status: String,
    payment_method: String,
    payment_status: String,
    payment_provider: Option<String>,
    sender_number: Option<String>,
    transaction_id: Option<String>,
    shipping_name: String,
    shipping_phone: String,
    shipping_address: String,
    shipping_city: String,
    shipping_postal_code: String,
    shipping_notes: Option<String>,
    processing_time: Option<DateTime<Utc>>,
    packed_time: Option<DateTime<Utc>>,
    shipped_time: Option<DateTime<Utc>>,
    out_for_delivery_time: Option<DateTime<Utc>>,
    delivered_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> CoreResult<Order> {
        Ok(Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            items,
            subtotal: self.subtotal,
            shipping_cost: self.shipping_cost,
            total_amount: self.total_amount,
            status: self.status.parse().map_err(CoreError::internal)?,
            payment_method: self.payment_method.parse().map_err(CoreError::internal)?,
            payment_status: self.payment_status.parse().map_err(CoreError::internal)?,
            payment: PaymentDetails {
                provider: self.payment_provider,
                sender_number: self.sender_number,
                transaction_id: self.transaction_id,
            },
            shipping: ShippingDetails {
                name: self.shipping_name,
                phone: Masked::new(self.shipping_phone),
                address: self.shipping_address,
                city: self.shipping_city,
                postal_code: self.shipping_postal_code,
                notes: self.shipping_notes,
            },
            timestamps: StageTimestamps {
                processing_time: self.processing_time,
                packed_time: self.packed_time,
                shipped_time: self.shipped_time,
                out_for_delivery_time: self.out_for_delivery_time,
                delivered_time: self.delivered_time,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: i64,
    product_id: i64,
    quantity: i32,
    selected_size: String,
    unit_price: Decimal,
    total_price: Decimal,
    product_title: String,
    product_image: String,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i64,
    title: String,
    price: Decimal,
    discount_percent: i32,
    stock: i32,
    main_image: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = CoreError;

    fn try_from(row: ProductRow) -> CoreResult<Self> {
        Ok(Product {
            id: row.id,
            title: row.title,
            price: row.price,
            discount_percent: from_db_int(row.discount_percent, "discount")?,
            stock: from_db_int(row.stock, "stock")?,
            main_image: row.main_image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReturnRow {
    id: i64,
    order_id: i64,
    user_id: i64,
    reason: String,
    reason_category: Option<String>,
    product_id: Option<i64>,
    contact_phone: Option<String>,
    contact_email: Option<String>,
    photo_urls: Vec<String>,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ReturnRow> for ReturnRequest {
    type Error = CoreError;

    fn try_from(row: ReturnRow) -> CoreResult<Self> {
        Ok(ReturnRequest {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            reason: row.reason,
            reason_category: row.reason_category,
            product_id: row.product_id,
            contact_phone: row.contact_phone.map(Masked::new),
            contact_email: row.contact_email.map(Masked::new),
            photo_urls: row.photo_urls,
            status: row.status.parse().map_err(CoreError::internal)?,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

async fn load_items(
    conn: &mut PgConnection,
    order_ids: &[i64],
) -> CoreResult<HashMap<i64, Vec<OrderItem>>> {
    let rows: Vec<OrderItemRow> = sqlx::query_as(
        "SELECT order_id, product_id, quantity, selected_size, unit_price, total_price, \
         product_title, product_image \
         FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error)?;

    let mut by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        by_order.entry(row.order_id).or_default().push(OrderItem {
            product_id: row.product_id,
            quantity: from_db_int(row.quantity, "quantity")?,
            selected_size: row.selected_size,
            unit_price: row.unit_price,
            total_price: row.total_price,
            product_title: row.product_title,
            product_image: row.product_image,
        });
    }
    Ok(by_order)
}

async fn assemble_orders(conn: &mut PgConnection, rows: Vec<OrderRow>) -> CoreResult<Vec<Order>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut items = load_items(conn, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let lines = items.remove(&row.id).unwrap_or_default();
            row.into_order(lines)
        })
        .collect()
}

async fn fetch_order(conn: &mut PgConnection, id: OrderId, lock: bool) -> CoreResult<Option<Order>> {
    let sql = format!(
        "SELECT {} FROM orders WHERE id = $1{}",
        ORDER_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );
    let row: Option<OrderRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;

    match row {
        Some(row) => Ok(assemble_orders(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn lock_product_row(conn: &mut PgConnection, id: ProductId) -> CoreResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE id = $1 FOR UPDATE", PRODUCT_COLUMNS);
    let row: Option<ProductRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    row.map(Product::try_from).transpose()
}

async fn fetch_return(conn: &mut PgConnection, clause: &str, key: i64) -> CoreResult<Option<ReturnRequest>> {
    let sql = format!("SELECT {} FROM return_requests WHERE {}", RETURN_COLUMNS, clause);
    let row: Option<ReturnRow> = sqlx::query_as(&sql)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    row.map(ReturnRequest::try_from).transpose()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn query_orders(&self, clause: &str, bind: ListBind) -> CoreResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        let sql = format!("SELECT {} FROM orders {}", ORDER_COLUMNS, clause);
        let query = sqlx::query_as::<_, OrderRow>(&sql);
        let query = match bind {
            ListBind::User(user_id) => query.bind(user_id),
            ListBind::Status(status) => query.bind(status.as_str()),
            ListBind::Page { offset, limit } => query.bind(offset).bind(limit),
        };
        let rows = query.fetch_all(&mut *conn).await.map_err(db_error)?;
        assemble_orders(&mut conn, rows).await
    }
}

enum ListBind {
    User(UserId),
    Status(OrderStatus),
    Page { offset: i64, limit: i64 },
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> CoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await.map_err(db_error)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn get_order(&self, id: OrderId) -> CoreResult<Option<Order>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_order(&mut conn, id, false).await
    }

    async fn get_return_by_order(&self, order_id: OrderId) -> CoreResult<Option<ReturnRequest>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        fetch_return(&mut conn, "order_id = $1", order_id).await
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> CoreResult<Vec<Order>> {
        self.query_orders(
            "WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
            ListBind::User(user_id),
        )
        .await
    }

    async fn list_orders_by_status(&self, status: OrderStatus) -> CoreResult<Vec<Order>> {
        self.query_orders(
            "WHERE status = $1 ORDER BY created_at ASC, id ASC",
            ListBind::Status(status),
        )
        .await
    }

    async fn list_orders(&self, offset: u64, limit: u64) -> CoreResult<Vec<Order>> {
        let bind = ListBind::Page {
            offset: to_db_bigint(offset, "offset")?,
            limit: to_db_bigint(limit, "limit")?,
        };
        self.query_orders("ORDER BY created_at DESC, id DESC OFFSET $1 LIMIT $2", bind)
            .await
    }

    async fn list_returns(&self) -> CoreResult<Vec<ReturnRequest>> {
        let sql = format!(
            "SELECT {} FROM return_requests ORDER BY created_at DESC, id DESC",
            RETURN_COLUMNS
        );
        let rows: Vec<ReturnRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.into_iter().map(ReturnRequest::try_from).collect()
    }

    async fn count_orders(&self) -> CoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        from_db_count(count, "order count")
    }

    async fn sales_since(&self, since: DateTime<Utc>) -> CoreResult<OrderSummary> {
        let (orders, revenue): (i64, Decimal) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_amount) FILTER (WHERE status <> $2), 0) \
             FROM orders WHERE created_at >= $1",
        )
        .bind(since)
        .bind(OrderStatus::Cancelled.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(OrderSummary {
            orders: from_db_count(orders, "order count")?,
            revenue,
        })
    }

    async fn units_sold_since(&self, since: DateTime<Utc>) -> CoreResult<u64> {
        let units: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(oi.quantity), 0)::BIGINT \
             FROM order_items oi JOIN orders o ON o.id = oi.order_id \
             WHERE o.created_at >= $1 AND o.status <> $2",
        )
        .bind(since)
        .bind(OrderStatus::Cancelled.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        from_db_count(units, "units sold")
    }

    async fn daily_revenue_since(&self, since: DateTime<Utc>) -> CoreResult<Vec<DailyRevenue>> {
        let rows: Vec<(NaiveDate, Decimal)> = sqlx::query_as(
            "SELECT (created_at AT TIME ZONE 'UTC')::DATE AS day, SUM(total_amount) \
             FROM orders WHERE created_at >= $1 AND status <> $2 \
             GROUP BY day ORDER BY day",
        )
        .bind(since)
        .bind(OrderStatus::Cancelled.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows
            .into_iter()
            .map(|(day, amount)| DailyRevenue { day, amount })
            .collect())
    }

    async fn top_products(&self, limit: usize) -> CoreResult<Vec<TopProduct>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            "SELECT oi.product_id, MIN(oi.product_title), SUM(oi.quantity)::BIGINT AS quantity \
             FROM order_items oi JOIN orders o ON o.id = oi.order_id \
             WHERE o.status <> $1 \
             GROUP BY oi.product_id ORDER BY quantity DESC, oi.product_id ASC LIMIT $2",
        )
        .bind(OrderStatus::Cancelled.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter()
            .map(|(product_id, title, quantity)| {
                Ok(TopProduct {
                    product_id,
                    title,
                    quantity: from_db_count(quantity, "quantity")?,
                })
            })
            .collect()
    }
}

/// Open database transaction. Dropping it rolls back.
struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_order(&mut self, id: OrderId) -> CoreResult<Option<Order>> {
        fetch_order(&mut self.tx, id, true).await
    }

    async fn insert_order(&mut self, mut order: Order) -> CoreResult<Order> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO orders (order_number, user_id, subtotal, shipping_cost, total_amount, \
             status, payment_method, payment_status, payment_provider, sender_number, \
             transaction_id, shipping_name, shipping_phone, shipping_address, shipping_city, \
             shipping_postal_code, shipping_notes, processing_time, packed_time, shipped_time, \
             out_for_delivery_time, delivered_time, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22, $23, $24) RETURNING id",
        )
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(order.subtotal)
        .bind(order.shipping_cost)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.payment.provider)
        .bind(&order.payment.sender_number)
        .bind(&order.payment.transaction_id)
        .bind(&order.shipping.name)
        .bind(order.shipping.phone.expose())
        .bind(&order.shipping.address)
        .bind(&order.shipping.city)
        .bind(&order.shipping.postal_code)
        .bind(&order.shipping.notes)
        .bind(order.timestamps.processing_time)
        .bind(order.timestamps.packed_time)
        .bind(order.timestamps.shipped_time)
        .bind(order.timestamps.out_for_delivery_time)
        .bind(order.timestamps.delivered_time)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error)?;

        for (position, item) in order.items.iter().enumerate() {
            let position = u32::try_from(position).map_err(CoreError::internal)?;
            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, quantity, selected_size, \
                 unit_price, total_price, product_title, product_image) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(id)
            .bind(to_db_int(position, "line position")?)
            .bind(item.product_id)
            .bind(to_db_int(item.quantity, "quantity")?)
            .bind(&item.selected_size)
            .bind(item.unit_price)
            .bind(item.total_price)
            .bind(&item.product_title)
            .bind(&item.product_image)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;
        }

        order.id = id;
        Ok(order)
    }

    async fn save_order(&mut self, order: &Order) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, payment_status = $3, processing_time = $4, \
             packed_time = $5, shipped_time = $6, out_for_delivery_time = $7, \
             delivered_time = $8, updated_at = $9 WHERE id = $1",
        )
        .bind(order.id)
        .bind(order.status.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.timestamps.processing_time)
        .bind(order.timestamps.packed_time)
        .bind(order.timestamps.shipped_time)
        .bind(order.timestamps.out_for_delivery_time)
        .bind(order.timestamps.delivered_time)
        .bind(order.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Order", order.id));
        }
        Ok(())
    }

    async fn lock_product(&mut self, id: ProductId) -> CoreResult<Option<Product>> {
        lock_product_row(&mut self.tx, id).await
    }

    async fn save_product_stock(
        &mut self,
        id: ProductId,
        stock: u32,
        updated_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let result = sqlx::query("UPDATE products SET stock = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(to_db_int(stock, "stock")?)
            .bind(updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Product", id));
        }
        Ok(())
    }

    async fn find_return_by_order(
        &mut self,
        order_id: OrderId,
    ) -> CoreResult<Option<ReturnRequest>> {
        fetch_return(&mut self.tx, "order_id = $1", order_id).await
    }

    async fn insert_return(&mut self, mut request: ReturnRequest) -> CoreResult<ReturnRequest> {
        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO return_requests (order_id, user_id, reason, reason_category, product_id, \
             contact_phone, contact_email, photo_urls, status, created_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
        )
        .bind(request.order_id)
        .bind(request.user_id)
        .bind(&request.reason)
        .bind(&request.reason_category)
        .bind(request.product_id)
        .bind(request.contact_phone.as_ref().map(|p| p.expose().as_str()))
        .bind(request.contact_email.as_ref().map(|e| e.expose().as_str()))
        .bind(&request.photo_urls)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.completed_at)
        .fetch_one(&mut *self.tx)
        .await;

        match inserted {
            Ok(id) => {
                request.id = id;
                Ok(request)
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CoreError::DuplicateReturn(request.order_id))
            }
            Err(e) => Err(db_error(e)),
        }
    }

    async fn lock_return(&mut self, id: ReturnId) -> CoreResult<Option<ReturnRequest>> {
        fetch_return(&mut self.tx, "id = $1 FOR UPDATE", id).await
    }

    async fn save_return(&mut self, request: &ReturnRequest) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE return_requests SET status = $2, completed_at = $3 WHERE id = $1",
        )
        .bind(request.id)
        .bind(request.status.as_str())
        .bind(request.completed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("Return request", request.id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let PgTx { tx } = *self;
        tx.commit().await.map_err(db_error)
    }
}
