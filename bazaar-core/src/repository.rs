use async_trait::async_trait;
use bazaar_shared::models::{
    DailyRevenue, Order, OrderId, OrderStatus, OrderSummary, Product, ProductId, ReturnId,
    ReturnRequest, TopProduct, UserId,
};
use chrono::{DateTime, Utc};

use crate::{CoreError, CoreResult};

/// Persistence boundary of the fulfillment core.
///
/// Reads outside a transaction see committed state only. Every write goes
/// through a [`StoreTx`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens an atomic unit of work.
    async fn begin(&self) -> CoreResult<Box<dyn StoreTx>>;

    async fn get_order(&self, id: OrderId) -> CoreResult<Option<Order>>;

    async fn get_return_by_order(&self, order_id: OrderId) -> CoreResult<Option<ReturnRequest>>;

    /// Newest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> CoreResult<Vec<Order>>;

    /// Oldest first, i.e. in the order the console works through them.
    async fn list_orders_by_status(&self, status: OrderStatus) -> CoreResult<Vec<Order>>;

    /// Every order, newest first (`created_at DESC, id DESC`), skipping
    /// `offset` and returning at most `limit`.
    async fn list_orders(&self, offset: u64, limit: u64) -> CoreResult<Vec<Order>>;

    /// Newest first.
    async fn list_returns(&self) -> CoreResult<Vec<ReturnRequest>>;

    async fn count_orders(&self) -> CoreResult<u64>;

    // Aggregates below skip cancelled orders wherever money or units are
    // summed. Order counts include them.

    /// Orders with `created_at >= since`.
    async fn sales_since(&self, since: DateTime<Utc>) -> CoreResult<OrderSummary>;

    async fn units_sold_since(&self, since: DateTime<Utc>) -> CoreResult<u64>;

    /// Revenue per UTC day from `since` on, ascending. Days without sales are
    /// absent.
    async fn daily_revenue_since(&self, since: DateTime<Utc>) -> CoreResult<Vec<DailyRevenue>>;

    /// All-time best sellers by quantity, ties broken by product id.
    async fn top_products(&self, limit: usize) -> CoreResult<Vec<TopProduct>>;
}

/// One atomic unit of work.
///
/// `lock_*` reads take a row lock held until commit or drop, so two units
/// touching the same order or product serialize. Dropping the unit without
/// calling [`StoreTx::commit`] discards all of its writes.
#[async_trait]
pub trait StoreTx: Send {
    async fn lock_order(&mut self, id: OrderId) -> CoreResult<Option<Order>>;

    /// Persists a new order and its line items; the returned copy carries
    /// the assigned id.
    async fn insert_order(&mut self, order: Order) -> CoreResult<Order>;

    /// Writes the mutable part of an order: status, payment status, stage
    /// timestamps and `updated_at`. Money fields and line items are fixed at
    /// insert time.
    async fn save_order(&mut self, order: &Order) -> CoreResult<()>;

    async fn lock_product(&mut self, id: ProductId) -> CoreResult<Option<Product>>;

    async fn save_product_stock(
        &mut self,
        id: ProductId,
        stock: u32,
        updated_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    async fn find_return_by_order(&mut self, order_id: OrderId)
        -> CoreResult<Option<ReturnRequest>>;

    async fn insert_return(&mut self, request: ReturnRequest) -> CoreResult<ReturnRequest>;

    async fn lock_return(&mut self, id: ReturnId) -> CoreResult<Option<ReturnRequest>>;

    async fn save_return(&mut self, request: &ReturnRequest) -> CoreResult<()>;

    async fn commit(self: Box<Self>) -> CoreResult<()>;
}

pub async fn require_order(tx: &mut dyn StoreTx, id: OrderId) -> CoreResult<Order> {
    tx.lock_order(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Order", id))
}

pub async fn require_product(tx: &mut dyn StoreTx, id: ProductId) -> CoreResult<Product> {
    tx.lock_product(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Product", id))
}

pub async fn require_return(tx: &mut dyn StoreTx, id: ReturnId) -> CoreResult<ReturnRequest> {
    tx.lock_return(id)
        .await?
        .ok_or_else(|| CoreError::not_found("Return request", id))
}
