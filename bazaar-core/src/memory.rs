//! In-process [`Store`] backed by a single mutex.
//!
//! A transaction holds the mutex for its whole lifetime and works on a copy
//! of the state; `commit` swaps the copy in, dropping the transaction throws
//! it away. That gives the same serialization and all-or-nothing guarantees
//! the PostgreSQL store gets from row locks, just with coarser granularity.

use async_trait::async_trait;
use bazaar_shared::models::{
    DailyRevenue, Order, OrderId, OrderStatus, OrderSummary, Product, ProductId, ReturnId,
    ReturnRequest, TopProduct, UserId,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::repository::{Store, StoreTx};
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: BTreeMap<OrderId, Order>,
    products: BTreeMap<ProductId, Product>,
    returns: BTreeMap<ReturnId, ReturnRequest>,
    last_order_id: OrderId,
    last_return_id: ReturnId,
    failing_products: HashSet<ProductId>,
}

impl MemoryState {
    fn sales_from(&self, since: DateTime<Utc>) -> impl Iterator<Item = &Order> + '_ {
        self.orders
            .values()
            .filter(move |o| o.created_at >= since && o.status != OrderStatus::Cancelled)
    }
}

fn newest_first(a: &Order, b: &Order) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog management is outside the core; this is how products get in.
    pub async fn insert_product(&self, product: Product) {
        let mut state = self.state.lock().await;
        state.products.insert(product.id, product);
    }

    pub async fn product_stock(&self, id: ProductId) -> Option<u32> {
        let state = self.state.lock().await;
        state.products.get(&id).map(|p| p.stock)
    }

    /// Makes every later stock write for `id` fail, to exercise rollback.
    #[cfg(any(test, feature = "testing"))]
    pub async fn fail_stock_writes_for(&self, id: ProductId) {
        let mut state = self.state.lock().await;
        state.failing_products.insert(id);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> CoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn get_order(&self, id: OrderId) -> CoreResult<Option<Order>> {
        let state = self.state.lock().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn get_return_by_order(&self, order_id: OrderId) -> CoreResult<Option<ReturnRequest>> {
        let state = self.state.lock().await;
        Ok(state
            .returns
            .values()
            .find(|r| r.order_id == order_id)
            .cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> CoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(newest_first);
        Ok(orders)
    }

    async fn list_orders_by_status(&self, status: OrderStatus) -> CoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(orders)
    }

    async fn list_orders(&self, offset: u64, limit: u64) -> CoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<&Order> = state.orders.values().collect();
        orders.sort_by(|a, b| newest_first(a, b));
        Ok(orders
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn list_returns(&self) -> CoreResult<Vec<ReturnRequest>> {
        let state = self.state.lock().await;
        let mut returns: Vec<ReturnRequest> = state.returns.values().cloned().collect();
        returns.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(returns)
    }

    async fn count_orders(&self) -> CoreResult<u64> {
        let state = self.state.lock().await;
        Ok(state.orders.len() as u64)
    }

    async fn sales_since(&self, since: DateTime<Utc>) -> CoreResult<OrderSummary> {
        let state = self.state.lock().await;
        Ok(OrderSummary {
            orders: state
                .orders
                .values()
                .filter(|o| o.created_at >= since)
                .count() as u64,
            revenue: state.sales_from(since).map(|o| o.total_amount).sum(),
        })
    }

    async fn units_sold_since(&self, since: DateTime<Utc>) -> CoreResult<u64> {
        let state = self.state.lock().await;
        Ok(state.sales_from(since).map(Order::item_count).sum())
    }

    async fn daily_revenue_since(&self, since: DateTime<Utc>) -> CoreResult<Vec<DailyRevenue>> {
        let state = self.state.lock().await;
        let mut by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for order in state.sales_from(since) {
            *by_day.entry(order.created_at.date_naive()).or_default() += order.total_amount;
        }
        Ok(by_day
            .into_iter()
            .map(|(day, amount)| DailyRevenue { day, amount })
            .collect())
    }

    async fn top_products(&self, limit: usize) -> CoreResult<Vec<TopProduct>> {
        let state = self.state.lock().await;
        let mut totals: HashMap<ProductId, TopProduct> = HashMap::new();
        for item in state
            .sales_from(DateTime::<Utc>::UNIX_EPOCH)
            .flat_map(|o| o.items.iter())
        {
            let entry = totals.entry(item.product_id).or_insert_with(|| TopProduct {
                product_id: item.product_id,
                title: item.product_title.clone(),
                quantity: 0,
            });
            entry.quantity += u64::from(item.quantity);
        }

        let mut ranked: Vec<TopProduct> = totals.into_values().collect();
        ranked.sort_by(|a, b| b.quantity.cmp(&a.quantity).then(a.product_id.cmp(&b.product_id)));
        ranked.truncate(limit);
        Ok(ranked)
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_order(&mut self, id: OrderId) -> CoreResult<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, mut order: Order) -> CoreResult<Order> {
        if self
            .working
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(CoreError::InternalError(format!(
                "duplicate order number {}",
                order.order_number
            )));
        }
        self.working.last_order_id += 1;
        order.id = self.working.last_order_id;
        self.working.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn save_order(&mut self, order: &Order) -> CoreResult<()> {
        let stored = self
            .working
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| CoreError::not_found("Order", order.id))?;
        stored.status = order.status;
        stored.payment_status = order.payment_status;
        stored.timestamps = order.timestamps.clone();
        stored.updated_at = order.updated_at;
        Ok(())
    }

    async fn lock_product(&mut self, id: ProductId) -> CoreResult<Option<Product>> {
        Ok(self.working.products.get(&id).cloned())
    }

    async fn save_product_stock(
        &mut self,
        id: ProductId,
        stock: u32,
        updated_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        if self.working.failing_products.contains(&id) {
            return Err(CoreError::InternalError(format!(
                "stock write rejected for product {}",
                id
            )));
        }
        let product = self
            .working
            .products
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("Product", id))?;
        product.stock = stock;
        product.updated_at = updated_at;
        Ok(())
    }

    async fn find_return_by_order(
        &mut self,
        order_id: OrderId,
    ) -> CoreResult<Option<ReturnRequest>> {
        Ok(self
            .working
            .returns
            .values()
            .find(|r| r.order_id == order_id)
            .cloned())
    }

    async fn insert_return(&mut self, mut request: ReturnRequest) -> CoreResult<ReturnRequest> {
        if self
            .working
            .returns
            .values()
            .any(|r| r.order_id == request.order_id)
        {
            return Err(CoreError::DuplicateReturn(request.order_id));
        }
        self.working.last_return_id += 1;
        request.id = self.working.last_return_id;
        self.working.returns.insert(request.id, request.clone());
        Ok(request)
    }

    async fn lock_return(&mut self, id: ReturnId) -> CoreResult<Option<ReturnRequest>> {
        Ok(self.working.returns.get(&id).cloned())
    }

    async fn save_return(&mut self, request: &ReturnRequest) -> CoreResult<()> {
        let stored = self
            .working
            .returns
            .get_mut(&request.id)
            .ok_or_else(|| CoreError::not_found("Return request", request.id))?;
        stored.status = request.status;
        stored.completed_at = request.completed_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> CoreResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
