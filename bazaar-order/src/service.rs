use bazaar_core::notification::dispatch;
use bazaar_core::{Clock, CoreError, CoreResult, Notifier, OrderNumberSource, Principal, Store};
use bazaar_shared::models::{
    DomainEvent, Order, OrderId, OrderStatus, OrderStatusChangedEvent, PaymentStatus,
    PaymentStatusChangedEvent, ReturnId, ReturnRequest, ReturnRequestedEvent, ReturnStatus,
    ReturnStatusChangedEvent,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::analytics::{Analytics, DailyRevenue, DashboardStats, OrderSummary, TopProduct};
use crate::creation::NewOrder;
use crate::listing::{page_window, OrderPage};
use crate::manager::{OrderManager, PaymentUpdate, TransitionOutcome};
use crate::policy::FulfillmentPolicy;
use crate::returns::{NewReturn, ReturnUpdate, ReturnWorkflow};
use crate::tracking::OrderView;

/// Entry point for callers: role checks, then the component that does the
/// work, then notifications once the work is committed.
pub struct OrderService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    manager: OrderManager,
    returns: ReturnWorkflow,
    analytics: Analytics,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        numbers: Arc<dyn OrderNumberSource>,
        notifier: Arc<dyn Notifier>,
        policy: FulfillmentPolicy,
    ) -> Self {
        Self {
            manager: OrderManager::new(store.clone(), clock.clone(), numbers, policy.clone()),
            returns: ReturnWorkflow::new(store.clone(), clock.clone(), policy),
            analytics: Analytics::new(store.clone(), clock.clone()),
            store,
            clock,
            notifier,
        }
    }

    pub fn policy(&self) -> &FulfillmentPolicy {
        self.manager.policy()
    }

    pub async fn create_order(&self, principal: &Principal, request: NewOrder) -> CoreResult<Order> {
        self.manager.create_order(principal.user_id, request).await
    }

    pub async fn transition_order_status(
        &self,
        principal: &Principal,
        order_id: OrderId,
        target: OrderStatus,
    ) -> CoreResult<Order> {
        principal.require_staff("update order status")?;
        let outcome = self.manager.transition(order_id, target).await?;
        self.publish(transition_events(&outcome, self.clock.now()));
        Ok(outcome.order)
    }

    pub async fn cancel_order(&self, principal: &Principal, order_id: OrderId) -> CoreResult<Order> {
        let outcome = self.manager.cancel(principal, order_id).await?;
        self.publish(transition_events(&outcome, self.clock.now()));
        Ok(outcome.order)
    }

    pub async fn update_payment_status(
        &self,
        principal: &Principal,
        order_id: OrderId,
        status: PaymentStatus,
    ) -> CoreResult<Order> {
        principal.require_staff("update payment status")?;
        let update = self.manager.update_payment_status(order_id, status).await?;
        self.publish(payment_events(&update, self.clock.now()));
        Ok(update.order)
    }

    /// Owner or staff.
    pub async fn get_order(&self, principal: &Principal, order_id: OrderId) -> CoreResult<Order> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id))?;

        if !order.is_owned_by(principal.user_id) && !principal.is_staff() {
            return Err(CoreError::Unauthorized(format!(
                "user {} may not view order {}",
                principal.user_id, order_id
            )));
        }
        Ok(order)
    }

    pub async fn order_view(&self, principal: &Principal, order_id: OrderId) -> CoreResult<OrderView> {
        let order = self.get_order(principal, order_id).await?;
        let existing = self.store.get_return_by_order(order.id).await?;
        Ok(OrderView::build(order, existing, self.policy(), self.clock.now()))
    }

    pub async fn my_orders(&self, principal: &Principal) -> CoreResult<Vec<Order>> {
        self.store.list_orders_for_user(principal.user_id).await
    }

    pub async fn orders_by_status(
        &self,
        principal: &Principal,
        status: OrderStatus,
    ) -> CoreResult<Vec<Order>> {
        principal.require_staff("list orders")?;
        self.store.list_orders_by_status(status).await
    }

    /// Every order, newest first, one page at a time. Staff only.
    pub async fn all_orders(&self, principal: &Principal, page: u32, size: u32) -> CoreResult<OrderPage> {
        principal.require_staff("list orders")?;
        let (offset, limit) = page_window(page, size)?;
        Ok(OrderPage {
            orders: self.store.list_orders(offset, limit).await?,
            page,
            size,
            total_orders: self.store.count_orders().await?,
        })
    }

    pub async fn create_return_request(
        &self,
        principal: &Principal,
        order_id: OrderId,
        request: NewReturn,
    ) -> CoreResult<ReturnRequest> {
        let created = self.returns.create(principal, order_id, request).await?;
        self.publish(vec![DomainEvent::ReturnRequested(ReturnRequestedEvent {
            event_id: Uuid::new_v4(),
            return_id: created.id,
            order_id: created.order_id,
            user_id: created.user_id,
            timestamp: created.created_at.timestamp_millis(),
        })]);
        Ok(created)
    }

    pub async fn update_return_status(
        &self,
        principal: &Principal,
        return_id: ReturnId,
        status: ReturnStatus,
    ) -> CoreResult<ReturnRequest> {
        principal.require_staff("update return status")?;
        let update = self.returns.update_status(return_id, status).await?;
        self.publish(return_events(&update, self.clock.now()));
        Ok(update.request)
    }

    /// The return attached to an order, if any. Owner or staff.
    pub async fn return_for_order(
        &self,
        principal: &Principal,
        order_id: OrderId,
    ) -> CoreResult<Option<ReturnRequest>> {
        let order = self.get_order(principal, order_id).await?;
        self.store.get_return_by_order(order.id).await
    }

    pub async fn list_returns(&self, principal: &Principal) -> CoreResult<Vec<ReturnRequest>> {
        principal.require_staff("list returns")?;
        self.store.list_returns().await
    }

    pub async fn dashboard(&self, principal: &Principal) -> CoreResult<DashboardStats> {
        principal.require_staff("view analytics")?;
        self.analytics.dashboard().await
    }

    pub async fn summary_since(
        &self,
        principal: &Principal,
        since: DateTime<Utc>,
    ) -> CoreResult<OrderSummary> {
        principal.require_staff("view analytics")?;
        self.analytics.summary_since(since).await
    }

    pub async fn items_sold_last_days(&self, principal: &Principal, days: u32) -> CoreResult<u64> {
        principal.require_staff("view analytics")?;
        self.analytics.items_sold_last_days(days).await
    }

    pub async fn revenue_trend(
        &self,
        principal: &Principal,
        days: u32,
    ) -> CoreResult<Vec<DailyRevenue>> {
        principal.require_staff("view analytics")?;
        self.analytics.revenue_trend(days).await
    }

    pub async fn top_products(
        &self,
        principal: &Principal,
        limit: usize,
    ) -> CoreResult<Vec<TopProduct>> {
        principal.require_staff("view analytics")?;
        self.analytics.top_products(limit).await
    }

    fn publish(&self, events: Vec<DomainEvent>) {
        dispatch(self.notifier.clone(), events);
    }
}

fn transition_events(outcome: &TransitionOutcome, now: DateTime<Utc>) -> Vec<DomainEvent> {
    if !outcome.changed() {
        return Vec::new();
    }

    let order = &outcome.order;
    let mut events = vec![DomainEvent::OrderStatusChanged(OrderStatusChangedEvent {
        event_id: Uuid::new_v4(),
        order_id: order.id,
        order_number: order.order_number.clone(),
        user_id: order.user_id,
        from: outcome.plan.from,
        to: outcome.plan.to,
        timestamp: now.timestamp_millis(),
    })];

    if outcome.previous_payment != order.payment_status {
        events.push(DomainEvent::PaymentStatusChanged(PaymentStatusChangedEvent {
            event_id: Uuid::new_v4(),
            order_id: order.id,
            user_id: order.user_id,
            from: outcome.previous_payment,
            to: order.payment_status,
            timestamp: now.timestamp_millis(),
        }));
    }
    events
}

fn payment_events(update: &PaymentUpdate, now: DateTime<Utc>) -> Vec<DomainEvent> {
    if update.previous == update.order.payment_status {
        return Vec::new();
    }
    vec![DomainEvent::PaymentStatusChanged(PaymentStatusChangedEvent {
        event_id: Uuid::new_v4(),
        order_id: update.order.id,
        user_id: update.order.user_id,
        from: update.previous,
        to: update.order.payment_status,
        timestamp: now.timestamp_millis(),
    })]
}

fn return_events(update: &ReturnUpdate, now: DateTime<Utc>) -> Vec<DomainEvent> {
    if !update.changed() {
        return Vec::new();
    }
    vec![DomainEvent::ReturnStatusChanged(ReturnStatusChangedEvent {
        event_id: Uuid::new_v4(),
        return_id: update.request.id,
        order_id: update.request.order_id,
        user_id: update.request.user_id,
        from: update.previous,
        to: update.request.status,
        timestamp: now.timestamp_millis(),
    })]
}
