use bazaar_catalog::{discounted_price, InventoryLedger};
use bazaar_core::repository::{require_order, require_product, StoreTx};
use bazaar_core::{Clock, CoreError, CoreResult, OrderNumberSource, Principal, Store};
use bazaar_shared::models::{Order, OrderId, OrderItem, OrderStatus, PaymentStatus, UserId};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::creation::{assemble_order, NewOrder};
use crate::policy::FulfillmentPolicy;
use crate::transitions::{self, StockEffect, TransitionPlan};

/// Result of a lifecycle request, applied or not.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub order: Order,
    pub plan: TransitionPlan,
    pub previous_payment: PaymentStatus,
}

impl TransitionOutcome {
    pub fn changed(&self) -> bool {
        !self.plan.is_noop()
    }
}

#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub order: Order,
    pub previous: PaymentStatus,
}

/// Drives the order lifecycle.
///
/// Every write runs in exactly one store transaction: the order row is
/// locked first, the transition is validated against the locked state, then
/// ledger movements and the order write happen together. Two concurrent
/// requests for one order therefore serialize, and the second one sees the
/// status the first one committed.
pub struct OrderManager {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    numbers: Arc<dyn OrderNumberSource>,
    ledger: InventoryLedger,
    policy: FulfillmentPolicy,
}

impl OrderManager {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        numbers: Arc<dyn OrderNumberSource>,
        policy: FulfillmentPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            numbers,
            ledger: InventoryLedger::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &FulfillmentPolicy {
        &self.policy
    }

    /// Places an order. Stock is checked but not touched; it moves only on
    /// delivery.
    pub async fn create_order(&self, user_id: UserId, request: NewOrder) -> CoreResult<Order> {
        request.validate()?;

        let now = self.clock.now();
        let order_number = self.numbers.next_order_number(now).await?;

        let mut tx = self.store.begin().await?;

        for (product_id, requested) in request.requested_quantities() {
            let product = require_product(tx.as_mut(), product_id).await?;
            if requested > u64::from(product.stock) {
                return Err(CoreError::InsufficientStock {
                    product_id,
                    requested: u32::try_from(requested).unwrap_or(u32::MAX),
                    available: product.stock,
                });
            }
        }

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let product = require_product(tx.as_mut(), line.product_id).await?;
            items.push(OrderItem::new(
                product.id,
                line.quantity,
                line.selected_size.trim().to_string(),
                discounted_price(&product),
                product.title.clone(),
                product.main_image.clone(),
            ));
        }

        let draft = assemble_order(user_id, order_number, items, request, &self.policy, now);
        let order = tx.insert_order(draft).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = order.id,
            order_number = %order.order_number,
            user_id,
            total = %order.total_amount,
            "Order created"
        );
        Ok(order)
    }

    pub async fn transition(
        &self,
        order_id: OrderId,
        target: OrderStatus,
    ) -> CoreResult<TransitionOutcome> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let order = require_order(tx.as_mut(), order_id).await?;

        self.apply(tx, order, target, now).await
    }

    /// Customer-initiated cancel. Only the owner (or an admin) may ask, and
    /// only until the parcel has shipped.
    pub async fn cancel(
        &self,
        principal: &Principal,
        order_id: OrderId,
    ) -> CoreResult<TransitionOutcome> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let order = require_order(tx.as_mut(), order_id).await?;

        if !principal.acts_for(order.user_id) {
            return Err(CoreError::Unauthorized(format!(
                "user {} may not cancel order {}",
                principal.user_id, order.id
            )));
        }

        if order.status != OrderStatus::Cancelled
            && order.status.ordinal() >= OrderStatus::Shipped.ordinal()
        {
            return Err(CoreError::IllegalTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        self.apply(tx, order, OrderStatus::Cancelled, now).await
    }

    pub async fn update_payment_status(
        &self,
        order_id: OrderId,
        status: PaymentStatus,
    ) -> CoreResult<PaymentUpdate> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut order = require_order(tx.as_mut(), order_id).await?;
        let previous = order.payment_status;

        if previous == status {
            return Ok(PaymentUpdate { order, previous });
        }

        order.payment_status = status;
        order.updated_at = now;
        tx.save_order(&order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id,
            from = %previous,
            to = %status,
            "Payment status updated"
        );
        Ok(PaymentUpdate { order, previous })
    }

    async fn apply(
        &self,
        mut tx: Box<dyn StoreTx>,
        mut order: Order,
        target: OrderStatus,
        now: DateTime<Utc>,
    ) -> CoreResult<TransitionOutcome> {
        let previous_payment = order.payment_status;
        let plan = match transitions::plan(order.status, target) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(order_id = order.id, from = %order.status, to = %target, "Rejected transition");
                return Err(e);
            }
        };

        if plan.is_noop() {
            tracing::debug!(order_id = order.id, status = %target, "Status unchanged");
            return Ok(TransitionOutcome {
                order,
                plan,
                previous_payment,
            });
        }

        let moved = match plan.stock_effect {
            StockEffect::Debit => self.ledger.debit(tx.as_mut(), &order.items, now).await?,
            StockEffect::Credit => self.ledger.credit(tx.as_mut(), &order.items, now).await?,
            StockEffect::None => Vec::new(),
        };
        let clamped = moved.iter().filter(|m| m.clamped).count();

        order.status = target;
        order.updated_at = now;
        order.timestamps.stamp_first_visit(target, now);
        if plan.verify_payment {
            order.payment_status = PaymentStatus::Verified;
        }

        tx.save_order(&order).await?;
        tx.commit().await?;

        tracing::info!(
            order_id = order.id,
            from = %plan.from,
            to = %plan.to,
            stock = ?plan.stock_effect,
            products = moved.len(),
            clamped,
            "Order status updated"
        );

        Ok(TransitionOutcome {
            order,
            plan,
            previous_payment,
        })
    }
}
