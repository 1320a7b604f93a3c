use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderId, OrderStatus, PaymentStatus, ReturnId, ReturnStatus, UserId};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OrderStatusChangedEvent {
    pub event_id: Uuid,
    pub order_id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PaymentStatusChangedEvent {
    pub event_id: Uuid,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub from: PaymentStatus,
    pub to: PaymentStatus,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ReturnRequestedEvent {
    pub event_id: Uuid,
    pub return_id: ReturnId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ReturnStatusChangedEvent {
    pub event_id: Uuid,
    pub return_id: ReturnId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub from: ReturnStatus,
    pub to: ReturnStatus,
    pub timestamp: i64,
}

/// Everything the core tells the outside world about. Delivered
/// fire-and-forget after the owning transaction committed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    OrderStatusChanged(OrderStatusChangedEvent),
    PaymentStatusChanged(PaymentStatusChangedEvent),
    ReturnRequested(ReturnRequestedEvent),
    ReturnStatusChanged(ReturnStatusChangedEvent),
}

impl DomainEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            DomainEvent::OrderStatusChanged(e) => e.order_id,
            DomainEvent::PaymentStatusChanged(e) => e.order_id,
            DomainEvent::ReturnRequested(e) => e.order_id,
            DomainEvent::ReturnStatusChanged(e) => e.order_id,
        }
    }

    pub fn event_id(&self) -> Uuid {
        match self {
            DomainEvent::OrderStatusChanged(e) => e.event_id,
            DomainEvent::PaymentStatusChanged(e) => e.event_id,
            DomainEvent::ReturnRequested(e) => e.event_id,
            DomainEvent::ReturnStatusChanged(e) => e.event_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::OrderStatusChanged(_) => "ORDER_STATUS_CHANGED",
            DomainEvent::PaymentStatusChanged(_) => "PAYMENT_STATUS_CHANGED",
            DomainEvent::ReturnRequested(_) => "RETURN_REQUESTED",
            DomainEvent::ReturnStatusChanged(_) => "RETURN_STATUS_CHANGED",
        }
    }
}
