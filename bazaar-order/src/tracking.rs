use bazaar_shared::models::{Order, OrderStatus, ReturnRequest};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::policy::FulfillmentPolicy;

const STEPS: [(OrderStatus, &str, &str); 5] = [
    (OrderStatus::Processing, "processing", "Processing"),
    (OrderStatus::Packed, "packed", "Packed"),
    (OrderStatus::Shipped, "shipped", "Shipped"),
    (OrderStatus::OutForDelivery, "out_for_delivery", "Out for Delivery"),
    (OrderStatus::Delivered, "delivered", "Delivered"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingStep {
    pub key: &'static str,
    pub label: &'static str,
    pub time: Option<DateTime<Utc>>,
    pub completed: bool,
}

fn step_completed(step: OrderStatus, order: &Order) -> bool {
    match (step, order.status) {
        (OrderStatus::Processing, _) => true,
        // A cancelled order shows only the stages it actually went through.
        (_, OrderStatus::Cancelled) => order.timestamps.get(step).is_some(),
        (OrderStatus::Delivered, current) => current == OrderStatus::Delivered,
        (_, current) => current.ordinal() >= step.ordinal(),
    }
}

pub fn tracking_steps(order: &Order) -> Vec<TrackingStep> {
    STEPS
        .iter()
        .map(|&(status, key, label)| TrackingStep {
            key,
            label,
            time: order.timestamps.get(status),
            completed: step_completed(status, order),
        })
        .collect()
}

/// Customer-facing order page: the order, where it is, and what can still
/// be done with it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub order: Order,
    pub steps: Vec<TrackingStep>,
    pub return_eligible: bool,
    pub return_request: Option<ReturnRequest>,
}

impl OrderView {
    pub fn build(
        order: Order,
        return_request: Option<ReturnRequest>,
        policy: &FulfillmentPolicy,
        now: DateTime<Utc>,
    ) -> Self {
        let steps = tracking_steps(&order);
        let return_eligible = return_request.is_none() && policy.return_eligible(&order, now);
        Self {
            order,
            steps,
            return_eligible,
            return_request,
        }
    }
}
