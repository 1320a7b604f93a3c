//! The order status state machine as an explicit table.

use bazaar_core::{CoreError, CoreResult};
use bazaar_shared::models::OrderStatus;
use serde::Serialize;

/// What a transition does to the stock counters of the order's products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockEffect {
    None,
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionPlan {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub stock_effect: StockEffect,
    /// Delivery settles the payment.
    pub verify_payment: bool,
}

impl TransitionPlan {
    /// Requests for the status an order already has change nothing.
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    fn stay(status: OrderStatus) -> Self {
        Self::step(status, status, StockEffect::None)
    }

    fn step(from: OrderStatus, to: OrderStatus, stock_effect: StockEffect) -> Self {
        Self {
            from,
            to,
            stock_effect,
            verify_payment: to == OrderStatus::Delivered && from != OrderStatus::Delivered,
        }
    }
}

/// Looks up `from -> to`.
///
/// Any non-terminal status may move to any other status, backwards included,
/// except that a delivered order cannot be cancelled and nothing leaves
/// CANCELLED. Entering DELIVERED debits stock; leaving it credits stock back.
pub fn plan(from: OrderStatus, to: OrderStatus) -> CoreResult<TransitionPlan> {
    use OrderStatus::*;

    let plan = match (from, to) {
        (Processing, Processing)
        | (Packed, Packed)
        | (Shipped, Shipped)
        | (OutForDelivery, OutForDelivery)
        | (Delivered, Delivered)
        | (Cancelled, Cancelled) => TransitionPlan::stay(from),

        (Cancelled, _) | (Delivered, Cancelled) => {
            return Err(CoreError::IllegalTransition { from, to })
        }

        (Processing | Packed | Shipped | OutForDelivery, Delivered) => {
            TransitionPlan::step(from, to, StockEffect::Debit)
        }
        (Delivered, Processing | Packed | Shipped | OutForDelivery) => {
            TransitionPlan::step(from, to, StockEffect::Credit)
        }

        (
            Processing | Packed | Shipped | OutForDelivery,
            Processing | Packed | Shipped | OutForDelivery | Cancelled,
        ) => TransitionPlan::step(from, to, StockEffect::None),
    };

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::ErrorKind;
    use OrderStatus::*;

    #[test]
    fn test_every_pair_is_decided() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let result = plan(from, to);

                let illegal = from == Cancelled && to != Cancelled
                    || from == Delivered && to == Cancelled;
                if illegal {
                    let err = result.unwrap_err();
                    assert_eq!(err.kind(), ErrorKind::IllegalTransition, "{} -> {}", from, to);
                    continue;
                }

                let plan = result.unwrap();
                let expected = if from == to {
                    StockEffect::None
                } else if to == Delivered {
                    StockEffect::Debit
                } else if from == Delivered {
                    StockEffect::Credit
                } else {
                    StockEffect::None
                };
                assert_eq!(plan.stock_effect, expected, "{} -> {}", from, to);
                assert_eq!(plan.is_noop(), from == to);
                assert_eq!(plan.verify_payment, to == Delivered && from != Delivered);
            }
        }
    }

    #[test]
    fn test_delivered_cannot_be_cancelled() {
        match plan(Delivered, Cancelled) {
            Err(CoreError::IllegalTransition { from, to }) => {
                assert_eq!(from, Delivered);
                assert_eq!(to, Cancelled);
            }
            other => panic!("expected IllegalTransition, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_is_terminal_but_idempotent() {
        assert!(plan(Cancelled, Cancelled).unwrap().is_noop());
        assert!(plan(Cancelled, Processing).is_err());
        assert!(plan(Cancelled, Delivered).is_err());
    }

    #[test]
    fn test_backward_moves_are_allowed() {
        let back = plan(OutForDelivery, Packed).unwrap();
        assert_eq!(back.stock_effect, StockEffect::None);
        assert_eq!(plan(Delivered, Shipped).unwrap().stock_effect, StockEffect::Credit);
    }
}
