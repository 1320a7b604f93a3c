use bazaar_shared::models::{Order, OrderStatus};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

/// Business constants of fulfillment: shipping tariff and return window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentPolicy {
    pub return_window: Duration,
    pub home_city: String,
    pub home_city_shipping: Decimal,
    pub outbound_shipping: Decimal,
}

impl Default for FulfillmentPolicy {
    fn default() -> Self {
        Self {
            return_window: Duration::days(3),
            home_city: "Dhaka".to_string(),
            home_city_shipping: Decimal::from(100),
            outbound_shipping: Decimal::from(160),
        }
    }
}

impl FulfillmentPolicy {
    /// Flat tariff by destination; there is no free-shipping threshold.
    pub fn shipping_cost(&self, city: &str) -> Decimal {
        if city.trim().eq_ignore_ascii_case(self.home_city.trim()) {
            self.home_city_shipping
        } else {
            self.outbound_shipping
        }
    }

    /// `now - delivered_at <= return_window`.
    pub fn within_return_window(&self, delivered_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        delivered_at >= now - self.return_window
    }

    pub fn return_eligible(&self, order: &Order, now: DateTime<Utc>) -> bool {
        order.status == OrderStatus::Delivered
            && order
                .delivered_time()
                .is_some_and(|at| self.within_return_window(at, now))
    }
}
