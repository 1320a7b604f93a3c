use bazaar_core::{CoreError, CoreResult};
use bazaar_shared::models::{
    Order, OrderItem, OrderStatus, PaymentDetails, PaymentMethod, ProductId, ShippingDetails,
    StageTimestamps, UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::policy::FulfillmentPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub selected_size: String,
}

/// A checkout request as it arrives from the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub items: Vec<NewOrderItem>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment: PaymentDetails,
    pub shipping: ShippingDetails,
}

fn require_text(value: &str, field: &str) -> CoreResult<()> {
    if value.trim().is_empty() {
        return Err(CoreError::ValidationError(format!("{} is required", field)));
    }
    Ok(())
}

impl NewOrder {
    pub fn validate(&self) -> CoreResult<()> {
        if self.items.is_empty() {
            return Err(CoreError::ValidationError(
                "Order items cannot be empty".to_string(),
            ));
        }

        for item in &self.items {
            if item.quantity == 0 {
                return Err(CoreError::ValidationError(format!(
                    "Quantity for product {} must be at least 1",
                    item.product_id
                )));
            }
            require_text(&item.selected_size, "Selected size")?;
        }

        require_text(&self.shipping.name, "Shipping name")?;
        require_text(self.shipping.phone.expose(), "Shipping phone")?;
        require_text(&self.shipping.address, "Shipping address")?;
        require_text(&self.shipping.city, "Shipping city")?;
        require_text(&self.shipping.postal_code, "Postal code")?;

        Ok(())
    }

    /// Total requested quantity per product. The same product may appear on
    /// several lines with different sizes, and they share one stock counter.
    pub fn requested_quantities(&self) -> BTreeMap<ProductId, u64> {
        let mut wanted = BTreeMap::new();
        for item in &self.items {
            *wanted.entry(item.product_id).or_insert(0u64) += u64::from(item.quantity);
        }
        wanted
    }
}

/// Assembles the aggregate from priced line snapshots. Money is fixed here
/// and never edited afterwards.
pub fn assemble_order(
    user_id: UserId,
    order_number: String,
    items: Vec<OrderItem>,
    request: NewOrder,
    policy: &FulfillmentPolicy,
    now: DateTime<Utc>,
) -> Order {
    let subtotal: Decimal = items.iter().map(|item| item.total_price).sum();
    let shipping_cost = policy.shipping_cost(&request.shipping.city);

    let mut timestamps = StageTimestamps::default();
    timestamps.stamp_first_visit(OrderStatus::Processing, now);

    Order {
        id: 0,
        order_number,
        user_id,
        items,
        subtotal,
        shipping_cost,
        total_amount: subtotal + shipping_cost,
        status: OrderStatus::Processing,
        payment_method: request.payment_method,
        payment_status: request.payment_method.initial_payment_status(),
        payment: request.payment,
        shipping: request.shipping,
        timestamps,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::ErrorKind;
    use bazaar_shared::models::PaymentStatus;
    use bazaar_shared::Masked;
    use rust_decimal_macros::dec;

    fn request(city: &str) -> NewOrder {
        NewOrder {
            items: vec![NewOrderItem {
                product_id: 1,
                quantity: 2,
                selected_size: "M".to_string(),
            }],
            payment_method: PaymentMethod::Online,
            payment: PaymentDetails {
                provider: Some("bkash".to_string()),
                sender_number: Some("01700000000".to_string()),
                transaction_id: Some("TX9".to_string()),
            },
            shipping: ShippingDetails {
                name: "Nadia".to_string(),
                phone: Masked::new("01711111111".to_string()),
                address: "House 4, Road 2".to_string(),
                city: city.to_string(),
                postal_code: "1207".to_string(),
                notes: None,
            },
        }
    }

    #[test]
    fn test_validation_rejects_blank_fields() {
        assert!(request("Dhaka").validate().is_ok());

        let mut empty = request("Dhaka");
        empty.items.clear();
        assert_eq!(empty.validate().unwrap_err().kind(), ErrorKind::ValidationError);

        let mut zero = request("Dhaka");
        zero.items[0].quantity = 0;
        assert_eq!(zero.validate().unwrap_err().kind(), ErrorKind::ValidationError);

        let mut no_city = request("   ");
        no_city.shipping.city = "   ".to_string();
        assert_eq!(no_city.validate().unwrap_err().kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn test_requested_quantities_merge_sizes() {
        let mut req = request("Dhaka");
        req.items.push(NewOrderItem {
            product_id: 1,
            quantity: 3,
            selected_size: "L".to_string(),
        });
        assert_eq!(req.requested_quantities().get(&1), Some(&5));
    }

    #[test]
    fn test_assembled_totals_balance() {
        let now = Utc::now();
        let items = vec![OrderItem::new(
            1,
            2,
            "M".to_string(),
            dec!(450.50),
            "Kurta".to_string(),
            "kurta.png".to_string(),
        )];
        let order = assemble_order(
            7,
            "ORD-1".to_string(),
            items,
            request("Sylhet"),
            &FulfillmentPolicy::default(),
            now,
        );

        assert_eq!(order.subtotal, dec!(901.00));
        assert_eq!(order.shipping_cost, dec!(160));
        assert_eq!(order.total_amount, dec!(1061.00));
        assert!(order.amounts_balanced());
        assert_eq!(order.payment_status, PaymentStatus::PendingVerification);
        assert_eq!(order.timestamps.processing_time, Some(now));
        assert_eq!(order.timestamps.packed_time, None);
    }
}
