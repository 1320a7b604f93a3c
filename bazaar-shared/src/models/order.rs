use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{OrderId, ParseEnumError, ProductId, UserId};
use crate::pii::Masked;

/// Order status in the fulfillment lifecycle.
///
/// Declaration order is the lifecycle order; `Cancelled` is the off-ramp and
/// sits outside the ordinal progression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Processing,
    Packed,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Processing,
        OrderStatus::Packed,
        OrderStatus::Shipped,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn ordinal(self) -> u8 {
        match self {
            OrderStatus::Processing => 0,
            OrderStatus::Packed => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::OutForDelivery => 3,
            OrderStatus::Delivered => 4,
            OrderStatus::Cancelled => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Packed => "PACKED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ParseEnumError::new("order status", s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cod,
    Online,
}

impl PaymentMethod {
    /// Cash on delivery waits for the courier; online payments wait for an
    /// operator to verify the transaction reference.
    pub fn initial_payment_status(self) -> PaymentStatus {
        match self {
            PaymentMethod::Cod => PaymentStatus::Pending,
            PaymentMethod::Online => PaymentStatus::PendingVerification,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::Online => "ONLINE",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COD" => Ok(PaymentMethod::Cod),
            "ONLINE" => Ok(PaymentMethod::Online),
            _ => Err(ParseEnumError::new("payment method", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    PendingVerification,
    Verified,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [
        PaymentStatus::Pending,
        PaymentStatus::PendingVerification,
        PaymentStatus::Verified,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::PendingVerification => "PENDING_VERIFICATION",
            PaymentStatus::Verified => "VERIFIED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ParseEnumError::new("payment status", s))
    }
}

/// Where the parcel goes. Captured once at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingDetails {
    pub name: String,
    pub phone: Masked<String>,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub notes: Option<String>,
}

/// Mobile-wallet reference supplied by the customer for ONLINE payments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentDetails {
    pub provider: Option<String>,
    pub sender_number: Option<String>,
    pub transaction_id: Option<String>,
}

/// First time each lifecycle stage was reached.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageTimestamps {
    pub processing_time: Option<DateTime<Utc>>,
    pub packed_time: Option<DateTime<Utc>>,
    pub shipped_time: Option<DateTime<Utc>>,
    pub out_for_delivery_time: Option<DateTime<Utc>>,
    pub delivered_time: Option<DateTime<Utc>>,
}

impl StageTimestamps {
    pub fn get(&self, status: OrderStatus) -> Option<DateTime<Utc>> {
        match status {
            OrderStatus::Processing => self.processing_time,
            OrderStatus::Packed => self.packed_time,
            OrderStatus::Shipped => self.shipped_time,
            OrderStatus::OutForDelivery => self.out_for_delivery_time,
            OrderStatus::Delivered => self.delivered_time,
            OrderStatus::Cancelled => None,
        }
    }

    /// Records `at` for `status` unless the stage was already visited.
    /// Returns whether anything was written.
    pub fn stamp_first_visit(&mut self, status: OrderStatus, at: DateTime<Utc>) -> bool {
        let slot = match status {
            OrderStatus::Processing => &mut self.processing_time,
            OrderStatus::Packed => &mut self.packed_time,
            OrderStatus::Shipped => &mut self.shipped_time,
            OrderStatus::OutForDelivery => &mut self.out_for_delivery_time,
            OrderStatus::Delivered => &mut self.delivered_time,
            OrderStatus::Cancelled => return false,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(at);
        true
    }
}

/// Line item snapshot: price, title and image as they were at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub selected_size: String,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub product_title: String,
    pub product_image: String,
}

impl OrderItem {
    pub fn new(
        product_id: ProductId,
        quantity: u32,
        selected_size: String,
        unit_price: Decimal,
        product_title: String,
        product_image: String,
    ) -> Self {
        Self {
            product_id,
            quantity,
            selected_size,
            unit_price,
            total_price: unit_price * Decimal::from(quantity),
            product_title,
            product_image,
        }
    }
}

/// The order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment: PaymentDetails,
    pub shipping: ShippingDetails,
    pub timestamps: StageTimestamps,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    pub fn delivered_time(&self) -> Option<DateTime<Utc>> {
        self.timestamps.delivered_time
    }

    /// `total_amount == subtotal + shipping_cost`; holds for every order the
    /// core has ever produced.
    pub fn amounts_balanced(&self) -> bool {
        self.total_amount == self.subtotal + self.shipping_cost
    }

    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}
