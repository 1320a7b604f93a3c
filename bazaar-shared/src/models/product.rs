use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProductId;

/// The slice of a catalog product this core reads and writes.
///
/// `stock` is only ever mutated through the inventory ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub price: Decimal,
    /// Whole-number percentage off `price`, 0..=100.
    pub discount_percent: u32,
    pub stock: u32,
    pub main_image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
