pub mod events;
pub mod order;
pub mod product;
pub mod returns;
pub mod sales;

pub use events::*;
pub use order::*;
pub use product::Product;
pub use returns::{ReturnRequest, ReturnStatus};
pub use sales::{DailyRevenue, OrderSummary, TopProduct};

pub type OrderId = i64;
pub type ProductId = i64;
pub type ReturnId = i64;
pub type UserId = i64;

/// A status string that does not name any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
