use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{OrderId, ParseEnumError, ProductId, ReturnId, UserId};
use crate::pii::Masked;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl ReturnStatus {
    pub const ALL: [ReturnStatus; 4] = [
        ReturnStatus::Pending,
        ReturnStatus::Approved,
        ReturnStatus::Rejected,
        ReturnStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReturnStatus::Pending => "PENDING",
            ReturnStatus::Approved => "APPROVED",
            ReturnStatus::Rejected => "REJECTED",
            ReturnStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for ReturnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReturnStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        ReturnStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ParseEnumError::new("return status", s))
    }
}

/// Post-delivery return request. At most one per order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReturnRequest {
    pub id: ReturnId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub reason: String,
    /// e.g. DAMAGED, WRONG_SIZE, NOT_AS_DESCRIBED. Free-form.
    pub reason_category: Option<String>,
    /// `None` means the whole order is being returned.
    pub product_id: Option<ProductId>,
    pub contact_phone: Option<Masked<String>>,
    pub contact_email: Option<Masked<String>>,
    pub photo_urls: Vec<String>,
    pub status: ReturnStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
