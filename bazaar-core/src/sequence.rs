use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::CoreResult;

/// Hands out human-readable order numbers.
///
/// Uniqueness comes from a monotonic counter, not from the clock: the date
/// part is cosmetic.
#[async_trait]
pub trait OrderNumberSource: Send + Sync {
    async fn next_order_number(&self, at: DateTime<Utc>) -> CoreResult<String>;
}

pub fn format_order_number(prefix: &str, at: DateTime<Utc>, sequence: u64) -> String {
    format!("{}-{}-{:06}", prefix, at.format("%Y%m%d"), sequence)
}

/// Process-local counter. Fine for a single node and for tests.
#[derive(Debug)]
pub struct SequentialOrderNumbers {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialOrderNumbers {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    pub fn starting_at(prefix: impl Into<String>, first: u64) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialOrderNumbers {
    fn default() -> Self {
        Self::new("ORD")
    }
}

#[async_trait]
impl OrderNumberSource for SequentialOrderNumbers {
    async fn next_order_number(&self, at: DateTime<Utc>) -> CoreResult<String> {
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(format_order_number(&self.prefix, at, sequence))
    }
}
