use bazaar_core::{CoreError, CoreResult};
use bazaar_shared::models::Order;
use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of the staff order list, newest first. Pages count from 0.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub page: u32,
    pub size: u32,
    pub total_orders: u64,
}

impl OrderPage {
    pub fn total_pages(&self) -> u64 {
        if self.size == 0 {
            return 0;
        }
        self.total_orders.div_ceil(u64::from(self.size))
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page) + 1 < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 0
    }
}

/// `(offset, limit)` for a page request.
pub fn page_window(page: u32, size: u32) -> CoreResult<(u64, u64)> {
    if size == 0 || size > MAX_PAGE_SIZE {
        return Err(CoreError::ValidationError(format!(
            "page size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, size
        )));
    }
    Ok((u64::from(page) * u64::from(size), u64::from(size)))
}
