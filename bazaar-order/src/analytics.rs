//! Read-side dashboard figures. Nothing here takes a lock or writes.
//!
//! Revenue and items sold skip cancelled orders; order counts include them.

use bazaar_core::{Clock, CoreError, CoreResult, Store};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use bazaar_shared::models::{DailyRevenue, OrderSummary, TopProduct};

/// Longest look-back the day-based reports accept.
pub const MAX_REPORT_DAYS: u32 = 3660;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub today: OrderSummary,
    pub this_month: OrderSummary,
    pub total_revenue: Decimal,
    pub total_orders: u64,
}

/// One entry per calendar day from `first_day` through `last_day`, days
/// missing from `sales` included as zero.
pub fn fill_days(sales: &[DailyRevenue], first_day: NaiveDate, last_day: NaiveDate) -> Vec<DailyRevenue> {
    let mut by_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    let mut day = first_day;
    while day <= last_day {
        by_day.insert(day, Decimal::ZERO);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    for entry in sales {
        if let Some(amount) = by_day.get_mut(&entry.day) {
            *amount += entry.amount;
        }
    }

    by_day
        .into_iter()
        .map(|(day, amount)| DailyRevenue { day, amount })
        .collect()
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&at.date_naive().and_time(chrono::NaiveTime::MIN))
}

fn start_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    let first = at.date_naive().with_day(1).unwrap_or_else(|| at.date_naive());
    Utc.from_utc_datetime(&first.and_time(chrono::NaiveTime::MIN))
}

/// Midnight `days` days before `now`.
fn days_back(now: DateTime<Utc>, days: u32) -> CoreResult<DateTime<Utc>> {
    if days > MAX_REPORT_DAYS {
        return Err(CoreError::ValidationError(format!(
            "report range of {} days exceeds {}",
            days, MAX_REPORT_DAYS
        )));
    }
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .map(start_of_day)
        .ok_or_else(|| CoreError::ValidationError(format!("report range of {} days is out of range", days)))
}

pub struct Analytics {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Analytics {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn summary_since(&self, since: DateTime<Utc>) -> CoreResult<OrderSummary> {
        self.store.sales_since(since).await
    }

    pub async fn dashboard(&self) -> CoreResult<DashboardStats> {
        let now = self.clock.now();

        Ok(DashboardStats {
            today: self.store.sales_since(start_of_day(now)).await?,
            this_month: self.store.sales_since(start_of_month(now)).await?,
            total_revenue: self.store.sales_since(DateTime::<Utc>::UNIX_EPOCH).await?.revenue,
            total_orders: self.store.count_orders().await?,
        })
    }

    /// Units sold since midnight `days` days ago.
    pub async fn items_sold_last_days(&self, days: u32) -> CoreResult<u64> {
        let since = days_back(self.clock.now(), days)?;
        self.store.units_sold_since(since).await
    }

    /// `days` entries ending today.
    pub async fn revenue_trend(&self, days: u32) -> CoreResult<Vec<DailyRevenue>> {
        if days == 0 {
            return Ok(Vec::new());
        }
        let now = self.clock.now();
        let first = days_back(now, days - 1)?;
        let sales = self.store.daily_revenue_since(first).await?;
        Ok(fill_days(&sales, first.date_naive(), now.date_naive()))
    }

    pub async fn top_products(&self, limit: usize) -> CoreResult<Vec<TopProduct>> {
        self.store.top_products(limit).await
    }
}
