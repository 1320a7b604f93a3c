use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::app_config::BusinessRules;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// File defaults, overridden by whatever the `business_rules` table holds.
    pub async fn fetch_business_rules(
        &self,
        defaults: BusinessRules,
    ) -> Result<BusinessRules, sqlx::Error> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM business_rules")
                .fetch_all(&self.pool)
                .await?;

        Ok(apply_rule_rows(defaults, rows))
    }
}

fn as_decimal(v: &Value) -> Option<Decimal> {
    match v {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

/// Each row's value is stored as `{"value": <number|string>}`.
pub fn apply_rule_rows(defaults: BusinessRules, rows: Vec<(String, Value)>) -> BusinessRules {
    let mut rules = defaults;

    for (key, raw) in rows {
        let Some(v) = raw.get("value") else {
            warn!(rule = %key, "Business rule without a value, ignoring");
            continue;
        };

        match key.as_str() {
            "return_window_days" => {
                if let Some(days) = v.as_i64() {
                    rules.return_window_days = days;
                }
            }
            "home_city" => {
                if let Some(city) = v.as_str() {
                    rules.home_city = city.to_string();
                }
            }
            "home_city_shipping" => {
                if let Some(cost) = as_decimal(v) {
                    rules.home_city_shipping = cost;
                }
            }
            "outbound_shipping" => {
                if let Some(cost) = as_decimal(v) {
                    rules.outbound_shipping = cost;
                }
            }
            "order_number_prefix" => {
                if let Some(prefix) = v.as_str() {
                    rules.order_number_prefix = prefix.to_string();
                }
            }
            _ => {}
        }
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_rows_override_defaults() {
        let rows = vec![
            ("home_city_shipping".to_string(), json!({"value": 90})),
            ("outbound_shipping".to_string(), json!({"value": "150.50"})),
            ("return_window_days".to_string(), json!({"value": 5})),
            ("unknown_rule".to_string(), json!({"value": true})),
            ("home_city".to_string(), json!({"city": "Sylhet"})),
        ];

        let rules = apply_rule_rows(BusinessRules::default(), rows);
        assert_eq!(rules.home_city_shipping, Decimal::from(90));
        assert_eq!(rules.outbound_shipping, Decimal::new(15050, 2));
        assert_eq!(rules.return_window_days, 5);
        assert_eq!(rules.home_city, "Dhaka");
    }
}
