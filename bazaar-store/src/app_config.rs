use bazaar_order::FulfillmentPolicy;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub kafka: KafkaConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_return_window_days")]
    pub return_window_days: i64,
    #[serde(default = "default_home_city")]
    pub home_city: String,
    #[serde(default = "default_home_city_shipping")]
    pub home_city_shipping: Decimal,
    #[serde(default = "default_outbound_shipping")]
    pub outbound_shipping: Decimal,
    #[serde(default = "default_order_number_prefix")]
    pub order_number_prefix: String,
}

fn default_return_window_days() -> i64 { 3 }
fn default_home_city() -> String { "Dhaka".to_string() }
fn default_home_city_shipping() -> Decimal { Decimal::from(100) }
fn default_outbound_shipping() -> Decimal { Decimal::from(160) }
fn default_order_number_prefix() -> String { "ORD".to_string() }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            return_window_days: default_return_window_days(),
            home_city: default_home_city(),
            home_city_shipping: default_home_city_shipping(),
            outbound_shipping: default_outbound_shipping(),
            order_number_prefix: default_order_number_prefix(),
        }
    }
}

impl BusinessRules {
    pub fn fulfillment_policy(&self) -> FulfillmentPolicy {
        FulfillmentPolicy {
            return_window: chrono::Duration::days(self.return_window_days.max(0)),
            home_city: self.home_city.clone(),
            home_city_shipping: self.home_city_shipping,
            outbound_shipping: self.outbound_shipping,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,
}

fn default_notification_topic() -> String { "order-notifications".to_string() }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Developer overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `BAZAAR__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("BAZAAR").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_match_policy_defaults() {
        assert_eq!(BusinessRules::default().fulfillment_policy(), FulfillmentPolicy::default());
    }

    #[test]
    fn test_rules_deserialize_with_partial_overrides() {
        let rules: BusinessRules = serde_json::from_value(serde_json::json!({
            "return_window_days": 7,
            "home_city": "Chittagong",
            "outbound_shipping": "180"
        }))
        .unwrap();

        let policy = rules.fulfillment_policy();
        assert_eq!(policy.return_window, chrono::Duration::days(7));
        assert_eq!(policy.shipping_cost("chittagong"), Decimal::from(100));
        assert_eq!(policy.shipping_cost("Dhaka"), Decimal::from(180));
        assert_eq!(rules.order_number_prefix, "ORD");
    }
}
