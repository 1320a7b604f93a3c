pub mod app_config;
pub mod database;
pub mod events;
pub mod pg_store;
pub mod redis_repo;

pub use database::DbClient;
pub use events::{EventProducer, KafkaNotifier};
pub use pg_store::PgStore;
pub use redis_repo::{RedisClient, RedisOrderNumbers};

use bazaar_core::SystemClock;
use bazaar_order::OrderService;
use std::sync::Arc;

use crate::app_config::Config;

/// Wires the production stack: PostgreSQL for state, Redis for order
/// numbers, Kafka for notifications. Business rules come from the config
/// file overlaid with the `business_rules` table.
pub async fn order_service(config: &Config, db: &DbClient) -> anyhow::Result<OrderService> {
    let rules = db
        .fetch_business_rules(config.business_rules.clone())
        .await?;
    tracing::info!(
        home_city = %rules.home_city,
        return_window_days = rules.return_window_days,
        prefix = %rules.order_number_prefix,
        "Business rules loaded"
    );

    let redis = RedisClient::new(&config.redis.url).await?;
    let producer = EventProducer::new(&config.kafka.brokers)?;

    Ok(OrderService::new(
        Arc::new(PgStore::new(db.pool.clone())),
        Arc::new(SystemClock),
        Arc::new(RedisOrderNumbers::new(redis, rules.order_number_prefix.clone())),
        Arc::new(KafkaNotifier::new(producer, config.kafka.notification_topic.clone())),
        rules.fulfillment_policy(),
    ))
}
