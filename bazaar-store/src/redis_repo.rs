use async_trait::async_trait;
use bazaar_core::sequence::format_order_number;
use bazaar_core::{CoreError, CoreResult, OrderNumberSource};
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, RedisResult};
use tracing::debug;

const ORDER_SEQUENCE_KEY: &str = "bazaar:order_number:seq";

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Atomic `INCR`; the first call on a fresh key returns 1.
    pub async fn next_in_sequence(&self, key: &str) -> RedisResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let value: u64 = conn.incr(key, 1u64).await?;
        debug!("Sequence {} advanced to {}", key, value);
        Ok(value)
    }
}

/// Cluster-wide order numbers backed by a Redis counter.
#[derive(Clone)]
pub struct RedisOrderNumbers {
    redis: RedisClient,
    prefix: String,
}

impl RedisOrderNumbers {
    pub fn new(redis: RedisClient, prefix: impl Into<String>) -> Self {
        Self {
            redis,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl OrderNumberSource for RedisOrderNumbers {
    async fn next_order_number(&self, at: DateTime<Utc>) -> CoreResult<String> {
        let sequence = self
            .redis
            .next_in_sequence(ORDER_SEQUENCE_KEY)
            .await
            .map_err(|e| {
                tracing::error!("Order number counter unavailable: {}", e);
                CoreError::internal(e)
            })?;
        Ok(format_order_number(&self.prefix, at, sequence))
    }
}
