use anyhow::Context;
use bazaar_store::app_config::Config;
use bazaar_store::DbClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar_store=debug,bazaar_order=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;

    let db = DbClient::new(&config.database.url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Confirms Redis and Kafka settings resolve before reporting ready.
    let service = bazaar_store::order_service(&config, &db).await?;
    let policy = service.policy();
    tracing::info!(
        home_city = %policy.home_city,
        home_city_shipping = %policy.home_city_shipping,
        outbound_shipping = %policy.outbound_shipping,
        return_window_days = policy.return_window.num_days(),
        "Fulfillment core ready"
    );

    Ok(())
}
