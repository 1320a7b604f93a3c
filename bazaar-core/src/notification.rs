use async_trait::async_trait;
use bazaar_shared::models::DomainEvent;
use std::sync::Arc;

/// Outbound notification channel (e-mail, SMS, message bus).
///
/// Implementations may fail; the core logs the failure and moves on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        event: &DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Writes events to the log only. Used when no bus is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        event: &DomainEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            event = event.name(),
            event_id = %event.event_id(),
            order_id = event.order_id(),
            "Notification"
        );
        Ok(())
    }
}

/// Fire-and-forget delivery on a background task. Never blocks the caller
/// and never surfaces an error to it.
pub fn dispatch(notifier: Arc<dyn Notifier>, events: Vec<DomainEvent>) {
    if events.is_empty() {
        return;
    }

    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => {
            tracing::warn!(count = events.len(), "No runtime available, dropping notifications");
            return;
        }
    };

    handle.spawn(async move {
        for event in events {
            if let Err(e) = notifier.notify(&event).await {
                tracing::warn!(
                    event = event.name(),
                    order_id = event.order_id(),
                    "Notification failed: {}",
                    e
                );
            }
        }
    });
}
