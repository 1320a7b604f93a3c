use bazaar_core::repository::{require_order, require_return};
use bazaar_core::{Clock, CoreError, CoreResult, Principal, Store};
use bazaar_shared::models::{OrderId, OrderStatus, ProductId, ReturnId, ReturnRequest, ReturnStatus};
use bazaar_shared::Masked;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::policy::FulfillmentPolicy;

/// What the customer fills in on the return form. Photos are already
/// uploaded; only their references arrive here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewReturn {
    pub reason: String,
    pub reason_category: Option<String>,
    pub product_id: Option<ProductId>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl NewReturn {
    /// Trims every text field and drops the ones left empty.
    fn normalized(self) -> CoreResult<NewReturn> {
        let reason = self.reason.trim().to_string();
        if reason.is_empty() {
            return Err(CoreError::ValidationError(
                "Return reason is required".to_string(),
            ));
        }

        Ok(NewReturn {
            reason,
            reason_category: non_blank(self.reason_category),
            product_id: self.product_id,
            contact_phone: non_blank(self.contact_phone),
            contact_email: non_blank(self.contact_email),
            photo_urls: self
                .photo_urls
                .into_iter()
                .filter_map(|url| non_blank(Some(url)))
                .collect(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReturnUpdate {
    pub request: ReturnRequest,
    pub previous: ReturnStatus,
}

impl ReturnUpdate {
    pub fn changed(&self) -> bool {
        self.previous != self.request.status
    }
}

/// Post-delivery returns. Reads the order, never writes it, and never moves
/// stock.
pub struct ReturnWorkflow {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    policy: FulfillmentPolicy,
}

impl ReturnWorkflow {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, policy: FulfillmentPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub async fn create(
        &self,
        principal: &Principal,
        order_id: OrderId,
        request: NewReturn,
    ) -> CoreResult<ReturnRequest> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let order = require_order(tx.as_mut(), order_id).await?;

        if !principal.acts_for(order.user_id) {
            return Err(CoreError::Unauthorized(format!(
                "user {} may not request a return for order {}",
                principal.user_id, order.id
            )));
        }

        let delivered_at = match (order.status, order.delivered_time()) {
            (OrderStatus::Delivered, Some(at)) => at,
            _ => {
                return Err(CoreError::NotEligible(
                    "Return allowed only after delivery".to_string(),
                ))
            }
        };
        if !self.policy.within_return_window(delivered_at, now) {
            return Err(CoreError::NotEligible(format!(
                "Return window ({} days) has expired",
                self.policy.return_window.num_days()
            )));
        }

        if tx.find_return_by_order(order.id).await?.is_some() {
            return Err(CoreError::DuplicateReturn(order.id));
        }

        let request = request.normalized()?;
        if let Some(product_id) = request.product_id {
            if !order.items.iter().any(|item| item.product_id == product_id) {
                return Err(CoreError::ValidationError(format!(
                    "Product {} is not part of order {}",
                    product_id, order.id
                )));
            }
        }

        let created = tx
            .insert_return(ReturnRequest {
                id: 0,
                order_id: order.id,
                user_id: principal.user_id,
                reason: request.reason,
                reason_category: request.reason_category,
                product_id: request.product_id,
                contact_phone: request.contact_phone.map(Masked::new),
                contact_email: request.contact_email.map(Masked::new),
                photo_urls: request.photo_urls,
                status: ReturnStatus::Pending,
                created_at: now,
                completed_at: None,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            return_id = created.id,
            order_id = order.id,
            user_id = principal.user_id,
            "Return requested"
        );
        Ok(created)
    }

    /// Any status may follow any other; staff drive this by hand.
    /// `completed_at` is written the first time COMPLETED is reached.
    pub async fn update_status(
        &self,
        return_id: ReturnId,
        status: ReturnStatus,
    ) -> CoreResult<ReturnUpdate> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut request = require_return(tx.as_mut(), return_id).await?;
        let previous = request.status;

        request.status = status;
        let stamped = status == ReturnStatus::Completed && request.completed_at.is_none();
        if stamped {
            request.completed_at = Some(now);
        }

        if previous == status && !stamped {
            return Ok(ReturnUpdate { request, previous });
        }

        tx.save_return(&request).await?;
        tx.commit().await?;

        tracing::info!(
            return_id,
            order_id = request.order_id,
            from = %previous,
            to = %status,
            "Return status updated"
        );
        Ok(ReturnUpdate { request, previous })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::memory::MemoryStore;
    use bazaar_core::{ErrorKind, FixedClock};
    use chrono::{Duration, Utc};

    #[test]
    fn test_normalization() {
        let blank = NewReturn {
            reason: "   ".to_string(),
            ..Default::default()
        };
        assert_eq!(blank.normalized().unwrap_err().kind(), ErrorKind::ValidationError);

        let messy = NewReturn {
            reason: "  wrong size ".to_string(),
            contact_email: Some("  ".to_string()),
            photo_urls: vec!["a.jpg".to_string(), " ".to_string()],
            ..Default::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(messy.reason, "wrong size");
        assert_eq!(messy.contact_email, None);
        assert_eq!(messy.photo_urls, vec!["a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_order_and_return() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let workflow = ReturnWorkflow::new(store, clock.clone(), FulfillmentPolicy::default());

        let err = workflow
            .create(&Principal::user(1), 9, NewReturn::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        clock.advance(Duration::minutes(1));
        let err = workflow
            .update_status(3, ReturnStatus::Approved)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
