use bazaar_core::repository::{require_product, StoreTx};
use bazaar_core::{CoreError, CoreResult};
use bazaar_shared::models::{OrderItem, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Debit,
    Credit,
}

/// One applied change to a product's stock counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockMovement {
    pub product_id: ProductId,
    pub kind: MovementKind,
    pub quantity: u32,
    pub before: u32,
    pub after: u32,
    /// The debit asked for more than was on hand and stopped at zero.
    pub clamped: bool,
}

/// `max(0, current - quantity)`, plus whether the floor was hit.
pub fn debited(current: u32, quantity: u32) -> (u32, bool) {
    match current.checked_sub(quantity) {
        Some(left) => (left, false),
        None => (0, true),
    }
}

pub fn credited(current: u32, quantity: u32) -> Option<u32> {
    current.checked_add(quantity)
}

/// Total quantity per product, ascending by product id.
///
/// Row locks are always taken in this order, so two transactions moving
/// stock for overlapping sets of products cannot wait on each other in a
/// cycle.
pub fn quantities_by_product(items: &[OrderItem]) -> BTreeMap<ProductId, u64> {
    let mut totals = BTreeMap::new();
    for item in items {
        *totals.entry(item.product_id).or_insert(0u64) += u64::from(item.quantity);
    }
    totals
}

/// The only code path that writes `products.stock`.
///
/// The ledger has no opinion on *when* to move stock; the order lifecycle
/// decides that. Lines for the same product are summed and applied once,
/// under the product row lock of the caller's transaction. The first failure
/// aborts the call and is returned; products already applied stay in the
/// (uncommitted) transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    pub fn new() -> Self {
        Self
    }

    pub async fn debit(
        &self,
        tx: &mut dyn StoreTx,
        items: &[OrderItem],
        at: DateTime<Utc>,
    ) -> CoreResult<Vec<StockMovement>> {
        let totals = quantities_by_product(items);
        let mut movements = Vec::with_capacity(totals.len());

        for (product_id, total) in totals {
            let product = require_product(tx, product_id).await?;
            let quantity = u32::try_from(total).unwrap_or(u32::MAX);
            let (after, clamped) = debited(product.stock, quantity);

            if clamped {
                tracing::warn!(
                    product_id,
                    title = %product.title,
                    current = product.stock,
                    quantity,
                    "Stock underflow while debiting, clamping to 0"
                );
            }

            tx.save_product_stock(product_id, after, at).await?;
            tracing::info!(
                product_id,
                before = product.stock,
                after,
                "Stock debited"
            );

            movements.push(StockMovement {
                product_id,
                kind: MovementKind::Debit,
                quantity,
                before: product.stock,
                after,
                clamped,
            });
        }

        Ok(movements)
    }

    pub async fn credit(
        &self,
        tx: &mut dyn StoreTx,
        items: &[OrderItem],
        at: DateTime<Utc>,
    ) -> CoreResult<Vec<StockMovement>> {
        let totals = quantities_by_product(items);
        let mut movements = Vec::with_capacity(totals.len());

        for (product_id, total) in totals {
            let product = require_product(tx, product_id).await?;
            let overflow = || {
                CoreError::InternalError(format!("stock counter overflow for product {}", product_id))
            };
            let quantity = u32::try_from(total).map_err(|_| overflow())?;
            let after = credited(product.stock, quantity).ok_or_else(overflow)?;

            tx.save_product_stock(product_id, after, at).await?;
            tracing::info!(
                product_id,
                before = product.stock,
                after,
                "Stock credited"
            );

            movements.push(StockMovement {
                product_id,
                kind: MovementKind::Credit,
                quantity,
                before: product.stock,
                after,
                clamped: false,
            });
        }

        Ok(movements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bazaar_core::memory::MemoryStore;
    use bazaar_core::{ErrorKind, Store};
    use bazaar_shared::models::{Order, OrderId, Product, ReturnId, ReturnRequest};
    use rust_decimal_macros::dec;
    use std::sync::{Arc, Mutex};

    /// Passes everything through and remembers which products were locked.
    struct RecordingTx {
        inner: Box<dyn StoreTx>,
        locked: Arc<Mutex<Vec<ProductId>>>,
    }

    #[async_trait]
    impl StoreTx for RecordingTx {
        async fn lock_order(&mut self, id: OrderId) -> CoreResult<Option<Order>> {
            self.inner.lock_order(id).await
        }

        async fn insert_order(&mut self, order: Order) -> CoreResult<Order> {
            self.inner.insert_order(order).await
        }

        async fn save_order(&mut self, order: &Order) -> CoreResult<()> {
            self.inner.save_order(order).await
        }

        async fn lock_product(&mut self, id: ProductId) -> CoreResult<Option<Product>> {
            self.locked.lock().unwrap().push(id);
            self.inner.lock_product(id).await
        }

        async fn save_product_stock(
            &mut self,
            id: ProductId,
            stock: u32,
            updated_at: DateTime<Utc>,
        ) -> CoreResult<()> {
            self.inner.save_product_stock(id, stock, updated_at).await
        }

        async fn find_return_by_order(
            &mut self,
            order_id: OrderId,
        ) -> CoreResult<Option<ReturnRequest>> {
            self.inner.find_return_by_order(order_id).await
        }

        async fn insert_return(&mut self, request: ReturnRequest) -> CoreResult<ReturnRequest> {
            self.inner.insert_return(request).await
        }

        async fn lock_return(&mut self, id: ReturnId) -> CoreResult<Option<ReturnRequest>> {
            self.inner.lock_return(id).await
        }

        async fn save_return(&mut self, request: &ReturnRequest) -> CoreResult<()> {
            self.inner.save_return(request).await
        }

        async fn commit(self: Box<Self>) -> CoreResult<()> {
            self.inner.commit().await
        }
    }

    fn product(id: ProductId, stock: u32) -> Product {
        let now = Utc::now();
        Product {
            id,
            title: format!("Frock {}", id),
            price: dec!(500),
            discount_percent: 0,
            stock,
            main_image: "frock.png".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn line(product_id: ProductId, quantity: u32) -> OrderItem {
        OrderItem::new(
            product_id,
            quantity,
            "2-3Y".to_string(),
            dec!(500),
            "Frock".to_string(),
            "frock.png".to_string(),
        )
    }

    #[test]
    fn test_debit_clamps_at_zero() {
        assert_eq!(debited(10, 2), (8, false));
        assert_eq!(debited(2, 2), (0, false));
        assert_eq!(debited(1, 3), (0, true));
        assert_eq!(credited(0, 3), Some(3));
        assert_eq!(credited(u32::MAX, 1), None);
    }

    #[tokio::test]
    async fn test_debit_then_credit_round_trip() {
        let store = MemoryStore::new();
        store.insert_product(product(1, 10)).await;
        store.insert_product(product(2, 5)).await;
        let ledger = InventoryLedger::new();
        let items = vec![line(1, 2), line(2, 1)];

        let mut tx = store.begin().await.unwrap();
        let moved = ledger.debit(tx.as_mut(), &items, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(moved.len(), 2);
        assert_eq!(store.product_stock(1).await, Some(8));
        assert_eq!(store.product_stock(2).await, Some(4));

        let mut tx = store.begin().await.unwrap();
        ledger.credit(tx.as_mut(), &items, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.product_stock(1).await, Some(10));
        assert_eq!(store.product_stock(2).await, Some(5));
    }

    #[tokio::test]
    async fn test_clamped_debit_is_not_an_error() {
        let store = MemoryStore::new();
        store.insert_product(product(1, 1)).await;
        let ledger = InventoryLedger::new();

        let mut tx = store.begin().await.unwrap();
        let moved = ledger.debit(tx.as_mut(), &[line(1, 4)], Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        assert!(moved[0].clamped);
        assert_eq!(moved[0].after, 0);
        assert_eq!(store.product_stock(1).await, Some(0));
    }

    #[tokio::test]
    async fn test_missing_product_surfaces_and_nothing_commits() {
        let store = MemoryStore::new();
        store.insert_product(product(1, 10)).await;
        let ledger = InventoryLedger::new();

        let mut tx = store.begin().await.unwrap();
        let err = ledger
            .debit(tx.as_mut(), &[line(1, 2), line(99, 1)], Utc::now())
            .await
            .unwrap_err();
        drop(tx);

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(store.product_stock(1).await, Some(10));
    }

    #[tokio::test]
    async fn test_products_are_locked_in_id_order() {
        let store = MemoryStore::new();
        for id in [3, 7, 9] {
            store.insert_product(product(id, 10)).await;
        }
        let ledger = InventoryLedger::new();
        let items = vec![line(9, 1), line(3, 2), line(7, 1), line(9, 2)];

        for credit in [false, true] {
            let locked = Arc::new(Mutex::new(Vec::new()));
            let mut tx = RecordingTx {
                inner: store.begin().await.unwrap(),
                locked: locked.clone(),
            };
            let moved = if credit {
                ledger.credit(&mut tx, &items, Utc::now()).await.unwrap()
            } else {
                ledger.debit(&mut tx, &items, Utc::now()).await.unwrap()
            };
            Box::new(tx).commit().await.unwrap();

            assert_eq!(*locked.lock().unwrap(), vec![3, 7, 9]);
            let order: Vec<ProductId> = moved.iter().map(|m| m.product_id).collect();
            assert_eq!(order, vec![3, 7, 9]);
        }
    }

    #[tokio::test]
    async fn test_repeated_product_lines_move_once() {
        let store = MemoryStore::new();
        store.insert_product(product(4, 10)).await;
        let ledger = InventoryLedger::new();
        let items = vec![line(4, 2), line(4, 3)];

        let mut tx = store.begin().await.unwrap();
        let moved = ledger.debit(tx.as_mut(), &items, Utc::now()).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(moved.len(), 1);
        assert_eq!((moved[0].quantity, moved[0].before, moved[0].after), (5, 10, 5));
        assert_eq!(store.product_stock(4).await, Some(5));
        assert_eq!(quantities_by_product(&items).into_iter().collect::<Vec<_>>(), vec![(4, 5)]);
    }
}
