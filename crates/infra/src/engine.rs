//! The order/stock consistency engine.
//!
//! Stock is reserved eagerly: creating an order decrements product stock on
//! the spot, completing consumes the reservation as-is, and cancelling is
//! the only transition that returns units to the catalog.
//!
//! Every operation validates all of its preconditions against working
//! copies before the first store write, under the order's lock plus the
//! locks of every touched product, so a failure never leaves partial state
//! behind.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument};

use stockroom_core::{DomainError, DomainResult, OrderId, ProductId, UserId};
use stockroom_orders::{Order, OrderLine};

use crate::locks::{LockKey, LockRegistry};
use crate::stores::{CatalogStore, OrderStore};

/// One requested line of a create or update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Serializes order and stock mutations.
pub struct OrderEngine {
    catalog: Arc<dyn CatalogStore>,
    orders: Arc<dyn OrderStore>,
    locks: Arc<LockRegistry>,
}

impl OrderEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        orders: Arc<dyn OrderStore>,
        locks: Arc<LockRegistry>,
    ) -> Self {
        Self {
            catalog,
            orders,
            locks,
        }
    }

    /// Create a stable order, reserving stock for every line.
    ///
    /// Fails with `NotFound` on an unknown product and `InsufficientStock`
    /// when any line exceeds what its product has on hand; neither case
    /// writes anything.
    #[instrument(skip(self, lines), fields(user_id = %user_id, line_count = lines.len()), err)]
    pub async fn create_order(
        &self,
        user_id: UserId,
        lines: Vec<LineRequest>,
    ) -> DomainResult<Order> {
        let order_lines = lines
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
            })
            .collect();
        // Shape validation happens before any lock is taken.
        let order = Order::new(user_id, order_lines)?;

        let keys = order
            .lines
            .iter()
            .map(|line| LockKey::Product(line.product_id))
            .collect();
        let _guards = self.locks.acquire(keys).await;

        let mut reserved = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let mut product = self.catalog.get(line.product_id).await?;
            product.adjust_stock(-line.quantity)?;
            reserved.push(product);
        }

        self.catalog.save_all(&reserved).await?;
        self.orders.save(&order).await?;
        info!(order_id = %order.id, "order created");
        Ok(order)
    }

    /// Re-quantify an existing stable order.
    ///
    /// `lines` must cover every product already on the order (`MissingLine`
    /// otherwise); entries for other products are ignored. A raised
    /// quantity must fit within the product's current stock, mirroring the
    /// check at creation time.
    #[instrument(skip(self, lines), fields(order_id = %order_id), err)]
    pub async fn update_order(
        &self,
        order_id: OrderId,
        lines: Vec<LineRequest>,
    ) -> DomainResult<Order> {
        // The order lock must be held before reading, or the line set could
        // change between the read and the product lock acquisition.
        let _order_guard = self.locks.acquire(vec![LockKey::Order(order_id)]).await;
        let mut order = self.orders.get(order_id).await?;

        let keys = order
            .lines
            .iter()
            .map(|line| LockKey::Product(line.product_id))
            .collect();
        let _product_guards = self.locks.acquire(keys).await;

        let quantities: HashMap<_, _> = lines
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect();
        let changes = order.requantify(&quantities)?;

        let mut settled = Vec::with_capacity(changes.len());
        for change in &changes {
            let mut product = self.catalog.get(change.product_id).await?;
            if change.new_quantity > product.stock {
                return Err(DomainError::insufficient_stock(
                    product.id,
                    change.new_quantity,
                    product.stock,
                ));
            }
            product.adjust_stock(change.stock_delta())?;
            settled.push(product);
        }

        self.catalog.save_all(&settled).await?;
        self.orders.save(&order).await?;
        info!(order_id = %order.id, "order updated");
        Ok(order)
    }

    /// Cancel a stable order, returning every line's units to the catalog.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn cancel_order(&self, order_id: OrderId) -> DomainResult<Order> {
        let _order_guard = self.locks.acquire(vec![LockKey::Order(order_id)]).await;
        let mut order = self.orders.get(order_id).await?;

        let keys = order
            .lines
            .iter()
            .map(|line| LockKey::Product(line.product_id))
            .collect();
        let _product_guards = self.locks.acquire(keys).await;

        order.cancel()?;

        let mut restored = Vec::with_capacity(order.lines.len());
        for line in &order.lines {
            let mut product = self.catalog.get(line.product_id).await?;
            product.adjust_stock(line.quantity)?;
            restored.push(product);
        }

        self.catalog.save_all(&restored).await?;
        self.orders.save(&order).await?;
        info!(order_id = %order.id, "order cancelled");
        Ok(order)
    }

    /// Complete a stable order. Stock stays exactly as reserved.
    #[instrument(skip(self), fields(order_id = %order_id), err)]
    pub async fn complete_order(&self, order_id: OrderId) -> DomainResult<Order> {
        let _order_guard = self.locks.acquire(vec![LockKey::Order(order_id)]).await;
        let mut order = self.orders.get(order_id).await?;

        order.complete()?;

        self.orders.save(&order).await?;
        info!(order_id = %order.id, "order completed");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockroom_catalog::{Product, ProductDraft};
    use stockroom_orders::OrderStatus;

    use crate::stores::{InMemoryCatalogStore, InMemoryOrderStore};

    struct Fixture {
        engine: Arc<OrderEngine>,
        catalog: Arc<InMemoryCatalogStore>,
        orders: Arc<InMemoryOrderStore>,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let orders = Arc::new(InMemoryOrderStore::new());
        let engine = Arc::new(OrderEngine::new(
            catalog.clone(),
            orders.clone(),
            Arc::new(LockRegistry::new()),
        ));
        Fixture {
            engine,
            catalog,
            orders,
        }
    }

    async fn seed_product(fixture: &Fixture, name: &str, stock: i64) -> Product {
        let product = Product::new(ProductDraft {
            name: name.to_string(),
            description: String::new(),
            stock,
            price: dec!(10.00),
            cost_price: dec!(4.00),
        })
        .unwrap();
        fixture.catalog.save(&product).await.unwrap();
        product
    }

    fn request(product: &Product, quantity: i64) -> LineRequest {
        LineRequest {
            product_id: product.id,
            quantity,
        }
    }

    async fn stock_of(fixture: &Fixture, product: &Product) -> i64 {
        fixture.catalog.get(product.id).await.unwrap().stock
    }

    #[tokio::test]
    async fn create_reserves_stock_per_line() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;
        let gadget = seed_product(&fx, "gadget", 5).await;

        let order = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 3), request(&gadget, 2)])
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Stable);
        assert_eq!(stock_of(&fx, &widget).await, 7);
        assert_eq!(stock_of(&fx, &gadget).await, 3);
        assert_eq!(fx.orders.get(order.id).await.unwrap().lines.len(), 2);
    }

    #[tokio::test]
    async fn create_can_drain_stock_to_zero() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 5).await;

        fx.engine
            .create_order(UserId::new(), vec![request(&widget, 5)])
            .await
            .unwrap();

        assert_eq!(stock_of(&fx, &widget).await, 0);
    }

    #[tokio::test]
    async fn create_rejects_insufficient_stock_without_writing() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 3).await;

        let err = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 5)])
            .await
            .unwrap_err();

        match err {
            DomainError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 3);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(stock_of(&fx, &widget).await, 3);
        assert!(fx.orders.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_unknown_product_without_touching_known_ones() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;
        let ghost = LineRequest {
            product_id: ProductId::new(),
            quantity: 1,
        };

        let err = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 3), ghost])
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { .. }));
        assert_eq!(stock_of(&fx, &widget).await, 10);
        assert!(fx.orders.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_malformed_line_sets() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;

        let empty = fx.engine.create_order(UserId::new(), Vec::new()).await;
        assert!(matches!(empty, Err(DomainError::InvalidArgument(_))));

        let zero = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 0)])
            .await;
        assert!(matches!(zero, Err(DomainError::InvalidArgument(_))));

        let duplicated = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 1), request(&widget, 2)])
            .await;
        assert!(matches!(duplicated, Err(DomainError::InvalidArgument(_))));
        assert_eq!(stock_of(&fx, &widget).await, 10);
    }

    #[tokio::test]
    async fn lowering_a_quantity_returns_the_difference() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 3).await;
        let order = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 2)])
            .await
            .unwrap();
        assert_eq!(stock_of(&fx, &widget).await, 1);

        let updated = fx
            .engine
            .update_order(order.id, vec![request(&widget, 1)])
            .await
            .unwrap();

        assert_eq!(updated.line_quantity(widget.id), Some(1));
        // 3 on the shelf, 2 reserved, 1 handed back.
        assert_eq!(stock_of(&fx, &widget).await, 2);
    }

    #[tokio::test]
    async fn raising_a_quantity_beyond_current_stock_fails() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 3).await;
        let order = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 2)])
            .await
            .unwrap();

        let err = fx
            .engine
            .update_order(order.id, vec![request(&widget, 5)])
            .await
            .unwrap_err();

        match err {
            DomainError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 5);
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        // Neither the line nor the stock moved.
        let reloaded = fx.orders.get(order.id).await.unwrap();
        assert_eq!(reloaded.line_quantity(widget.id), Some(2));
        assert_eq!(stock_of(&fx, &widget).await, 1);
    }

    #[tokio::test]
    async fn raising_a_quantity_within_stock_succeeds() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;
        let order = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 2)])
            .await
            .unwrap();

        fx.engine
            .update_order(order.id, vec![request(&widget, 5)])
            .await
            .unwrap();

        // 8 on the shelf before the update, delta of 3 reserved on top.
        assert_eq!(stock_of(&fx, &widget).await, 5);
    }

    #[tokio::test]
    async fn update_must_cover_every_existing_line() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;
        let gadget = seed_product(&fx, "gadget", 10).await;
        let order = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 1), request(&gadget, 1)])
            .await
            .unwrap();

        let err = fx
            .engine
            .update_order(order.id, vec![request(&widget, 2)])
            .await
            .unwrap_err();

        match err {
            DomainError::MissingLine { product_id } => {
                assert_eq!(product_id, gadget.id.to_string());
            }
            other => panic!("expected MissingLine, got {other:?}"),
        }
        assert_eq!(stock_of(&fx, &widget).await, 9);
        assert_eq!(stock_of(&fx, &gadget).await, 9);
    }

    #[tokio::test]
    async fn update_ignores_products_not_on_the_order() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;
        let bystander = seed_product(&fx, "bystander", 10).await;
        let order = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 2)])
            .await
            .unwrap();

        let updated = fx
            .engine
            .update_order(order.id, vec![request(&widget, 4), request(&bystander, 9)])
            .await
            .unwrap();

        assert_eq!(updated.lines.len(), 1);
        assert_eq!(stock_of(&fx, &widget).await, 6);
        assert_eq!(stock_of(&fx, &bystander).await, 10);
    }

    #[tokio::test]
    async fn cancel_returns_stock_exactly_once() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;
        let order = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 4)])
            .await
            .unwrap();
        assert_eq!(stock_of(&fx, &widget).await, 6);

        let cancelled = fx.engine.cancel_order(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&fx, &widget).await, 10);

        let err = fx.engine.cancel_order(order.id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(stock_of(&fx, &widget).await, 10);
    }

    #[tokio::test]
    async fn complete_keeps_the_reservation_consumed() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;
        let order = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 4)])
            .await
            .unwrap();

        let completed = fx.engine.complete_order(order.id).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
        assert_eq!(stock_of(&fx, &widget).await, 6);

        let again = fx.engine.complete_order(order.id).await.unwrap_err();
        assert!(matches!(again, DomainError::InvalidState(_)));
    }

    #[tokio::test]
    async fn terminal_orders_reject_every_transition() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;

        let completed = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 1)])
            .await
            .unwrap();
        fx.engine.complete_order(completed.id).await.unwrap();

        let err = fx.engine.cancel_order(completed.id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        let err = fx
            .engine
            .update_order(completed.id, vec![request(&widget, 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));

        let cancelled = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 1)])
            .await
            .unwrap();
        fx.engine.cancel_order(cancelled.id).await.unwrap();

        let err = fx.engine.complete_order(cancelled.id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(stock_of(&fx, &widget).await, 9);
    }

    #[tokio::test]
    async fn unknown_order_ids_are_not_found() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;
        let ghost = OrderId::new();

        assert!(matches!(
            fx.engine
                .update_order(ghost, vec![request(&widget, 1)])
                .await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            fx.engine.cancel_order(ghost).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            fx.engine.complete_order(ghost).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_creates_never_oversell() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let engine = fx.engine.clone();
            let product_id = widget.id;
            tasks.push(tokio::spawn(async move {
                engine
                    .create_order(
                        UserId::new(),
                        vec![LineRequest {
                            product_id,
                            quantity: 1,
                        }],
                    )
                    .await
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => accepted += 1,
                Err(DomainError::InsufficientStock { .. }) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(accepted, 10);
        assert_eq!(stock_of(&fx, &widget).await, 0);
        assert_eq!(fx.orders.list().await.unwrap().len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_cancel_and_complete_resolve_to_one_terminal_state() {
        let fx = fixture();
        let widget = seed_product(&fx, "widget", 10).await;
        let order = fx
            .engine
            .create_order(UserId::new(), vec![request(&widget, 4)])
            .await
            .unwrap();

        let cancel = {
            let engine = fx.engine.clone();
            let id = order.id;
            tokio::spawn(async move { engine.cancel_order(id).await })
        };
        let complete = {
            let engine = fx.engine.clone();
            let id = order.id;
            tokio::spawn(async move { engine.complete_order(id).await })
        };

        let outcomes = [cancel.await.unwrap(), complete.await.unwrap()];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);

        let final_order = fx.orders.get(order.id).await.unwrap();
        let expected_stock = match final_order.status {
            OrderStatus::Cancelled => 10,
            OrderStatus::Completed => 6,
            OrderStatus::Stable => panic!("order should be terminal"),
        };
        assert_eq!(stock_of(&fx, &widget).await, expected_stock);
    }
}
