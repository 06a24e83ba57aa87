//! Order repository port and the in-memory adapter.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{Order, OrderId, PortfolioId, UserId};

/// Port for order persistence.
///
/// `save` is an upsert: executors persist the pending order first and the
/// terminal order again once execution resolves.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert or update an order by id.
    async fn save(&self, order: &Order) -> anyhow::Result<()>;

    /// Find an order by id.
    async fn find_by_id(&self, id: &OrderId) -> anyhow::Result<Option<Order>>;

    /// List a user's orders, newest first.
    async fn find_by_user(&self, user_id: &UserId) -> anyhow::Result<Vec<Order>>;

    /// List a portfolio's orders, newest first.
    async fn find_by_portfolio(&self, portfolio_id: &PortfolioId) -> anyhow::Result<Vec<Order>>;
}

/// In-memory order repository backed by a `HashMap` with a per-user index.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    inner: RwLock<Store>,
}

#[derive(Default)]
struct Store {
    orders: HashMap<OrderId, Order>,
    by_user: HashMap<UserId, Vec<OrderId>>,
}

impl InMemoryOrderRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().orders.len()
    }

    /// Returns true if no orders are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().orders.is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> anyhow::Result<()> {
        let mut store = self.inner.write();
        if !store.orders.contains_key(order.id()) {
            store
                .by_user
                .entry(order.user_id().clone())
                .or_default()
                .push(order.id().clone());
        }
        store.orders.insert(order.id().clone(), order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> anyhow::Result<Option<Order>> {
        Ok(self.inner.read().orders.get(id).cloned())
    }

    async fn find_by_user(&self, user_id: &UserId) -> anyhow::Result<Vec<Order>> {
        let store = self.inner.read();
        let mut orders: Vec<Order> = store
            .by_user
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| store.orders.get(id).cloned())
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn find_by_portfolio(&self, portfolio_id: &PortfolioId) -> anyhow::Result<Vec<Order>> {
        let store = self.inner.read();
        let mut orders: Vec<Order> = store
            .orders
            .values()
            .filter(|order| order.portfolio_id() == portfolio_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }
}
