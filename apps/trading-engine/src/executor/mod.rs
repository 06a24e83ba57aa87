//! Order executor: validates requests, checks prices, applies fills.
//!
//! Every submission produces a persisted order record, terminal by the
//! time `submit` returns: `FILLED` with its fill outcome, or `REJECTED`
//! with the reason attached. Limit and stop orders are immediate-or-reject
//! against the current simulated price; there is no resting book.

pub mod repository;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{
    ExecutorError, LedgerError, Money, Order, OrderId, OrderKind, OrderRequest, OrderSide,
    PortfolioId, RejectReason, UserId,
};
use crate::feed::PriceFeed;
use crate::ledger::{FillOutcome, HoldingsLedger};

pub use repository::{InMemoryOrderRepository, OrderRepository};

/// Result of a submission: the terminal order plus, for fills, the
/// position change it produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// The order in its terminal state.
    pub order: Order,
    /// Position change; present only for filled orders.
    pub fill: Option<FillOutcome>,
}

impl ExecutionReport {
    /// Returns true if the order filled.
    #[must_use]
    pub const fn is_filled(&self) -> bool {
        self.fill.is_some()
    }
}

/// Coordinates the price feed, the holdings ledger, and order persistence.
pub struct OrderExecutor {
    feed: Arc<PriceFeed>,
    ledger: Arc<HoldingsLedger>,
    orders: Arc<dyn OrderRepository>,
}

impl OrderExecutor {
    /// Create an executor over the given feed, ledger, and repository.
    #[must_use]
    pub fn new(
        feed: Arc<PriceFeed>,
        ledger: Arc<HoldingsLedger>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            feed,
            ledger,
            orders,
        }
    }

    /// Submit an order and drive it to a terminal state.
    ///
    /// The order record is persisted in every outcome, including
    /// rejections, so the reject reason stays retrievable afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure failures (persistence,
    /// illegal state transitions). Business rejections are not errors;
    /// they come back as a report with a `REJECTED` order.
    pub async fn submit(&self, request: OrderRequest) -> Result<ExecutionReport, ExecutorError> {
        let mut order = Order::pending(&request);
        self.save(&order).await?;

        if let Err(reason) = request.validate() {
            return self.reject(order, reason).await;
        }

        let current = match self.feed.current_price(order.instrument_id()) {
            Ok(price) => price,
            Err(crate::domain::FeedError::NoPrice(_)) => {
                return self.reject(order, RejectReason::PriceUnavailable).await;
            }
            Err(_) => {
                return self.reject(order, RejectReason::UnknownInstrument).await;
            }
        };

        if let Some(boundary) = order.limit_or_stop_price() {
            if !price_condition_met(order.side(), order.kind(), current, boundary) {
                return self.reject(order, RejectReason::PriceConditionNotMet).await;
            }
        }

        if order.side() == OrderSide::Sell {
            // Fast-fail only; the authoritative check runs inside the
            // ledger under the position lock.
            let held = self
                .ledger
                .held_quantity(order.portfolio_id(), order.instrument_id());
            if held < order.requested_quantity() {
                return self.reject(order, RejectReason::InsufficientPosition).await;
            }
        }

        let outcome = match self.apply_fill_with_retry(&order, current) {
            Ok(outcome) => outcome,
            Err(LedgerError::InsufficientPosition { .. }) => {
                return self.reject(order, RejectReason::InsufficientPosition).await;
            }
        };

        order.fill(current)?;
        self.save(&order).await?;
        info!(
            order_id = %order.id(),
            instrument_id = %order.instrument_id(),
            side = %order.side(),
            quantity = order.requested_quantity(),
            price = %current,
            "order filled"
        );
        Ok(ExecutionReport {
            order,
            fill: Some(outcome),
        })
    }

    /// Sells race concurrent fills on the same position: a passed
    /// pre-check can be stale by the time the fill applies, and the
    /// authoritative check inside the ledger may then fail. One retry
    /// absorbs the case where a concurrent buy has since restored the
    /// position; a second failure is a real rejection.
    fn apply_fill_with_retry(
        &self,
        order: &Order,
        price: Money,
    ) -> Result<FillOutcome, LedgerError> {
        let first = self.ledger.apply_fill(
            order.portfolio_id(),
            order.instrument_id(),
            order.side(),
            order.requested_quantity(),
            price,
        );
        match first {
            Err(LedgerError::InsufficientPosition { .. }) => {
                warn!(order_id = %order.id(), "fill raced the ledger, retrying once");
                self.ledger.apply_fill(
                    order.portfolio_id(),
                    order.instrument_id(),
                    order.side(),
                    order.requested_quantity(),
                    price,
                )
            }
            ok => ok,
        }
    }

    async fn reject(
        &self,
        mut order: Order,
        reason: RejectReason,
    ) -> Result<ExecutionReport, ExecutorError> {
        warn!(
            order_id = %order.id(),
            instrument_id = %order.instrument_id(),
            reason = %reason,
            "order rejected"
        );
        order.reject(reason)?;
        self.save(&order).await?;
        Ok(ExecutionReport { order, fill: None })
    }

    async fn save(&self, order: &Order) -> Result<(), ExecutorError> {
        self.orders
            .save(order)
            .await
            .map_err(ExecutorError::Repository)
    }

    /// Fetch an order by id.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::OrderNotFound`] if no such order exists.
    pub async fn order(&self, id: &OrderId) -> Result<Order, ExecutorError> {
        self.orders
            .find_by_id(id)
            .await
            .map_err(ExecutorError::Repository)?
            .ok_or_else(|| ExecutorError::OrderNotFound(id.clone()))
    }

    /// List a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, ExecutorError> {
        self.orders
            .find_by_user(user_id)
            .await
            .map_err(ExecutorError::Repository)
    }

    /// List a portfolio's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository fails.
    pub async fn orders_for_portfolio(
        &self,
        portfolio_id: &PortfolioId,
    ) -> Result<Vec<Order>, ExecutorError> {
        self.orders
            .find_by_portfolio(portfolio_id)
            .await
            .map_err(ExecutorError::Repository)
    }
}

/// Immediate-or-reject price condition for limit and stop orders.
///
/// A buy limit fills at or under the limit; a sell limit at or over it.
/// A buy stop fills once the price has risen to the stop; a sell stop
/// once it has fallen to it. Market orders have no condition.
#[must_use]
pub fn price_condition_met(
    side: OrderSide,
    kind: OrderKind,
    current: Money,
    boundary: Money,
) -> bool {
    match (kind, side) {
        (OrderKind::Market, _) => true,
        (OrderKind::Limit, OrderSide::Buy) => current <= boundary,
        (OrderKind::Limit, OrderSide::Sell) => current >= boundary,
        (OrderKind::Stop, OrderSide::Buy) => current >= boundary,
        (OrderKind::Stop, OrderSide::Sell) => current <= boundary,
    }
}
