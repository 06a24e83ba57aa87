//! Domain errors.

use thiserror::Error;

use super::identifiers::{InstrumentId, OrderId, PortfolioId};
use super::order::OrderStatus;

/// Rejected transition on an order that is already terminal.
#[derive(Debug, Clone, Error)]
#[error("order {order_id} cannot transition from {from} to {to}")]
pub struct OrderStateError {
    /// Order the transition was attempted on.
    pub order_id: OrderId,
    /// Current (terminal) status.
    pub from: OrderStatus,
    /// Requested status.
    pub to: OrderStatus,
}

/// Errors from the price feed.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// Instrument id is not registered with the feed.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(InstrumentId),

    /// Instrument is registered but has no price yet.
    #[error("no price recorded for instrument: {0}")]
    NoPrice(InstrumentId),
}

/// Errors from the holdings ledger.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Sell exceeds the held quantity, or no position exists.
    #[error("insufficient position in {instrument_id} for portfolio {portfolio_id}: held {held}, requested {requested}")]
    InsufficientPosition {
        /// Portfolio attempting the sell.
        portfolio_id: PortfolioId,
        /// Instrument sold.
        instrument_id: InstrumentId,
        /// Quantity actually held.
        held: u32,
        /// Quantity requested to sell.
        requested: u32,
    },
}

/// Errors from the order executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Order lookup failed.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order repository failed.
    #[error("order repository error: {0}")]
    Repository(#[source] anyhow::Error),

    /// Invalid order state transition.
    #[error(transparent)]
    OrderState(#[from] OrderStateError),
}
