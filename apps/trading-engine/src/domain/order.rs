//! Order aggregate and its value objects.
//!
//! An order is created in `PENDING` and moves to exactly one terminal
//! state, `FILLED` or `REJECTED`. There are no partial fills: an order
//! fills completely at one price or not at all, and a terminal order is
//! immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::OrderStateError;
use super::identifiers::{InstrumentId, OrderId, PortfolioId, UserId};
use super::money::Money;

// =============================================================================
// Value Objects
// =============================================================================

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Order kind.
///
/// Limit and stop orders use immediate-or-reject semantics against the
/// current simulated price; there is no resting order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Execute at the current price.
    Market,
    /// Execute at the current price only if it satisfies the limit.
    Limit,
    /// Execute at the current price only if it has crossed the stop.
    Stop,
}

impl OrderKind {
    /// Returns true if this kind requires a limit/stop price on the request.
    #[must_use]
    pub const fn requires_price(&self) -> bool {
        matches!(self, Self::Limit | Self::Stop)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "MARKET"),
            Self::Limit => write!(f, "LIMIT"),
            Self::Stop => write!(f, "STOP"),
        }
    }
}

/// Order status in the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order created, not yet terminal.
    Pending,
    /// Order completely filled at one price.
    Filled,
    /// Order rejected; see the order's reject reason.
    Rejected,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Rejected)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Filled => write!(f, "FILLED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Why an order was rejected.
///
/// Attached to the terminal order record so the reason stays retrievable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// Malformed request: bad quantity or missing required price.
    InvalidOrder {
        /// Human-readable detail.
        detail: String,
    },
    /// Instrument id not recognized by the price feed.
    UnknownInstrument,
    /// No price exists yet for the instrument.
    PriceUnavailable,
    /// Sell exceeds held quantity (or no holding at all).
    InsufficientPosition,
    /// Current price does not satisfy the limit/stop condition.
    PriceConditionNotMet,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOrder { detail } => write!(f, "invalid order: {detail}"),
            Self::UnknownInstrument => write!(f, "unknown instrument"),
            Self::PriceUnavailable => write!(f, "price unavailable"),
            Self::InsufficientPosition => write!(f, "insufficient position"),
            Self::PriceConditionNotMet => write!(f, "price condition not met"),
        }
    }
}

// =============================================================================
// Order Request
// =============================================================================

/// A validated-at-the-boundary order submission.
///
/// Closed tagged form of the caller's payload: side and kind are enums,
/// so downstream code never branches on loosely-typed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Authenticated user submitting the order.
    pub user_id: UserId,
    /// Portfolio the fill applies to.
    pub portfolio_id: PortfolioId,
    /// Instrument to trade.
    pub instrument_id: InstrumentId,
    /// Buy or sell.
    pub side: OrderSide,
    /// Market, limit, or stop.
    pub kind: OrderKind,
    /// Whole shares requested; must be at least 1.
    pub quantity: u32,
    /// Limit or stop price; required for limit/stop kinds.
    pub limit_or_stop_price: Option<Money>,
}

impl OrderRequest {
    /// Validate the request parameters.
    ///
    /// # Errors
    ///
    /// Returns the reject reason for a malformed request.
    pub fn validate(&self) -> Result<(), RejectReason> {
        if self.quantity < 1 {
            return Err(RejectReason::InvalidOrder {
                detail: "quantity must be at least 1".to_string(),
            });
        }
        if self.kind.requires_price() {
            match self.limit_or_stop_price {
                None => {
                    return Err(RejectReason::InvalidOrder {
                        detail: format!("{} order requires a price", self.kind),
                    });
                }
                Some(price) if !price.is_positive() => {
                    return Err(RejectReason::InvalidOrder {
                        detail: format!("{} price must be positive", self.kind),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

// =============================================================================
// Order Aggregate
// =============================================================================

/// An order and its lifecycle state.
///
/// State machine: `PENDING -> FILLED` or `PENDING -> REJECTED`; no other
/// transitions and no re-entry into `PENDING`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    portfolio_id: PortfolioId,
    instrument_id: InstrumentId,
    side: OrderSide,
    kind: OrderKind,
    requested_quantity: u32,
    limit_or_stop_price: Option<Money>,
    status: OrderStatus,
    reject_reason: Option<RejectReason>,
    filled_quantity: u32,
    filled_price: Option<Money>,
    total_value: Option<Money>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new pending order from a request.
    ///
    /// The request is assumed to have passed [`OrderRequest::validate`];
    /// invalid requests still become order records, rejected by the caller
    /// with the validation reason.
    #[must_use]
    pub fn pending(request: &OrderRequest) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::generate(),
            user_id: request.user_id.clone(),
            portfolio_id: request.portfolio_id.clone(),
            instrument_id: request.instrument_id.clone(),
            side: request.side,
            kind: request.kind,
            requested_quantity: request.quantity,
            limit_or_stop_price: request.limit_or_stop_price,
            status: OrderStatus::Pending,
            reject_reason: None,
            filled_quantity: 0,
            filled_price: None,
            total_value: None,
            created_at: now,
            updated_at: now,
        }
    }

    // =========================================================================
    // Getters
    // =========================================================================

    /// Get the order ID.
    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }

    /// Get the submitting user.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Get the portfolio.
    #[must_use]
    pub const fn portfolio_id(&self) -> &PortfolioId {
        &self.portfolio_id
    }

    /// Get the instrument.
    #[must_use]
    pub const fn instrument_id(&self) -> &InstrumentId {
        &self.instrument_id
    }

    /// Get the order side.
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        self.side
    }

    /// Get the order kind.
    #[must_use]
    pub const fn kind(&self) -> OrderKind {
        self.kind
    }

    /// Get the requested quantity.
    #[must_use]
    pub const fn requested_quantity(&self) -> u32 {
        self.requested_quantity
    }

    /// Get the limit/stop price, if any.
    #[must_use]
    pub const fn limit_or_stop_price(&self) -> Option<Money> {
        self.limit_or_stop_price
    }

    /// Get the current status.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Get the reject reason, if the order was rejected.
    #[must_use]
    pub const fn reject_reason(&self) -> Option<&RejectReason> {
        self.reject_reason.as_ref()
    }

    /// Get the filled quantity (zero unless filled).
    #[must_use]
    pub const fn filled_quantity(&self) -> u32 {
        self.filled_quantity
    }

    /// Get the execution price, if filled.
    #[must_use]
    pub const fn filled_price(&self) -> Option<Money> {
        self.filled_price
    }

    /// Get the total value (`filled_price * quantity`), if filled.
    #[must_use]
    pub const fn total_value(&self) -> Option<Money> {
        self.total_value
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // =========================================================================
    // State Transitions
    // =========================================================================

    /// Mark the order as completely filled at `price`.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is already terminal.
    pub fn fill(&mut self, price: Money) -> Result<(), OrderStateError> {
        self.ensure_pending(OrderStatus::Filled)?;

        self.status = OrderStatus::Filled;
        self.filled_quantity = self.requested_quantity;
        self.filled_price = Some(price);
        self.total_value = Some(price * self.requested_quantity);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the order as rejected with a reason.
    ///
    /// # Errors
    ///
    /// Returns an error if the order is already terminal.
    pub fn reject(&mut self, reason: RejectReason) -> Result<(), OrderStateError> {
        self.ensure_pending(OrderStatus::Rejected)?;

        self.status = OrderStatus::Rejected;
        self.reject_reason = Some(reason);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_pending(&self, to: OrderStatus) -> Result<(), OrderStateError> {
        if self.status.is_terminal() {
            return Err(OrderStateError {
                order_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn request(side: OrderSide, kind: OrderKind, quantity: u32) -> OrderRequest {
        OrderRequest {
            user_id: UserId::new("user-1"),
            portfolio_id: PortfolioId::new("pf-1"),
            instrument_id: InstrumentId::new("inst-1"),
            side,
            kind,
            quantity,
            limit_or_stop_price: None,
        }
    }

    #[test]
    fn market_request_valid() {
        assert!(request(OrderSide::Buy, OrderKind::Market, 1).validate().is_ok());
    }

    #[test]
    fn zero_quantity_invalid() {
        let err = request(OrderSide::Buy, OrderKind::Market, 0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, RejectReason::InvalidOrder { .. }));
    }

    #[test]
    fn limit_without_price_invalid() {
        let err = request(OrderSide::Sell, OrderKind::Limit, 5)
            .validate()
            .unwrap_err();
        assert!(matches!(err, RejectReason::InvalidOrder { .. }));
    }

    #[test]
    fn stop_with_negative_price_invalid() {
        let mut req = request(OrderSide::Sell, OrderKind::Stop, 5);
        req.limit_or_stop_price = Some(Money::new(dec!(-1)));
        assert!(req.validate().is_err());
    }

    #[test]
    fn limit_with_price_valid() {
        let mut req = request(OrderSide::Buy, OrderKind::Limit, 5);
        req.limit_or_stop_price = Some(Money::new(dec!(100)));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn pending_order_starts_clean() {
        let order = Order::pending(&request(OrderSide::Buy, OrderKind::Market, 10));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.filled_quantity(), 0);
        assert!(order.filled_price().is_none());
        assert!(order.reject_reason().is_none());
    }

    #[test]
    fn fill_sets_terminal_fields() {
        let mut order = Order::pending(&request(OrderSide::Buy, OrderKind::Market, 10));
        order.fill(Money::new(dec!(100))).unwrap();

        assert_eq!(order.status(), OrderStatus::Filled);
        assert_eq!(order.filled_quantity(), 10);
        assert_eq!(order.filled_price(), Some(Money::new(dec!(100))));
        assert_eq!(order.total_value(), Some(Money::new(dec!(1000))));
    }

    #[test]
    fn reject_records_reason() {
        let mut order = Order::pending(&request(OrderSide::Sell, OrderKind::Market, 5));
        order.reject(RejectReason::InsufficientPosition).unwrap();

        assert_eq!(order.status(), OrderStatus::Rejected);
        assert_eq!(
            order.reject_reason(),
            Some(&RejectReason::InsufficientPosition)
        );
    }

    #[test]
    fn terminal_order_cannot_transition() {
        let mut order = Order::pending(&request(OrderSide::Buy, OrderKind::Market, 10));
        order.fill(Money::new(dec!(100))).unwrap();

        assert!(order.fill(Money::new(dec!(101))).is_err());
        assert!(order.reject(RejectReason::PriceUnavailable).is_err());
    }

    #[test]
    fn status_terminality() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
    }

    #[test]
    fn side_and_kind_display() {
        assert_eq!(format!("{}", OrderSide::Buy), "BUY");
        assert_eq!(format!("{}", OrderSide::Sell), "SELL");
        assert_eq!(format!("{}", OrderKind::Limit), "LIMIT");
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
    }

    #[test]
    fn serde_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&OrderSide::Buy).unwrap(), "\"BUY\"");
        assert_eq!(
            serde_json::to_string(&OrderKind::Market).unwrap(),
            "\"MARKET\""
        );
        let parsed: OrderStatus = serde_json::from_str("\"REJECTED\"").unwrap();
        assert_eq!(parsed, OrderStatus::Rejected);
    }
}
