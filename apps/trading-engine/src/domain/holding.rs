//! Holding aggregate: a position in one instrument within one portfolio.
//!
//! Buy fills fold into the position at volume-weighted average cost; sell
//! fills reduce quantity and leave the average cost untouched. Quantity
//! never goes negative (no short positions).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identifiers::{InstrumentId, PortfolioId};
use super::money::Money;

/// A position in one instrument within one portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    portfolio_id: PortfolioId,
    instrument_id: InstrumentId,
    quantity: u32,
    average_cost: Money,
    updated_at: DateTime<Utc>,
}

impl Holding {
    /// Open a position from a first buy fill.
    #[must_use]
    pub fn open(
        portfolio_id: PortfolioId,
        instrument_id: InstrumentId,
        quantity: u32,
        price: Money,
    ) -> Self {
        Self {
            portfolio_id,
            instrument_id,
            quantity,
            average_cost: price,
            updated_at: Utc::now(),
        }
    }

    /// Get the portfolio this position belongs to.
    #[must_use]
    pub const fn portfolio_id(&self) -> &PortfolioId {
        &self.portfolio_id
    }

    /// Get the instrument held.
    #[must_use]
    pub const fn instrument_id(&self) -> &InstrumentId {
        &self.instrument_id
    }

    /// Get the held quantity in whole shares.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Get the volume-weighted average cost per share.
    #[must_use]
    pub const fn average_cost(&self) -> Money {
        self.average_cost
    }

    /// Get the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Total cost basis of the position (`quantity * average_cost`).
    #[must_use]
    pub fn cost_basis(&self) -> Money {
        self.average_cost * self.quantity
    }

    /// Market value of the position at `price`.
    #[must_use]
    pub fn market_value(&self, price: Money) -> Money {
        price * self.quantity
    }

    /// Unrealized profit or loss of the position at `price`.
    #[must_use]
    pub fn unrealized_pnl(&self, price: Money) -> Money {
        self.market_value(price) - self.cost_basis()
    }

    /// Fold a buy fill into the position at volume-weighted average cost.
    ///
    /// New average = `(old_qty * old_avg + fill_qty * price) / (old_qty + fill_qty)`.
    pub fn apply_buy(&mut self, quantity: u32, price: Money) {
        let old_qty = Decimal::from(self.quantity);
        let fill_qty = Decimal::from(quantity);
        let total_cost =
            self.average_cost.amount() * old_qty + price.amount() * fill_qty;

        self.quantity += quantity;
        self.average_cost = Money::new(total_cost / (old_qty + fill_qty));
        self.updated_at = Utc::now();
    }

    /// Reduce the position by a sell fill; average cost is unchanged.
    ///
    /// Returns the realized profit or loss of the sold shares. The caller
    /// must have checked `quantity <= self.quantity()` under the position
    /// lock; this method asserts the invariant in debug builds only.
    pub fn apply_sell(&mut self, quantity: u32, price: Money) -> Money {
        debug_assert!(quantity <= self.quantity, "sell exceeds held quantity");

        self.quantity -= quantity;
        self.updated_at = Utc::now();
        (price - self.average_cost) * quantity
    }

    /// Returns true if the position has been fully sold out.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity == 0
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn holding(quantity: u32, avg: Decimal) -> Holding {
        Holding::open(
            PortfolioId::new("pf-1"),
            InstrumentId::new("inst-1"),
            quantity,
            Money::new(avg),
        )
    }

    #[test]
    fn open_sets_average_cost_to_price() {
        let h = holding(10, dec!(100));
        assert_eq!(h.quantity(), 10);
        assert_eq!(h.average_cost(), Money::new(dec!(100)));
        assert!(!h.is_empty());
    }

    #[test]
    fn buy_folds_into_weighted_average() {
        // 10 @ 100 then 10 @ 200 -> 20 @ 150
        let mut h = holding(10, dec!(100));
        h.apply_buy(10, Money::new(dec!(200)));

        assert_eq!(h.quantity(), 20);
        assert_eq!(h.average_cost(), Money::new(dec!(150)));
    }

    #[test]
    fn uneven_buy_weights_by_volume() {
        // 10 @ 100 then 30 @ 200 -> 40 @ 175
        let mut h = holding(10, dec!(100));
        h.apply_buy(30, Money::new(dec!(200)));

        assert_eq!(h.quantity(), 40);
        assert_eq!(h.average_cost(), Money::new(dec!(175)));
    }

    #[test]
    fn sell_keeps_average_cost() {
        let mut h = holding(20, dec!(150));
        let pnl = h.apply_sell(5, Money::new(dec!(180)));

        assert_eq!(h.quantity(), 15);
        assert_eq!(h.average_cost(), Money::new(dec!(150)));
        assert_eq!(pnl, Money::new(dec!(150)));
    }

    #[test]
    fn sell_at_loss_returns_negative_pnl() {
        let mut h = holding(10, dec!(150));
        let pnl = h.apply_sell(4, Money::new(dec!(140)));
        assert_eq!(pnl, Money::new(dec!(-40)));
    }

    #[test]
    fn full_sell_empties_position() {
        let mut h = holding(10, dec!(150));
        h.apply_sell(10, Money::new(dec!(150)));
        assert!(h.is_empty());
    }

    #[test]
    fn pnl_helpers() {
        let h = holding(10, dec!(100));
        assert_eq!(h.cost_basis(), Money::new(dec!(1000)));
        assert_eq!(h.market_value(Money::new(dec!(120))), Money::new(dec!(1200)));
        assert_eq!(h.unrealized_pnl(Money::new(dec!(120))), Money::new(dec!(200)));
    }
}
