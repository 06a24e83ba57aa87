//! Holdings ledger: per-portfolio positions updated by order fills.
//!
//! Fills against the same (portfolio, instrument) position are serialized
//! by a per-position mutex, so concurrent fills never interleave their
//! read-modify-write. The registry map itself is only locked long enough
//! to find or insert the position slot.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::debug;

use crate::domain::{Holding, InstrumentId, LedgerError, Money, OrderSide, PortfolioId};

type PositionKey = (PortfolioId, InstrumentId);
type PositionSlot = Arc<Mutex<Option<Holding>>>;

/// Result of applying a fill to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FillOutcome {
    /// Portfolio the fill applied to.
    pub portfolio_id: PortfolioId,
    /// Instrument traded.
    pub instrument_id: InstrumentId,
    /// Held quantity after the fill.
    pub quantity_after: u32,
    /// Average cost per share after the fill (zero if the position emptied).
    pub average_cost_after: Money,
    /// Average cost per share the fill was applied against.
    pub average_cost_at_fill: Money,
    /// Realized profit or loss; present for sells only.
    pub realized_pnl: Option<Money>,
}

/// Registry of positions keyed by (portfolio, instrument).
///
/// Fully-sold positions keep their slot with an empty value, so a later
/// re-buy reuses the same serialization point.
#[derive(Default)]
pub struct HoldingsLedger {
    positions: RwLock<HashMap<PositionKey, PositionSlot>>,
}

impl HoldingsLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, portfolio_id: &PortfolioId, instrument_id: &InstrumentId) -> PositionSlot {
        let key = (portfolio_id.clone(), instrument_id.clone());
        if let Some(slot) = self.positions.read().get(&key) {
            return Arc::clone(slot);
        }
        let mut positions = self.positions.write();
        Arc::clone(positions.entry(key).or_default())
    }

    fn existing_slot(
        &self,
        portfolio_id: &PortfolioId,
        instrument_id: &InstrumentId,
    ) -> Option<PositionSlot> {
        let key = (portfolio_id.clone(), instrument_id.clone());
        self.positions.read().get(&key).map(Arc::clone)
    }

    /// Apply a fill to the ledger. The single mutating entry point.
    ///
    /// Buys open a position or fold into its weighted average; sells
    /// reduce it and realize P&L. The held-quantity check for sells and
    /// the mutation happen under the same position lock, so a concurrent
    /// sell cannot pass the check twice against the same shares.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientPosition`] if a sell exceeds
    /// the held quantity or no position exists.
    pub fn apply_fill(
        &self,
        portfolio_id: &PortfolioId,
        instrument_id: &InstrumentId,
        side: OrderSide,
        quantity: u32,
        price: Money,
    ) -> Result<FillOutcome, LedgerError> {
        match side {
            OrderSide::Buy => Ok(self.apply_buy(portfolio_id, instrument_id, quantity, price)),
            OrderSide::Sell => self.apply_sell(portfolio_id, instrument_id, quantity, price),
        }
    }

    fn apply_buy(
        &self,
        portfolio_id: &PortfolioId,
        instrument_id: &InstrumentId,
        quantity: u32,
        price: Money,
    ) -> FillOutcome {
        let slot = self.slot(portfolio_id, instrument_id);
        let mut guard = slot.lock();

        let holding = match guard.as_mut() {
            Some(holding) => {
                holding.apply_buy(quantity, price);
                holding
            }
            None => guard.insert(Holding::open(
                portfolio_id.clone(),
                instrument_id.clone(),
                quantity,
                price,
            )),
        };

        debug!(
            portfolio_id = %portfolio_id,
            instrument_id = %instrument_id,
            quantity,
            price = %price,
            quantity_after = holding.quantity(),
            "buy fill applied"
        );
        FillOutcome {
            portfolio_id: portfolio_id.clone(),
            instrument_id: instrument_id.clone(),
            quantity_after: holding.quantity(),
            average_cost_after: holding.average_cost(),
            average_cost_at_fill: holding.average_cost(),
            realized_pnl: None,
        }
    }

    fn apply_sell(
        &self,
        portfolio_id: &PortfolioId,
        instrument_id: &InstrumentId,
        quantity: u32,
        price: Money,
    ) -> Result<FillOutcome, LedgerError> {
        let insufficient = |held: u32| LedgerError::InsufficientPosition {
            portfolio_id: portfolio_id.clone(),
            instrument_id: instrument_id.clone(),
            held,
            requested: quantity,
        };

        let slot = self
            .existing_slot(portfolio_id, instrument_id)
            .ok_or_else(|| insufficient(0))?;
        let mut guard = slot.lock();
        let holding = guard.as_mut().ok_or_else(|| insufficient(0))?;

        if quantity > holding.quantity() {
            return Err(insufficient(holding.quantity()));
        }

        let average_cost_at_fill = holding.average_cost();
        let realized_pnl = holding.apply_sell(quantity, price);
        let quantity_after = holding.quantity();
        let average_cost_after = if holding.is_empty() {
            Money::ZERO
        } else {
            holding.average_cost()
        };
        if holding.is_empty() {
            // Keep the slot; a later re-buy reuses its lock.
            *guard = None;
        }

        debug!(
            portfolio_id = %portfolio_id,
            instrument_id = %instrument_id,
            quantity,
            price = %price,
            quantity_after,
            realized_pnl = %realized_pnl,
            "sell fill applied"
        );
        Ok(FillOutcome {
            portfolio_id: portfolio_id.clone(),
            instrument_id: instrument_id.clone(),
            quantity_after,
            average_cost_after,
            average_cost_at_fill,
            realized_pnl: Some(realized_pnl),
        })
    }

    /// Get the current position, if one is open.
    #[must_use]
    pub fn position(
        &self,
        portfolio_id: &PortfolioId,
        instrument_id: &InstrumentId,
    ) -> Option<Holding> {
        self.existing_slot(portfolio_id, instrument_id)
            .and_then(|slot| slot.lock().clone())
    }

    /// Get the held quantity, zero if no position is open.
    #[must_use]
    pub fn held_quantity(&self, portfolio_id: &PortfolioId, instrument_id: &InstrumentId) -> u32 {
        self.position(portfolio_id, instrument_id)
            .map_or(0, |holding| holding.quantity())
    }

    /// List all open positions in a portfolio.
    #[must_use]
    pub fn portfolio_holdings(&self, portfolio_id: &PortfolioId) -> Vec<Holding> {
        let slots: Vec<PositionSlot> = self
            .positions
            .read()
            .iter()
            .filter(|((pf, _), _)| pf == portfolio_id)
            .map(|(_, slot)| Arc::clone(slot))
            .collect();

        slots
            .iter()
            .filter_map(|slot| slot.lock().clone())
            .collect()
    }
}
