//! Price point history entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identifiers::InstrumentId;
use super::money::Money;

/// A single entry in an instrument's append-only price history.
///
/// Each update produces a new point; the "current price" of an instrument
/// is the latest point by timestamp. Points chain: `previous_close` of a
/// new point equals `price` of the prior point, so `change` and
/// `change_percent` always describe the step from the previous point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    /// Instrument this point belongs to.
    pub instrument_id: InstrumentId,
    /// Price at this point.
    pub price: Money,
    /// Price of the prior point (equals `price` for a seed point).
    pub previous_close: Money,
    /// `price - previous_close`.
    pub change: Money,
    /// `change / previous_close * 100`.
    pub change_percent: Decimal,
    /// Traded volume attributed to this update, if known.
    pub volume: Option<u64>,
    /// When this point was produced.
    pub timestamp: DateTime<Utc>,
}

impl PricePoint {
    /// Build the next point in an instrument's chain.
    ///
    /// `previous_close` is taken from the prior point's `price`;
    /// `change` and `change_percent` are derived from it.
    #[must_use]
    pub fn next_in_chain(
        instrument_id: InstrumentId,
        price: Money,
        previous_close: Money,
        volume: Option<u64>,
    ) -> Self {
        let change = price - previous_close;
        let change_percent = if previous_close.is_zero() {
            Decimal::ZERO
        } else {
            change.amount() / previous_close.amount() * Decimal::from(100)
        };
        Self {
            instrument_id,
            price,
            previous_close,
            change,
            change_percent,
            volume,
            timestamp: Utc::now(),
        }
    }

    /// Build a seed point: the first entry for an instrument.
    ///
    /// `previous_close` equals `price`, so change is zero.
    #[must_use]
    pub fn seed(instrument_id: InstrumentId, price: Money, volume: Option<u64>) -> Self {
        Self::next_in_chain(instrument_id, price, price, volume)
    }

    /// Check internal consistency of the derived fields.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if self.change != self.price - self.previous_close {
            return false;
        }
        if self.previous_close.is_zero() {
            return self.change_percent.is_zero();
        }
        self.change_percent
            == self.change.amount() / self.previous_close.amount() * Decimal::from(100)
    }
}
