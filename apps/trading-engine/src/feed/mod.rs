//! Price feed: instrument registry, chained price history, and the
//! random-walk simulation step.
//!
//! Each instrument carries an append-only price history where every
//! point's `previous_close` equals the price of the point before it.
//! The simulation step perturbs the current price by a bounded random
//! percentage and appends the resulting point.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use crate::domain::{FeedError, Instrument, InstrumentId, Money, PricePoint};

/// Simulated trade volume range, in shares.
const VOLUME_MIN: u64 = 100_000;
const VOLUME_MAX: u64 = 1_100_000;

/// Decimal places prices are rounded to after a simulation step.
const PRICE_SCALE: u32 = 2;

struct InstrumentEntry {
    instrument: Instrument,
    history: Vec<PricePoint>,
}

type InstrumentSlot = Arc<RwLock<InstrumentEntry>>;

/// Registry of instruments and their chained price histories.
///
/// Each instrument lives behind its own `RwLock` slot, so a price append
/// or simulation step only write-locks that instrument; the registry map
/// itself is locked just long enough to find or insert the slot. Updates
/// to different instruments never contend.
pub struct PriceFeed {
    entries: RwLock<HashMap<InstrumentId, InstrumentSlot>>,
    max_move_percent: Decimal,
}

impl PriceFeed {
    /// Create an empty feed with the given maximum per-step move, in
    /// percent of the current price.
    #[must_use]
    pub fn new(max_move_percent: Decimal) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_move_percent,
        }
    }

    /// Register an instrument, optionally seeding its history.
    ///
    /// An instrument registered without a price exists unpriced: reads
    /// and appends fail with [`FeedError::NoPrice`] until a later
    /// registration supplies one. Re-registering replaces the metadata,
    /// seeds the history if it is still empty and a price is given, and
    /// otherwise leaves the history untouched.
    pub fn register(
        &self,
        id: InstrumentId,
        instrument: Instrument,
        initial_price: Option<Money>,
    ) {
        let slot = {
            let mut entries = self.entries.write();
            Arc::clone(entries.entry(id.clone()).or_insert_with(|| {
                Arc::new(RwLock::new(InstrumentEntry {
                    instrument: instrument.clone(),
                    history: Vec::new(),
                }))
            }))
        };

        let mut entry = slot.write();
        entry.instrument = instrument;
        if entry.history.is_empty() {
            if let Some(price) = initial_price {
                debug!(instrument_id = %id, price = %price, "instrument registered");
                entry.history.push(PricePoint::seed(id, price, None));
            }
        }
    }

    fn slot(&self, id: &InstrumentId) -> Result<InstrumentSlot, FeedError> {
        self.entries
            .read()
            .get(id)
            .map(Arc::clone)
            .ok_or_else(|| FeedError::UnknownInstrument(id.clone()))
    }

    /// Look up an instrument's metadata.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnknownInstrument`] if the id is not registered.
    pub fn instrument(&self, id: &InstrumentId) -> Result<Instrument, FeedError> {
        self.slot(id).map(|slot| slot.read().instrument.clone())
    }

    /// Resolve a ticker symbol (case-insensitive) to an instrument id.
    #[must_use]
    pub fn resolve_symbol(&self, symbol: &str) -> Option<InstrumentId> {
        let symbol = symbol.to_uppercase();
        self.entries
            .read()
            .iter()
            .find(|(_, slot)| slot.read().instrument.symbol() == symbol)
            .map(|(id, _)| id.clone())
    }

    /// List all registered instrument ids.
    #[must_use]
    pub fn instrument_ids(&self) -> Vec<InstrumentId> {
        self.entries.read().keys().cloned().collect()
    }

    /// Get the most recent price point for an instrument.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnknownInstrument`] if the id is not
    /// registered, or [`FeedError::NoPrice`] if it has no price yet.
    pub fn current(&self, id: &InstrumentId) -> Result<PricePoint, FeedError> {
        let slot = self.slot(id)?;
        let entry = slot.read();
        entry
            .history
            .last()
            .cloned()
            .ok_or_else(|| FeedError::NoPrice(id.clone()))
    }

    /// Get the most recent price for an instrument.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnknownInstrument`] if the id is not
    /// registered, or [`FeedError::NoPrice`] if it has no price yet.
    pub fn current_price(&self, id: &InstrumentId) -> Result<Money, FeedError> {
        self.current(id).map(|point| point.price)
    }

    /// Get the most recent price point for every priced instrument.
    #[must_use]
    pub fn current_all(&self) -> Vec<PricePoint> {
        let slots: Vec<InstrumentSlot> =
            self.entries.read().values().map(Arc::clone).collect();
        slots
            .iter()
            .filter_map(|slot| slot.read().history.last().cloned())
            .collect()
    }

    /// Get the full price history for an instrument, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnknownInstrument`] if the id is not registered.
    pub fn history(&self, id: &InstrumentId) -> Result<Vec<PricePoint>, FeedError> {
        self.slot(id).map(|slot| slot.read().history.clone())
    }

    /// Append a new price, deriving change fields from the current head.
    ///
    /// The new point's previous close is the current head price, keeping
    /// the history chained.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnknownInstrument`] if the id is not
    /// registered, or [`FeedError::NoPrice`] if no prior point exists to
    /// chain from.
    pub fn apply_delta(
        &self,
        id: &InstrumentId,
        new_price: Money,
        volume: Option<u64>,
    ) -> Result<PricePoint, FeedError> {
        let slot = self.slot(id)?;
        let mut entry = slot.write();
        Self::append_delta(&mut entry, id, new_price, volume)
            .ok_or_else(|| FeedError::NoPrice(id.clone()))
    }

    /// Advance one instrument by a random-walk step and return the new point.
    ///
    /// The price moves by a uniform random percentage in
    /// `[-max_move_percent, +max_move_percent]`, rounded to cents and
    /// floored at one cent so a price never reaches zero.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::UnknownInstrument`] if the id is not
    /// registered, or [`FeedError::NoPrice`] if it has no price yet.
    pub fn step(&self, id: &InstrumentId) -> Result<PricePoint, FeedError> {
        let slot = self.slot(id)?;
        let mut entry = slot.write();
        let head = entry
            .history
            .last()
            .ok_or_else(|| FeedError::NoPrice(id.clone()))?;

        let (next, volume) = Self::random_move(head.price, self.max_move_percent);
        Self::append_delta(&mut entry, id, next, Some(volume))
            .ok_or_else(|| FeedError::NoPrice(id.clone()))
    }

    // Must be called with the instrument's write lock held. Returns None
    // if the instrument has no prior point to chain from.
    fn append_delta(
        entry: &mut InstrumentEntry,
        id: &InstrumentId,
        new_price: Money,
        volume: Option<u64>,
    ) -> Option<PricePoint> {
        let head = entry.history.last()?;
        let point = PricePoint::next_in_chain(id.clone(), new_price, head.price, volume);
        entry.history.push(point.clone());
        Some(point)
    }

    fn random_move(previous: Money, max_move_percent: Decimal) -> (Money, u64) {
        let mut rng = rand::rng();
        let bound = max_move_percent.to_f64().unwrap_or(2.0).abs();
        let move_percent = rng.random_range(-bound..=bound);
        let volume = rng.random_range(VOLUME_MIN..VOLUME_MAX);

        let factor = Decimal::try_from(1.0 + move_percent / 100.0).unwrap_or(Decimal::ONE);
        let raw = (previous.amount() * factor).round_dp(PRICE_SCALE);
        // Floor at one cent: the walk must never cross zero.
        let next = raw.max(Decimal::new(1, 2));
        (Money::new(next), volume)
    }
}
