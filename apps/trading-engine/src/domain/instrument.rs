//! Tradeable instrument identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A tradeable instrument (symbol plus settlement currency).
///
/// Immutable identity: referenced by [`crate::domain::InstrumentId`]
/// everywhere else and never mutated after registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    symbol: String,
    currency: String,
}

impl Instrument {
    /// Create a new instrument. The symbol is uppercased.
    #[must_use]
    pub fn new(symbol: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            currency: currency.into(),
        }
    }

    /// Get the ticker symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Get the settlement currency code.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.currency)
    }
}
