//! Domain layer: value objects and aggregates for the trading engine.
//!
//! Pure business types with no I/O. The feed, ledger, executor, and
//! stream modules build on these.

pub mod errors;
pub mod holding;
pub mod identifiers;
pub mod instrument;
pub mod money;
pub mod order;
pub mod price;

pub use errors::{ExecutorError, FeedError, LedgerError, OrderStateError};
pub use holding::Holding;
pub use identifiers::{ConnectionId, InstrumentId, OrderId, PortfolioId, UserId};
pub use instrument::Instrument;
pub use money::Money;
pub use order::{Order, OrderKind, OrderRequest, OrderSide, OrderStatus, RejectReason};
pub use price::PricePoint;
