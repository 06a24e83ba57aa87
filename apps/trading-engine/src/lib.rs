#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Trading Engine - Simulated Order Execution and Price Streaming
//!
//! An in-process engine for a simulated securities trading application:
//! a random-walk price feed with chained history, a fan-out streaming hub,
//! a holdings ledger reconciled at volume-weighted average cost, and an
//! order executor that drives every submission to a terminal state.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Business types with no I/O
//!   - `identifiers`, `money`, `instrument`, `price`: value objects
//!   - `order`, `holding`: aggregates with guarded transitions
//!
//! - **Core services**
//!   - `feed`: Instrument registry, chained price history, simulation step
//!   - `ledger`: Per-position serialized holdings reconciliation
//!   - `executor`: Order lifecycle, fills, rejections, persistence port
//!   - `stream`: Per-connection price sampling and fan-out
//!
//! - **Configuration**
//!   - `config`: Environment-driven settings with defaults
//!
//! # Data Flow
//!
//! ```text
//! sampling loops ──► PriceFeed ──► PriceStreamHub ──► connection 1..N
//!                        │
//! OrderRequest ──► OrderExecutor ──► HoldingsLedger
//!                        │
//!                        └──► OrderRepository
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Configuration loaded from environment variables.
pub mod config;

/// Domain layer - Business types with no I/O.
pub mod domain;

/// Order executor and persistence port.
pub mod executor;

/// Price feed and random-walk simulation.
pub mod feed;

/// Holdings ledger.
pub mod ledger;

/// Price streaming hub and per-connection sampling loops.
pub mod stream;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::{
    ConnectionId, ExecutorError, FeedError, Holding, Instrument, InstrumentId, LedgerError, Money,
    Order, OrderId, OrderKind, OrderRequest, OrderSide, OrderStateError, OrderStatus, PortfolioId,
    PricePoint, RejectReason, UserId,
};

// Core services
pub use executor::{ExecutionReport, InMemoryOrderRepository, OrderExecutor, OrderRepository};
pub use feed::PriceFeed;
pub use ledger::{FillOutcome, HoldingsLedger};
pub use stream::{PriceStreamHub, StreamMessage, StreamSettings};

// Configuration
pub use config::{EngineConfig, SimulationSettings};
