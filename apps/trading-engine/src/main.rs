//! Trading Engine Binary
//!
//! Starts the simulated trading engine: seeds a default instrument set,
//! opens a demo stream connection over all of them, and logs price
//! updates until shutdown.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trading-engine
//! ```
//!
//! # Environment Variables
//!
//! All optional:
//! - `ENGINE_MAX_MOVE_PERCENT`: Max per-tick price move (default: 2)
//! - `ENGINE_STREAM_SAMPLE_MS`: Stream sampling interval (default: 5000)
//! - `ENGINE_STREAM_CHANNEL_CAPACITY`: Per-connection channel bound (default: 16)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use rust_decimal_macros::dec;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use trading_engine::{
    EngineConfig, Instrument, InstrumentId, Money, PriceFeed, PriceStreamHub, StreamMessage,
};

/// Connection id of the built-in demo subscriber.
const DEMO_CONNECTION: u64 = 1;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();
    init_tracing();

    tracing::info!("Starting trading engine");

    let config = EngineConfig::from_env();
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let feed = Arc::new(PriceFeed::new(config.simulation.max_move_percent));
    seed_instruments(&feed);

    let hub = Arc::new(PriceStreamHub::new(
        Arc::clone(&feed),
        config.streaming.clone(),
        shutdown_token.clone(),
    ));

    // Demo connection: subscribes to every seeded instrument and logs
    // the sampled prices.
    let Some(mut updates) = hub.subscribe(DEMO_CONNECTION, feed.instrument_ids()) else {
        anyhow::bail!("demo connection id already in use");
    };
    let printer = tokio::spawn(async move {
        while let Some(message) = updates.recv().await {
            match message {
                StreamMessage::Subscribed { instrument_ids } => {
                    tracing::info!(instruments = instrument_ids.len(), "subscribed");
                }
                StreamMessage::PriceUpdate { instrument_id, point } => {
                    tracing::info!(
                        instrument_id = %instrument_id,
                        price = %point.price,
                        change_percent = %point.change_percent,
                        "price update"
                    );
                }
            }
        }
    });

    tracing::info!("Trading engine ready");

    await_shutdown(shutdown_token).await;
    hub.unsubscribe(DEMO_CONNECTION);
    let _ = printer.await;

    tracing::info!("Trading engine stopped");
    Ok(())
}

/// Register the default instrument set with seed prices.
fn seed_instruments(feed: &PriceFeed) {
    let seeds = [
        ("AAPL", dec!(150.25)),
        ("MSFT", dec!(320.10)),
        ("GOOGL", dec!(135.60)),
        ("AMZN", dec!(141.80)),
        ("TSLA", dec!(248.50)),
        ("NVDA", dec!(455.75)),
    ];
    for (symbol, price) in seeds {
        feed.register(
            InstrumentId::generate(),
            Instrument::new(symbol, "USD"),
            Some(Money::new(price)),
        );
    }
    for point in feed.current_all() {
        tracing::debug!(instrument_id = %point.instrument_id, price = %point.price, "seeded");
    }
    tracing::info!(count = seeds.len(), "instruments seeded");
}

/// Initialize tracing with the `RUST_LOG` filter, defaulting to info.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

/// Log the parsed configuration.
fn log_config(config: &EngineConfig) {
    tracing::info!(
        max_move_percent = %config.simulation.max_move_percent,
        stream_sample_ms = config.streaming.sample_interval.as_millis(),
        stream_channel_capacity = config.streaming.channel_capacity,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
