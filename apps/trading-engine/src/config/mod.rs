//! Engine configuration, loaded from environment variables.
//!
//! Every knob has a default, so an empty environment yields a working
//! engine. Unparseable values fall back to the default.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::stream::StreamSettings;

/// Random-walk simulation settings.
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Maximum per-step price move, in percent of the current price.
    pub max_move_percent: Decimal,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            max_move_percent: dec!(2),
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Random-walk simulation settings.
    pub simulation: SimulationSettings,
    /// Price streaming settings.
    pub streaming: StreamSettings,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let simulation = SimulationSettings {
            max_move_percent: parse_env_decimal(
                "ENGINE_MAX_MOVE_PERCENT",
                SimulationSettings::default().max_move_percent,
            ),
        };

        let streaming = StreamSettings {
            sample_interval: parse_env_duration_millis(
                "ENGINE_STREAM_SAMPLE_MS",
                StreamSettings::default().sample_interval,
            ),
            channel_capacity: parse_env_usize(
                "ENGINE_STREAM_CHANNEL_CAPACITY",
                StreamSettings::default().channel_capacity,
            ),
        };

        Self {
            simulation,
            streaming,
        }
    }
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_decimal(key: &str, default: Decimal) -> Decimal {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
