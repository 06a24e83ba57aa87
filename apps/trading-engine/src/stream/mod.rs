//! Real-time price streaming: per-connection subscription registry and
//! sampling loops.
//!
//! Each live connection owns one sampling loop. On every tick the loop
//! advances each subscribed instrument by a random-walk step and pushes
//! the new point over the connection's bounded channel. A slow consumer
//! never blocks the loop: when its channel is full the update is dropped
//! and logged, so the consumer only ever lags by dropped samples, not by
//! backpressure. Loops never outlive their connection.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{ConnectionId, InstrumentId, PricePoint};
use crate::feed::PriceFeed;

/// Messages delivered to stream subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StreamMessage {
    /// Acknowledges a subscription change with the active instrument set.
    Subscribed {
        /// Instruments the connection is now subscribed to.
        instrument_ids: Vec<InstrumentId>,
    },
    /// A price update for one subscribed instrument.
    PriceUpdate {
        /// Instrument the point belongs to.
        instrument_id: InstrumentId,
        /// The instrument's new current point.
        point: PricePoint,
    },
}

/// Streaming knobs.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// How often each connection's loop samples its instruments.
    pub sample_interval: Duration,
    /// Bound of each connection's outbound channel.
    pub channel_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(5),
            channel_capacity: 16,
        }
    }
}

struct Connection {
    instruments: Arc<RwLock<Vec<InstrumentId>>>,
    tx: mpsc::Sender<StreamMessage>,
    cancel: CancellationToken,
}

type ConnectionMap = Arc<RwLock<HashMap<ConnectionId, Connection>>>;

/// Per-connection subscription registry over the price feed.
///
/// Connection loops are children of the hub's cancellation token, so
/// shutting the hub down tears every loop down with it.
pub struct PriceStreamHub {
    feed: Arc<PriceFeed>,
    settings: StreamSettings,
    cancel: CancellationToken,
    connections: ConnectionMap,
}

impl PriceStreamHub {
    /// Create a hub over the feed. Connection loops stop when `cancel`
    /// fires.
    #[must_use]
    pub fn new(feed: Arc<PriceFeed>, settings: StreamSettings, cancel: CancellationToken) -> Self {
        Self {
            feed,
            settings,
            cancel,
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    /// Set a connection's subscription, replacing any previous set.
    ///
    /// The first subscription for a connection starts its sampling loop
    /// and returns the receiving end of its channel; later calls replace
    /// the instrument set on the running loop and return `None`. Every
    /// call is acknowledged with a [`StreamMessage::Subscribed`] message.
    pub fn subscribe(
        &self,
        connection_id: ConnectionId,
        instruments: Vec<InstrumentId>,
    ) -> Option<mpsc::Receiver<StreamMessage>> {
        // One write-lock pass: concurrent first-subscribes for the same
        // id must not both miss a lookup and spawn two loops.
        let mut connections = self.connections.write();
        match connections.entry(connection_id) {
            Entry::Occupied(occupied) => {
                let connection = occupied.get();
                *connection.instruments.write() = instruments.clone();
                let ack = StreamMessage::Subscribed {
                    instrument_ids: instruments,
                };
                let _ = connection.tx.try_send(ack);
                debug!(connection_id, "subscription replaced");
                None
            }
            Entry::Vacant(vacant) => {
                let (tx, rx) = mpsc::channel(self.settings.channel_capacity);
                let instruments = Arc::new(RwLock::new(instruments));
                let cancel = self.cancel.child_token();

                vacant.insert(Connection {
                    instruments: Arc::clone(&instruments),
                    tx: tx.clone(),
                    cancel: cancel.clone(),
                });
                info!(connection_id, "stream connection opened");

                let sampler = SamplingLoop {
                    connection_id,
                    feed: Arc::clone(&self.feed),
                    instruments,
                    sample_interval: self.settings.sample_interval,
                    tx,
                    cancel,
                };
                let connections = Arc::clone(&self.connections);
                tokio::spawn(async move {
                    sampler.run().await;
                    connections.write().remove(&connection_id);
                    debug!(connection_id, "stream connection closed");
                });

                Some(rx)
            }
        }
    }

    /// Tear down a connection's sampling loop and drop its subscription.
    ///
    /// Safe to call on every exit path; unknown ids are ignored.
    pub fn unsubscribe(&self, connection_id: ConnectionId) {
        if let Some(connection) = self.connections.write().remove(&connection_id) {
            connection.cancel.cancel();
            info!(connection_id, "stream connection unsubscribed");
        }
    }
}

struct SamplingLoop {
    connection_id: ConnectionId,
    feed: Arc<PriceFeed>,
    instruments: Arc<RwLock<Vec<InstrumentId>>>,
    sample_interval: Duration,
    tx: mpsc::Sender<StreamMessage>,
    cancel: CancellationToken,
}

impl SamplingLoop {
    async fn run(self) {
        let ack = StreamMessage::Subscribed {
            instrument_ids: self.instruments.read().clone(),
        };
        if self.push(ack) == Push::Closed {
            return;
        }

        let mut ticker = tokio::time::interval(self.sample_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if self.tick() == Push::Closed {
                        return;
                    }
                }
            }
        }
    }

    /// Advance and push each subscribed instrument. A feed error on one
    /// instrument never aborts updates for the others in the same tick.
    fn tick(&self) -> Push {
        let instruments = self.instruments.read().clone();
        for instrument_id in instruments {
            match self.feed.step(&instrument_id) {
                Ok(point) => {
                    let message = StreamMessage::PriceUpdate {
                        instrument_id,
                        point,
                    };
                    if self.push(message) == Push::Closed {
                        return Push::Closed;
                    }
                }
                Err(error) => {
                    debug!(
                        connection_id = self.connection_id,
                        instrument_id = %instrument_id,
                        error = %error,
                        "skipping instrument this tick"
                    );
                }
            }
        }
        Push::Sent
    }

    fn push(&self, message: StreamMessage) -> Push {
        match self.tx.try_send(message) {
            Ok(()) => Push::Sent,
            Err(TrySendError::Full(_)) => {
                // Slow consumer: drop this sample, the next tick sends
                // the then-current value.
                warn!(
                    connection_id = self.connection_id,
                    "stream channel full, dropping update"
                );
                Push::Dropped
            }
            Err(TrySendError::Closed(_)) => Push::Closed,
        }
    }
}

#[derive(PartialEq, Eq)]
enum Push {
    Sent,
    Dropped,
    Closed,
}
