//! Paced production loop.
//!
//! Every tick of a `crossbeam_channel::tick` timer produces one message:
//! step the price process, stamp the price with the wall clock in nanoseconds,
//! encode it and hand it to the broker client. Encoding and enqueue failures
//! drop that one message and the loop goes on with the next tick. The loop ends
//! when the shutdown channel fires (or disconnects), or after `limit` ticks.
use std::time::Duration;

use chrono::Utc;
use crossbeam_channel::{Receiver, select, tick};
use feed_common::tickers::Ticker;
use feed_common::{FeedError, OutputFormat, StockUpdate};
use log::{debug, info, warn};
use rand::Rng;

use crate::broker::{BrokerClient, EncodedMessage};
use crate::model::price_process::PriceProcess;

/// Time between two ticks for `rate` messages per second.
///
/// Integer division in milliseconds: rates that do not divide 1000 run
/// slightly fast (7/s gives 142ms, about 7.04/s).
pub fn tick_interval(rate: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(rate.max(1)))
}

/// What happened to the message of one tick on the producer side.
#[derive(Debug)]
pub enum TickOutcome {
    /// Accepted by the broker client under this sequence number.
    Enqueued(u64),
    /// Price could not be encoded; message dropped.
    EncodeFailed(FeedError),
    /// Broker client refused the message; message dropped.
    EnqueueFailed(FeedError),
}

/// Counters of a publisher run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Ticks processed.
    pub ticks: u64,
    /// Messages accepted by the broker client.
    pub enqueued: u64,
    /// Messages dropped by the encoder.
    pub encode_failures: u64,
    /// Messages dropped by the broker client.
    pub enqueue_failures: u64,
}

/// Produces one message per tick for a single symbol.
pub struct Publisher<'a, C: BrokerClient, R: Rng> {
    client: &'a C,
    process: PriceProcess<R>,
    ticker: Ticker,
    format: OutputFormat,
    interval: Duration,
    stats: PublishStats,
}

impl<'a, C: BrokerClient, R: Rng> Publisher<'a, C, R> {
    /// Create a publisher sending to `client` every `interval`.
    pub fn new(
        client: &'a C,
        process: PriceProcess<R>,
        ticker: Ticker,
        format: OutputFormat,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            process,
            ticker,
            format,
            interval,
            stats: PublishStats::default(),
        }
    }

    /// Run until `shutdown` fires or `limit` ticks have been produced.
    pub fn run(&mut self, shutdown: &Receiver<()>, limit: Option<u64>) -> PublishStats {
        info!(
            "Starting production loop (Interval: {:?})... Press Ctrl+C to stop.",
            self.interval
        );
        let ticker = tick(self.interval);

        while limit.is_none_or(|max| self.stats.ticks < max) {
            select! {
                recv(ticker) -> _ => {
                    self.produce_one();
                },
                recv(shutdown) -> _ => {
                    info!("Shutdown requested, stopping production loop");
                    break;
                },
            }
        }

        info!(
            "Production loop stopped after {} ticks ({} enqueued, {} encode failures, {} enqueue failures)",
            self.stats.ticks,
            self.stats.enqueued,
            self.stats.encode_failures,
            self.stats.enqueue_failures
        );
        self.stats
    }

    /// Produce and dispatch the message of a single tick.
    pub fn produce_one(&mut self) -> TickOutcome {
        self.stats.ticks += 1;
        let price = self.process.step();
        let update = StockUpdate::new(self.ticker, now_nanos(), price);

        let payload = match self.format.encode(&update) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping {} tick: {}", self.ticker, e);
                self.stats.encode_failures += 1;
                return TickOutcome::EncodeFailed(e);
            }
        };

        let topic = self.ticker.topic();
        let message = EncodedMessage {
            topic: topic.to_string(),
            key: topic.as_bytes().to_vec(),
            format: self.format,
            payload,
        };
        match self.client.enqueue(message) {
            Ok(seq) => {
                debug!(
                    "Produced {} message #{} to topic {}: Price: {:.2} (Nanos: {})",
                    self.format, seq, topic, price, update.timestamp
                );
                self.stats.enqueued += 1;
                TickOutcome::Enqueued(seq)
            }
            Err(e) => {
                warn!("Failed to enqueue {} message: {}", topic, e);
                self.stats.enqueue_failures += 1;
                TickOutcome::EnqueueFailed(e)
            }
        }
    }
}

fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
