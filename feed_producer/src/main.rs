//! Feed Producer — publishes a simulated price series for one ticker to the
//! broker at a fixed rate.
//!
//! Usage example (CLI):
//! ```bash
//! feed_producer --ticker STK_ONE --rate 10 --broker localhost:9092 --format binary
//! ```
//!
//! Wiring:
//! - `TcpBrokerClient` — the broker link. Owns the local send queue and emits a
//!   `DeliveryReport` per message once the broker answers.
//! - `DeliveryTracker` — background thread draining those reports.
//! - `Publisher` — runs on the main thread, one `PriceProcess` step per timer
//!   tick, until Ctrl+C (or `--limit` ticks).
//!
//! On shutdown the client is closed before the tracker is joined, so every
//! message still in flight ends up either delivered or reported as failed.
#![warn(missing_docs)]
mod args;
mod broker;
mod delivery;
mod model;
mod publisher;

use crate::args::Args;
use crate::broker::tcp::{LinkOptions, TcpBrokerClient};
use crate::delivery::DeliveryTracker;
use crate::model::price_process::{ModelParams, PriceProcess};
use crate::publisher::{Publisher, tick_interval};
use clap::Parser;
use crossbeam_channel::bounded;
use feed_common::FeedError;
use feed_common::Result;
use log::info;
use std::time::Duration;

fn main() -> Result<(), FeedError> {
    init_logger();
    let args = Args::parse();

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down producer...");
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| FeedError::Signal(e.to_string()))?;

    let interval = tick_interval(args.rate);
    info!("Starting feed producer");
    info!("   -> Ticker/Topic: {}", args.ticker);
    info!("   -> Broker Address: {}", args.broker);
    info!("   -> Production Rate: {} msg/sec (Interval: {:?})", args.rate, interval);
    info!("   -> Output Format: {}", args.format.to_string().to_uppercase());

    let options = LinkOptions {
        queue_capacity: usize::try_from(args.queue_capacity)
            .map_err(|e| FeedError::Config(format!("--queue-capacity: {}", e)))?,
        linger: Duration::from_millis(args.linger_ms),
    };
    let mut client = TcpBrokerClient::connect(&args.broker, options)?;
    let tracker = DeliveryTracker::spawn(client.events())?;

    let stats = {
        let process = PriceProcess::from_clock(ModelParams::default());
        let mut publisher = Publisher::new(&client, process, args.ticker, args.format, interval);
        publisher.run(&shutdown_rx, args.limit)
    };

    client.close();
    let summary = tracker
        .join()
        .map_err(|_| FeedError::ChannelRecv("delivery tracker panicked".to_string()))?;

    info!(
        "Producer stopped: {} ticks, {} enqueued, {} delivered, {} failed",
        stats.ticks, stats.enqueued, summary.delivered, summary.failed
    );
    Ok(())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
