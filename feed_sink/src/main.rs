//! Broker sink — a development stand-in for the message broker.
//!
//! Accepts producer links over TCP, decodes every record with the format it
//! declares, logs the tick and acknowledges it. Lets the producer's delivery
//! reporting be exercised without external infrastructure.
//!
//! Usage example (CLI):
//! ```bash
//! feed_sink --listen 0.0.0.0:9092 --reject-every 50
//! ```
#![warn(missing_docs)]
mod args;
mod link;
mod receiver;

use crate::args::Args;
use crate::link::LinkPolicy;
use crate::receiver::LinkReceiver;
use clap::Parser;
use feed_common::FeedError;
use feed_common::Result;
use log::info;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

fn main() -> Result<(), FeedError> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down sink...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| FeedError::Signal(e.to_string()))?;
    }

    let policy = LinkPolicy {
        reject_every: args.reject_every,
    };
    LinkReceiver::new(&args.listen)?.accept_loop(policy, shutdown)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
