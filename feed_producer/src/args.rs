//! Command-line arguments for the feed producer.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use feed_common::OutputFormat;
use feed_common::tickers::Ticker;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Symbol to simulate. Also the topic and message key.
    #[arg(long, value_enum, ignore_case = true)]
    pub ticker: Ticker,

    /// Messages per second (1..=1000).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub rate: u32,

    /// Broker address, e.g. my-broker:9092.
    #[arg(long)]
    pub broker: String,

    /// Payload encoding.
    #[arg(long, value_enum, ignore_case = true)]
    pub format: OutputFormat,

    /// Capacity of the local send queue.
    #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(1..))]
    pub queue_capacity: u64,

    /// Milliseconds to wait for outstanding acknowledgements on shutdown.
    #[arg(long, default_value_t = 5_000)]
    pub linger_ms: u64,

    /// Stop after this many ticks.
    #[arg(long)]
    pub limit: Option<u64>,
}
