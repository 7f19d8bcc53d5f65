//! Command-line arguments for the broker sink.
use clap::Parser;
use feed_common::net::{BROKER_PORT, addr};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Address to accept producer links on.
    #[arg(long, default_value_t = addr("0.0.0.0", BROKER_PORT))]
    pub listen: String,

    /// Reject every n-th valid record.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub reject_every: Option<u64>,
}
