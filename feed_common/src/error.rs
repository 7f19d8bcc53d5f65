//! Error type shared by the producer and the sink.
//!
//! `FeedError` covers startup failures (configuration, broker connection, signal
//! handler), per-message failures on the production path (encoding, enqueue) and
//! the plumbing errors of the broker link (I/O, bincode, channels).
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by producer and sink.
#[derive(Error, Debug)]
pub enum FeedError {
    /// I/O error originating from sockets.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration detected at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The broker link could not be established.
    #[error("Failed to connect to broker {addr}: {reason}")]
    Connect {
        /// Broker address as given on the command line.
        addr: String,
        /// Underlying cause.
        reason: String,
    },

    /// Price cannot be represented in the selected wire format.
    #[error("Cannot encode price {price}: {reason}")]
    Encoding {
        /// Price that failed to encode.
        price: f64,
        /// Why the value is out of range.
        reason: String,
    },

    /// Payload could not be turned back into a `StockUpdate`.
    #[error("Cannot decode payload: {0}")]
    Decoding(String),

    /// The local send queue rejected the record.
    #[error("Local send queue is full")]
    QueueFull,

    /// The broker link is closed; nothing more can be enqueued.
    #[error("Broker link is closed")]
    Disconnected,

    /// Failure while decoding with `bincode` (invalid or truncated payloads, etc.).
    #[error("Bincode deserialization error: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),

    /// Failure while encoding with `bincode`.
    #[error("Bincode serialization error: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Channel receive failed because every sender is gone.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// A poisoned mutex was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),

    /// The process signal handler could not be installed.
    #[error("Signal handler error: {0}")]
    Signal(String),
}

impl<T> From<PoisonError<T>> for FeedError {
    fn from(err: PoisonError<T>) -> Self {
        FeedError::MutexLock(err.to_string())
    }
}
