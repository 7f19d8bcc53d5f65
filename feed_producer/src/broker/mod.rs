//! Broker client seam.
//!
//! The publisher only needs a non-blocking "accept this message for sending"
//! call; the outcome of each send is reported later on a separate stream of
//! `DeliveryReport`s, in completion order. `tcp` implements both over the TCP
//! broker link; tests substitute an in-memory client.
use feed_common::{OutputFormat, Result};

pub mod tcp;

/// Encoded tick ready to be handed to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMessage {
    /// Destination topic.
    pub topic: String,
    /// Partitioning key.
    pub key: Vec<u8>,
    /// Encoding of `payload`.
    pub format: OutputFormat,
    /// Encoded tick.
    pub payload: Vec<u8>,
}

/// Final outcome of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Broker acknowledged the message.
    Delivered,
    /// Message was lost; carries the cause.
    Failed(String),
}

/// Asynchronous result for one enqueued message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sequence number returned by `enqueue`.
    pub seq: u64,
    /// Topic the message was sent to.
    pub topic: String,
    /// Delivered or failed.
    pub status: DeliveryStatus,
}

/// Non-blocking producer handle.
pub trait BrokerClient {
    /// Accept `message` for asynchronous transmission.
    ///
    /// Returns the sequence number that the matching `DeliveryReport` will
    /// carry. `Ok` only means the message was queued locally. A full queue
    /// fails with `FeedError::QueueFull` instead of waiting.
    fn enqueue(&self, message: EncodedMessage) -> Result<u64>;
}
