//! Records and acknowledgements exchanged over the broker link.
//!
//! The producer writes one `Record` per published tick; the broker answers each
//! one with an `Ack` carrying the same sequence number. Acks arrive in the order
//! the broker finishes with the records, which is not necessarily send order.
//! Both directions are plain `bincode` values written back to back on the TCP
//! stream; the encoding is self-delimiting so no extra framing is needed.
use std::io::{BufRead, Write};

use bincode::config::{self, Configuration, Limit, LittleEndian, Varint};
use bincode::{Decode, Encode};

use crate::format::OutputFormat;
use crate::result::Result;

/// Largest value accepted from the wire, in bytes.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

const LINK_CONFIG: Configuration<LittleEndian, Varint, Limit<MAX_FRAME_BYTES>> =
    config::standard().with_limit::<MAX_FRAME_BYTES>();

/// One message submitted to the broker.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Record {
    /// Producer-assigned sequence number, unique per link.
    pub seq: u64,
    /// Destination topic.
    pub topic: String,
    /// Partitioning key.
    pub key: Vec<u8>,
    /// Encoding of `payload`.
    pub format: OutputFormat,
    /// Encoded tick.
    pub payload: Vec<u8>,
}

/// Outcome reported by the broker for a single record.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum AckStatus {
    /// The record was durably accepted.
    Accepted,
    /// The record was refused; carries the broker's reason.
    Rejected(String),
}

/// Broker answer to a `Record`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Ack {
    /// Sequence number of the record this ack refers to.
    pub seq: u64,
    /// Accepted or rejected.
    pub status: AckStatus,
}

/// Write one value to the link.
pub fn write_frame<W: Write, T: Encode>(writer: &mut W, value: &T) -> Result<usize> {
    Ok(bincode::encode_into_std_write(value, writer, LINK_CONFIG)?)
}

/// Read one value from the link.
///
/// Returns `Ok(None)` when the peer closed the stream between values. A stream
/// ending inside a value is an error.
pub fn read_frame<R: BufRead, T: Decode<()>>(reader: &mut R) -> Result<Option<T>> {
    if reader.fill_buf()?.is_empty() {
        return Ok(None);
    }
    Ok(Some(bincode::decode_from_std_read(reader, LINK_CONFIG)?))
}
