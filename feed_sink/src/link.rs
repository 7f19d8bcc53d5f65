//! One producer link, served until the producer closes it.
//!
//! Each `Record` is checked (known topic, key equal to topic, payload decodes in
//! its declared format), logged and answered with an `Ack` carrying the same
//! sequence number. Records failing the checks are rejected, not dropped, so the
//! producer sees the failure in its delivery reports.
use std::io::{BufRead, Write};

use feed_common::record::{Ack, AckStatus, Record, read_frame, write_frame};
use feed_common::tickers::Ticker;
use feed_common::{FeedError, Result, StockUpdate};
use log::{info, warn};

/// Acceptance policy of the sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkPolicy {
    /// Reject every n-th valid record to exercise producer failure handling.
    pub reject_every: Option<u64>,
}

impl LinkPolicy {
    fn rejects(&self, index: u64) -> bool {
        self.reject_every.is_some_and(|n| n > 0 && (index + 1) % n == 0)
    }
}

/// Counters for a served link.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkStats {
    /// Records read.
    pub received: u64,
    /// Records acknowledged as accepted.
    pub accepted: u64,
    /// Records acknowledged as rejected.
    pub rejected: u64,
}

/// Validate a record and decode its tick.
pub fn check_record(record: &Record) -> Result<StockUpdate> {
    let topic: Ticker = record
        .topic
        .parse()
        .map_err(|_| FeedError::Decoding(format!("unknown topic {}", record.topic)))?;
    if record.key != record.topic.as_bytes() {
        return Err(FeedError::Decoding(format!(
            "key {:?} does not match topic {}",
            String::from_utf8_lossy(&record.key),
            record.topic
        )));
    }
    record.format.decode(topic, &record.payload)
}

/// Read records from `input` and write one ack per record to `output` until
/// the producer closes the stream.
pub fn serve_link<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    peer: &str,
    policy: LinkPolicy,
) -> Result<LinkStats> {
    let mut stats = LinkStats::default();

    while let Some(record) = read_frame::<_, Record>(&mut input)? {
        let status = match check_record(&record) {
            Ok(_) if policy.rejects(stats.received) => {
                AckStatus::Rejected("rejected by sink policy".to_string())
            }
            Ok(update) => {
                info!(
                    "TICK: {} Price={:.2} Time={} ({} #{} from {})",
                    update.ticker, update.price, update.timestamp, record.format, record.seq, peer
                );
                AckStatus::Accepted
            }
            Err(e) => {
                warn!("Rejecting record #{} from {}: {}", record.seq, peer, e);
                AckStatus::Rejected(e.to_string())
            }
        };

        stats.received += 1;
        match status {
            AckStatus::Accepted => stats.accepted += 1,
            AckStatus::Rejected(_) => stats.rejected += 1,
        }
        write_frame(&mut output, &Ack { seq: record.seq, status })?;
        output.flush()?;
    }
    Ok(stats)
}
