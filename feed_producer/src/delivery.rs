//! Delivery report handling.
//!
//! The tracker drains the broker client's report stream on its own thread for
//! as long as the stream is open. Successes are logged at debug level; failures
//! are logged with topic, sequence number and cause. Nothing is retried.
use std::io;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Receiver;
use log::{debug, error, info};

use crate::broker::{DeliveryReport, DeliveryStatus};

/// Totals observed by the tracker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySummary {
    /// Messages acknowledged by the broker.
    pub delivered: u64,
    /// Messages reported lost.
    pub failed: u64,
}

/// Consumer of delivery reports.
pub struct DeliveryTracker;

impl DeliveryTracker {
    /// Drain `reports` on a background thread until the stream closes.
    pub fn spawn(reports: Receiver<DeliveryReport>) -> io::Result<JoinHandle<DeliverySummary>> {
        thread::Builder::new()
            .name("delivery-tracker".to_string())
            .spawn(move || Self::drain(reports))
    }

    /// Drain `reports` on the current thread until the stream closes.
    pub fn drain(reports: Receiver<DeliveryReport>) -> DeliverySummary {
        let mut summary = DeliverySummary::default();
        for report in reports.iter() {
            Self::record(&mut summary, report);
        }
        info!(
            "Delivery report stream closed: {} delivered, {} failed",
            summary.delivered, summary.failed
        );
        summary
    }

    fn record(summary: &mut DeliverySummary, report: DeliveryReport) {
        match report.status {
            DeliveryStatus::Delivered => {
                debug!("Delivered message #{} to {}", report.seq, report.topic);
                summary.delivered += 1;
            }
            DeliveryStatus::Failed(cause) => {
                error!(
                    "Delivery failed for {} message #{}: {}",
                    report.topic, report.seq, cause
                );
                summary.failed += 1;
            }
        }
    }
}
