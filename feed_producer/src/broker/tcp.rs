//! `BrokerClient` over the TCP broker link.
//!
//! A connected client runs two background threads:
//!
//! - writer — drains the bounded local send queue and writes each `Record` to the
//!   socket. The record is registered as in flight before it is written. A write
//!   error fails that record, and every later record fails without touching the
//!   socket. Once the reader has stopped, nothing can be acknowledged any more,
//!   so records are failed as soon as they are taken off the queue.
//! - reader — decodes `Ack`s from the socket and turns each into a
//!   `DeliveryReport` for the matching in-flight record.
//!
//! `enqueue` never blocks: a full queue is reported as `FeedError::QueueFull`.
//! Sequence numbers are handed out only to accepted records, so they have no gaps.
//! `close` (also run on drop) stops accepting records, lets the writer flush the
//! queue, half-closes the socket and waits for the remaining acks. Flushing and
//! waiting share one `linger` deadline; when it passes the socket is shut down,
//! which unblocks a writer stuck on a broker that stopped reading. Whatever is
//! still queued or in flight after that is reported as failed, and the report
//! stream is closed.
use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{
    Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded, unbounded,
};
use feed_common::record::{Ack, AckStatus, Record, read_frame, write_frame};
use feed_common::{FeedError, Result};
use log::{debug, error, info, warn};

use super::{BrokerClient, DeliveryReport, DeliveryStatus, EncodedMessage};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const LINK_CLOSED: &str = "link closed before acknowledgement";

/// Records written but not yet acknowledged: sequence number -> topic.
type InFlight = Arc<Mutex<HashMap<u64, String>>>;

/// Tuning of the broker link.
#[derive(Debug, Clone, Copy)]
pub struct LinkOptions {
    /// Capacity of the local send queue.
    pub queue_capacity: usize,
    /// How long `close` waits for outstanding acks.
    pub linger: Duration,
}

/// Producer handle for the TCP broker link.
pub struct TcpBrokerClient {
    queue_tx: Option<Sender<Record>>,
    reports_tx: Option<Sender<DeliveryReport>>,
    reports_rx: Receiver<DeliveryReport>,
    in_flight: InFlight,
    next_seq: Mutex<u64>,
    stream: TcpStream,
    writer: Option<JoinHandle<()>>,
    writer_done: Receiver<()>,
    reader: Option<JoinHandle<()>>,
    reader_done: Receiver<()>,
    linger: Duration,
}

impl TcpBrokerClient {
    /// Connect to the broker at `addr` (`host:port`) and start the link threads.
    pub fn connect(addr: &str, options: LinkOptions) -> Result<Self> {
        let stream = open_stream(addr)?;
        stream.set_nodelay(true)?;

        let (queue_tx, queue_rx) = bounded::<Record>(options.queue_capacity);
        let (reports_tx, reports_rx) = unbounded::<DeliveryReport>();
        let (reader_done_tx, reader_done) = bounded::<()>(0);
        let (writer_done_tx, writer_done) = bounded::<()>(0);
        let in_flight: InFlight = Arc::default();

        let reader = {
            let stream = stream.try_clone()?;
            let in_flight = Arc::clone(&in_flight);
            let reports = reports_tx.clone();
            thread::Builder::new()
                .name("broker-reader".to_string())
                .spawn(move || {
                    read_loop(stream, &in_flight, &reports);
                    // Signal first: a record the writer registers after the
                    // sweep below is caught by the writer itself.
                    drop(reader_done_tx);
                    fail_in_flight(&in_flight, &reports, LINK_CLOSED);
                })?
        };

        let writer = {
            let stream = stream.try_clone()?;
            let in_flight = Arc::clone(&in_flight);
            let reports = reports_tx.clone();
            let reader_done = reader_done.clone();
            thread::Builder::new()
                .name("broker-writer".to_string())
                .spawn(move || {
                    write_loop(stream, queue_rx, reader_done, in_flight, reports);
                    drop(writer_done_tx);
                })?
        };

        info!("Connected to broker at {}", stream.peer_addr()?);

        Ok(Self {
            queue_tx: Some(queue_tx),
            reports_tx: Some(reports_tx),
            reports_rx,
            in_flight,
            next_seq: Mutex::new(0),
            stream,
            writer: Some(writer),
            writer_done,
            reader: Some(reader),
            reader_done,
            linger: options.linger,
        })
    }

    /// Stream of delivery reports, in completion order.
    ///
    /// The stream ends once the client is closed and every report was emitted.
    pub fn events(&self) -> Receiver<DeliveryReport> {
        self.reports_rx.clone()
    }

    /// Flush, wait for outstanding acks and release the link. Idempotent.
    pub fn close(&mut self) {
        let Some(queue_tx) = self.queue_tx.take() else {
            return;
        };
        drop(queue_tx);
        let deadline = Instant::now() + self.linger;

        if let Err(RecvTimeoutError::Timeout) = self.writer_done.recv_deadline(deadline) {
            warn!(
                "Send queue not flushed after {:?}, broker stopped reading; dropping the link",
                self.linger
            );
            let _ = self.stream.shutdown(Shutdown::Both);
        }
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                error!("Broker writer thread panicked");
            }
        }

        let _ = self.stream.shutdown(Shutdown::Write);
        if let Err(RecvTimeoutError::Timeout) = self.reader_done.recv_deadline(deadline) {
            warn!(
                "{} message(s) still unacknowledged after {:?}, dropping the link",
                pending(&self.in_flight),
                self.linger
            );
            let _ = self.stream.shutdown(Shutdown::Both);
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                error!("Broker reader thread panicked");
            }
        }

        if let Some(reports) = self.reports_tx.take() {
            fail_in_flight(&self.in_flight, &reports, LINK_CLOSED);
        }
        info!("Broker link closed");
    }
}

impl BrokerClient for TcpBrokerClient {
    fn enqueue(&self, message: EncodedMessage) -> Result<u64> {
        let queue = self.queue_tx.as_ref().ok_or(FeedError::Disconnected)?;
        let mut next_seq = self.next_seq.lock()?;
        let seq = *next_seq;
        let record = Record {
            seq,
            topic: message.topic,
            key: message.key,
            format: message.format,
            payload: message.payload,
        };
        queue.try_send(record).map_err(|e| match e {
            TrySendError::Full(_) => FeedError::QueueFull,
            TrySendError::Disconnected(_) => FeedError::Disconnected,
        })?;
        *next_seq += 1;
        Ok(seq)
    }
}

impl Drop for TcpBrokerClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn open_stream(addr: &str) -> Result<TcpStream> {
    let connect_error = |reason: String| FeedError::Connect {
        addr: addr.to_string(),
        reason,
    };
    let candidates = addr
        .to_socket_addrs()
        .map_err(|e| connect_error(e.to_string()))?;

    let mut last_error = String::from("address did not resolve");
    for candidate in candidates {
        match TcpStream::connect_timeout(&candidate, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", candidate, e);
                last_error = e.to_string();
            }
        }
    }
    Err(connect_error(last_error))
}

fn write_loop(
    stream: TcpStream,
    queue: Receiver<Record>,
    reader_done: Receiver<()>,
    in_flight: InFlight,
    reports: Sender<DeliveryReport>,
) {
    let mut out = BufWriter::new(stream);
    let mut broken: Option<String> = None;

    for record in queue.iter() {
        if broken.is_none() && reader_stopped(&reader_done) {
            broken = Some(LINK_CLOSED.to_string());
        }
        if let Some(cause) = &broken {
            emit(&reports, record.seq, record.topic, DeliveryStatus::Failed(cause.clone()));
            continue;
        }

        let tracked = lock_in_flight(&in_flight)
            .map(|mut map| map.insert(record.seq, record.topic.clone()));
        if let Err(e) = tracked {
            error!("Cannot track record {}: {}", record.seq, e);
            emit(&reports, record.seq, record.topic, DeliveryStatus::Failed(e.to_string()));
            continue;
        }

        let written = write_frame(&mut out, &record).and_then(|size| {
            out.flush()?;
            Ok(size)
        });
        match written {
            Ok(size) => {
                debug!("Record {} written to {} ({} bytes)", record.seq, record.topic, size);
                // Registered after the reader's final sweep: no ack can come.
                let orphaned = reader_stopped(&reader_done)
                    && take_in_flight(&in_flight, record.seq).is_some();
                if orphaned {
                    let status = DeliveryStatus::Failed(LINK_CLOSED.to_string());
                    emit(&reports, record.seq, record.topic, status);
                }
            }
            Err(e) => {
                error!("Failed to write record {} to broker: {}", record.seq, e);
                let cause = e.to_string();
                if take_in_flight(&in_flight, record.seq).is_some() {
                    emit(&reports, record.seq, record.topic, DeliveryStatus::Failed(cause.clone()));
                }
                broken = Some(cause);
            }
        }
    }
    debug!("Broker writer stopped");
}

fn read_loop(stream: TcpStream, in_flight: &InFlight, reports: &Sender<DeliveryReport>) {
    let mut input = BufReader::new(stream);
    loop {
        match read_frame::<_, Ack>(&mut input) {
            Ok(Some(ack)) => {
                let Some(topic) = take_in_flight(in_flight, ack.seq) else {
                    warn!("Acknowledgement for unknown record {}", ack.seq);
                    continue;
                };
                let status = match ack.status {
                    AckStatus::Accepted => DeliveryStatus::Delivered,
                    AckStatus::Rejected(reason) => DeliveryStatus::Failed(reason),
                };
                emit(reports, ack.seq, topic, status);
            }
            Ok(None) => {
                debug!("Broker closed the link");
                break;
            }
            Err(e) => {
                error!("Failed to read acknowledgement: {}", e);
                break;
            }
        }
    }
}

fn reader_stopped(reader_done: &Receiver<()>) -> bool {
    matches!(reader_done.try_recv(), Err(TryRecvError::Disconnected))
}

fn emit(reports: &Sender<DeliveryReport>, seq: u64, topic: String, status: DeliveryStatus) {
    let _ = reports.send(DeliveryReport { seq, topic, status });
}

fn lock_in_flight(in_flight: &InFlight) -> Result<MutexGuard<'_, HashMap<u64, String>>> {
    Ok(in_flight.lock()?)
}

fn take_in_flight(in_flight: &InFlight, seq: u64) -> Option<String> {
    match lock_in_flight(in_flight) {
        Ok(mut map) => map.remove(&seq),
        Err(e) => {
            error!("Cannot resolve record {}: {}", seq, e);
            None
        }
    }
}

fn pending(in_flight: &InFlight) -> usize {
    lock_in_flight(in_flight).map(|map| map.len()).unwrap_or(0)
}

fn fail_in_flight(in_flight: &InFlight, reports: &Sender<DeliveryReport>, cause: &str) {
    let mut orphaned: Vec<(u64, String)> = match lock_in_flight(in_flight) {
        Ok(mut map) => map.drain().collect(),
        Err(e) => {
            error!("Cannot fail in-flight records: {}", e);
            return;
        }
    };
    orphaned.sort_unstable_by_key(|(seq, _)| *seq);
    for (seq, topic) in orphaned {
        emit(reports, seq, topic, DeliveryStatus::Failed(cause.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feed_common::OutputFormat;
    use std::io;
    use std::net::TcpListener;

    /// Loopback broker: reads `expected` records, answers with `reply`, then
    /// drains the link until the producer closes it.
    fn spawn_broker(
        expected: usize,
        reply: fn(&[Record]) -> Vec<Ack>,
    ) -> (String, JoinHandle<Vec<Record>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut input = BufReader::new(stream.try_clone().unwrap());
            let mut records = Vec::new();
            while records.len() < expected {
                match read_frame::<_, Record>(&mut input).unwrap() {
                    Some(record) => records.push(record),
                    None => break,
                }
            }
            for ack in reply(&records) {
                write_frame(&mut stream, &ack).unwrap();
            }
            while let Ok(Some(_)) = read_frame::<_, Record>(&mut input) {}
            records
        });
        (addr, handle)
    }

    fn message(payload: &[u8]) -> EncodedMessage {
        EncodedMessage {
            topic: "STK_ONE".to_string(),
            key: b"STK_ONE".to_vec(),
            format: OutputFormat::Text,
            payload: payload.to_vec(),
        }
    }

    fn options() -> LinkOptions {
        LinkOptions {
            queue_capacity: 16,
            linger: Duration::from_secs(2),
        }
    }

    #[test]
    fn acks_become_delivery_reports() {
        let (addr, broker) = spawn_broker(2, |records| {
            vec![
                Ack {
                    seq: records[0].seq,
                    status: AckStatus::Accepted,
                },
                Ack {
                    seq: records[1].seq,
                    status: AckStatus::Rejected("not leader".to_string()),
                },
            ]
        });

        let mut client = TcpBrokerClient::connect(&addr, options()).unwrap();
        let events = client.events();
        assert_eq!(client.enqueue(message(b"a")).unwrap(), 0);
        assert_eq!(client.enqueue(message(b"b")).unwrap(), 1);
        client.close();

        let reports: Vec<DeliveryReport> = events.iter().collect();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].seq, 0);
        assert_eq!(reports[0].status, DeliveryStatus::Delivered);
        assert_eq!(reports[1].topic, "STK_ONE");
        assert_eq!(
            reports[1].status,
            DeliveryStatus::Failed("not leader".to_string())
        );

        let records = broker.join().unwrap();
        assert_eq!(records[0].key, b"STK_ONE".to_vec());
        assert_eq!(records[1].payload, b"b".to_vec());
    }

    #[test]
    fn reports_follow_completion_order() {
        let (addr, broker) = spawn_broker(3, |records| {
            records
                .iter()
                .rev()
                .map(|r| Ack {
                    seq: r.seq,
                    status: AckStatus::Accepted,
                })
                .collect()
        });

        let mut client = TcpBrokerClient::connect(&addr, options()).unwrap();
        let events = client.events();
        for payload in [b"x", b"y", b"z"] {
            client.enqueue(message(payload)).unwrap();
        }
        client.close();

        let seqs: Vec<u64> = events.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![2, 1, 0]);
        broker.join().unwrap();
    }

    #[test]
    fn unacknowledged_records_fail_on_close() {
        let (addr, broker) = spawn_broker(2, |_| Vec::new());

        let mut client = TcpBrokerClient::connect(&addr, options()).unwrap();
        let events = client.events();
        client.enqueue(message(b"1")).unwrap();
        client.enqueue(message(b"2")).unwrap();
        client.close();

        let reports: Vec<DeliveryReport> = events.iter().collect();
        assert_eq!(reports.len(), 2);
        assert!(
            reports
                .iter()
                .all(|r| matches!(r.status, DeliveryStatus::Failed(_)))
        );
        broker.join().unwrap();
    }

    #[test]
    fn enqueue_after_close_is_rejected() {
        let (addr, broker) = spawn_broker(0, |_| Vec::new());
        let mut client = TcpBrokerClient::connect(&addr, options()).unwrap();
        client.close();
        assert!(matches!(
            client.enqueue(message(b"late")),
            Err(FeedError::Disconnected)
        ));
        broker.join().unwrap();
    }

    #[test]
    fn connect_failure_is_reported() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        assert!(matches!(
            TcpBrokerClient::connect(&addr, options()),
            Err(FeedError::Connect { .. })
        ));
        assert!(matches!(
            TcpBrokerClient::connect("not an address", options()),
            Err(FeedError::Connect { .. })
        ));
    }

    #[test]
    fn stalled_broker_does_not_block_close() {
        // Accepts the link but never reads from it.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (release_tx, release_rx) = bounded::<()>(0);
        let broker = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let _ = release_rx.recv();
            drop(stream);
        });

        let mut client = TcpBrokerClient::connect(
            &addr,
            LinkOptions {
                queue_capacity: 128,
                linger: Duration::from_millis(500),
            },
        )
        .unwrap();
        let events = client.events();
        let payload = vec![7u8; 512 * 1024];
        for _ in 0..64 {
            client.enqueue(message(&payload)).unwrap();
        }

        let started = Instant::now();
        client.close();
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(5), "close took {:?}", elapsed);

        let reports: Vec<DeliveryReport> = events.iter().collect();
        assert_eq!(reports.len(), 64);
        assert!(
            reports
                .iter()
                .all(|r| matches!(r.status, DeliveryStatus::Failed(_)))
        );

        drop(release_tx);
        broker.join().unwrap();
    }

    #[test]
    fn refused_records_leave_no_sequence_gap() {
        // Stops reading until released, so the small queue fills up.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let (go_tx, go_rx) = bounded::<()>(0);
        let broker = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            go_rx.recv().unwrap();
            let _ = io::copy(&mut stream, &mut io::sink());
        });

        let mut client = TcpBrokerClient::connect(
            &addr,
            LinkOptions {
                queue_capacity: 2,
                linger: Duration::from_secs(2),
            },
        )
        .unwrap();
        let payload = vec![1u8; 512 * 1024];
        let mut accepted = 0u64;
        let mut refused = 0;
        let give_up = Instant::now() + Duration::from_secs(5);
        while refused < 3 && Instant::now() < give_up {
            match client.enqueue(message(&payload)) {
                Ok(seq) => {
                    assert_eq!(seq, accepted);
                    accepted += 1;
                }
                Err(FeedError::QueueFull) => refused += 1,
                Err(e) => panic!("unexpected enqueue error: {}", e),
            }
        }
        assert_eq!(refused, 3);

        go_tx.send(()).unwrap();
        let seq = loop {
            match client.enqueue(message(b"after")) {
                Ok(seq) => break seq,
                Err(FeedError::QueueFull) if Instant::now() < give_up => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => panic!("queue never drained: {}", e),
            }
        };
        assert_eq!(seq, accepted);

        client.close();
        broker.join().unwrap();
    }

    #[test]
    fn record_written_after_broker_left_fails_immediately() {
        // Acks one record, then closes the link.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let broker = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut input = BufReader::new(stream.try_clone().unwrap());
            let record = read_frame::<_, Record>(&mut input).unwrap().unwrap();
            let ack = Ack {
                seq: record.seq,
                status: AckStatus::Accepted,
            };
            write_frame(&mut stream, &ack).unwrap();
        });

        let mut client = TcpBrokerClient::connect(&addr, options()).unwrap();
        let events = client.events();
        client.enqueue(message(b"first")).unwrap();
        let first = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.status, DeliveryStatus::Delivered);
        broker.join().unwrap();

        assert_eq!(
            client.reader_done.recv_timeout(Duration::from_secs(2)),
            Err(RecvTimeoutError::Disconnected)
        );
        let seq = client.enqueue(message(b"second")).unwrap();
        let second = events.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(second.seq, seq);
        assert!(matches!(second.status, DeliveryStatus::Failed(_)));

        client.close();
        assert!(events.iter().next().is_none());
    }
}
