use crate::link::{LinkPolicy, serve_link};
use feed_common::Result;
use log::{debug, error, info};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// TCP listener accepting producer links.
///
/// Each accepted connection is served on its own thread, so a misbehaving
/// producer only ends its own link.
pub struct LinkReceiver {
    /// The underlying TCP listening socket.
    pub(crate) socket: TcpListener,
}

impl LinkReceiver {
    /// Bind a new receiver to `bind_addr` (e.g., `0.0.0.0:9092`).
    pub fn new(bind_addr: &str) -> Result<Self> {
        let socket = TcpListener::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }

    /// Accept links until `shutdown` is set.
    pub(crate) fn accept_loop(self, policy: LinkPolicy, shutdown: Arc<AtomicBool>) -> Result<()> {
        info!("Broker sink listening on {}", self.socket.local_addr()?);

        while !shutdown.load(Ordering::Relaxed) {
            match self.socket.accept() {
                Ok((stream, peer)) => {
                    debug!("Producer connected from {}", peer);
                    thread::spawn(move || {
                        if let Err(e) = handle_connection(stream, peer.to_string(), policy) {
                            error!("Link {} failed: {}", peer, e);
                        }
                    });
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
        info!("Broker sink stopping...");
        Ok(())
    }
}

fn handle_connection(stream: TcpStream, peer: String, policy: LinkPolicy) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    let input = BufReader::new(stream.try_clone()?);
    let output = BufWriter::new(stream);
    let stats = serve_link(input, output, &peer, policy)?;
    info!(
        "Producer {} disconnected: {} received, {} accepted, {} rejected",
        peer, stats.received, stats.accepted, stats.rejected
    );
    Ok(())
}
