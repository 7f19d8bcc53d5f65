//! Shared networking constants and helpers used by producer and sink.

/// Default TCP port of the broker link.
pub const BROKER_PORT: u16 = 9092;

/// Helper to format an address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}
