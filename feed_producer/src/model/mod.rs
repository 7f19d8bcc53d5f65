//! Domain models of the producer.
//!
//! - `price_process` — mean-reverting random walk that yields one price per tick.

pub mod price_process;
