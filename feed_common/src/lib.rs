//!
//! Common types shared by the feed producer and the development sink.
//!
//! This crate aggregates:
//! - `error` — unified error type `FeedError` used across the workspace.
//! - `result` — handy `Result<T, FeedError>` alias.
//! - `tickers` — the enumerated set of simulated symbols.
//! - `update` — the `StockUpdate` tick value.
//! - `format` — the binary and text wire encodings of a tick.
//! - `record` — records and acknowledgements exchanged over the broker link.
//! - `net` — networking constants and small helpers.
#![warn(missing_docs)]
pub mod error;
pub mod format;
pub mod net;
pub mod record;
pub mod result;
pub mod tickers;
pub mod update;

pub use error::FeedError;
pub use format::OutputFormat;
pub use result::Result;
pub use update::StockUpdate;
