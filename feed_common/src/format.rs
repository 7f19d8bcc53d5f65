//! Wire encodings of a `StockUpdate`.
//!
//! The output format is picked once per run and every tick goes through the
//! same [`OutputFormat::encode`] call:
//!
//! - `Binary` — 12 bytes, big-endian, fixed width: `timestamp` as `i64`
//!   nanoseconds followed by `price` as `i32` cents. Cents are computed with
//!   `f64::round`, i.e. to the nearest integer with halves rounded away from
//!   zero. Sub-cent precision is discarded. Prices whose cent value does not fit
//!   in an `i32` (about ±21.47M) are rejected instead of wrapped.
//! - `Text` — a JSON object with the fields `ticker`, `timestamp` and `price`
//!   (full `f64` precision). Field order follows `StockUpdate` and is not part
//!   of the contract.
use bincode::config::{self, BigEndian, Configuration, Fixint};
use bincode::{Decode, Encode};
use clap::ValueEnum;
use strum_macros::{Display, EnumString};

use crate::error::FeedError;
use crate::result::Result;
use crate::tickers::Ticker;
use crate::update::StockUpdate;

/// Scale between currency units and the integer cents of the binary format.
pub const CENTS_PER_UNIT: f64 = 100.0;

/// Size in bytes of a binary payload.
pub const BINARY_PAYLOAD_LEN: usize = 12;

const BINARY_CONFIG: Configuration<BigEndian, Fixint> =
    config::standard().with_big_endian().with_fixed_int_encoding();

/// Binary payload layout.
#[derive(Debug, Encode, Decode)]
struct BinaryTick {
    timestamp: i64,
    price: i32,
}

/// Output format of the feed, selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Display, EnumString, Encode, Decode)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    /// Compact fixed-width binary with integer cents.
    #[value(alias = "protobuf")]
    Binary,
    /// JSON record with full precision price.
    #[value(alias = "json")]
    Text,
}

impl OutputFormat {
    /// Encode a tick into its payload bytes.
    pub fn encode(&self, update: &StockUpdate) -> Result<Vec<u8>> {
        match self {
            OutputFormat::Binary => encode_binary(update),
            OutputFormat::Text => encode_text(update),
        }
    }

    /// Decode a payload published on `topic`.
    ///
    /// The binary format does not carry the symbol, so it is taken from the
    /// topic. A text payload naming a different symbol is rejected.
    pub fn decode(&self, topic: Ticker, payload: &[u8]) -> Result<StockUpdate> {
        match self {
            OutputFormat::Binary => decode_binary(topic, payload),
            OutputFormat::Text => {
                let update: StockUpdate = serde_json::from_slice(payload)?;
                if update.ticker != topic {
                    return Err(FeedError::Decoding(format!(
                        "payload ticker {} does not match topic {}",
                        update.ticker, topic
                    )));
                }
                Ok(update)
            }
        }
    }
}

/// Convert a price to integer cents, rounding to the nearest cent.
pub fn price_to_cents(price: f64) -> Result<i32> {
    let cents = (price * CENTS_PER_UNIT).round();
    if !cents.is_finite() || cents < i32::MIN as f64 || cents > i32::MAX as f64 {
        return Err(FeedError::Encoding {
            price,
            reason: format!("{} cents is outside the 32-bit range", cents),
        });
    }
    Ok(cents as i32)
}

fn encode_binary(update: &StockUpdate) -> Result<Vec<u8>> {
    let tick = BinaryTick {
        timestamp: update.timestamp,
        price: price_to_cents(update.price)?,
    };
    Ok(bincode::encode_to_vec(tick, BINARY_CONFIG)?)
}

fn encode_text(update: &StockUpdate) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(update)?)
}

fn decode_binary(topic: Ticker, payload: &[u8]) -> Result<StockUpdate> {
    if payload.len() != BINARY_PAYLOAD_LEN {
        return Err(FeedError::Decoding(format!(
            "binary payload must be {} bytes, got {}",
            BINARY_PAYLOAD_LEN,
            payload.len()
        )));
    }
    let (tick, _): (BinaryTick, usize) = bincode::decode_from_slice(payload, BINARY_CONFIG)?;
    Ok(StockUpdate::new(
        topic,
        tick.timestamp,
        tick.price as f64 / CENTS_PER_UNIT,
    ))
}
