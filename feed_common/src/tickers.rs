//! Ticker symbols shared between producer and sink.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

/// Set of simulated symbols. Each symbol is also the broker topic and the
/// message key of every tick published for it.
#[allow(missing_docs)]
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
    IntoStaticStr,
    Hash,
    Eq,
    PartialEq,
)]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Ticker {
    StkOne,
    StkTwo,
}

impl Ticker {
    /// Topic name (and routing key) used on the broker.
    pub fn topic(&self) -> &'static str {
        self.into()
    }
}
