//! History domain: OHLC windows fetched over REST for a timeframe.

#[cfg(feature = "http")]
pub mod client;
pub mod convert;
pub mod wire;

use crate::shared::{Interval, Pair, Timeframe};

pub use convert::{normalize_row, normalize_rows};

/// A planned history request: which granularity, since when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub pair: Pair,
    pub timeframe: Timeframe,
    pub interval: Interval,
    /// Unix-seconds lower bound. `None` asks for everything the venue keeps.
    pub since: Option<i64>,
}

impl HistoryRequest {
    pub fn plan(pair: &Pair, timeframe: Timeframe, now: i64) -> Self {
        Self {
            pair: pair.clone(),
            timeframe,
            interval: timeframe.interval(),
            since: timeframe.cutoff(now),
        }
    }
}
