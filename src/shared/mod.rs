//! Shared newtypes and utilities used across all domain modules.
//!
//! These types are serialization-transparent: they serialize/deserialize identically
//! to the raw format the venue sends, so they can be used directly in wire types
//! without conversion overhead.

pub mod fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

// ─── Pair ────────────────────────────────────────────────────────────────────

/// Newtype for a venue instrument in its WebSocket form (e.g. `"USDC/EUR"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair(String);

impl Pair {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// REST form of the instrument: separator removed (`"USDC/EUR"` → `"USDCEUR"`).
    pub fn rest_name(&self) -> String {
        self.0.chars().filter(|c| *c != '/').collect()
    }
}

impl Default for Pair {
    fn default() -> Self {
        Self(crate::network::DEFAULT_PAIR.to_string())
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Pair {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Pair {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Serialize for Pair {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Pair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Pair(s))
    }
}

// ─── Orientation ─────────────────────────────────────────────────────────────

/// Whether displayed prices follow the feed or its reciprocal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Direct,
    Inverted,
}

impl Orientation {
    pub fn is_inverted(&self) -> bool {
        matches!(self, Self::Inverted)
    }

    /// Map a raw feed price into this orientation.
    pub fn apply(&self, price: f64) -> f64 {
        match self {
            Self::Direct => price,
            Self::Inverted => 1.0 / price,
        }
    }
}

// ─── PriceField ──────────────────────────────────────────────────────────────

/// Which side of a quote feeds the chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Last,
    #[default]
    Mid,
    Bid,
    Ask,
}

// ─── ChartKind ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Line,
    Candle,
}

// ─── Interval ────────────────────────────────────────────────────────────────

/// OHLC sampling granularity accepted by the history endpoint (minutes on the wire).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute1 => "1m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Minute30 => "30m",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
            Self::Week1 => "1w",
        }
    }

    /// Value of the `interval` query parameter.
    pub fn minutes(&self) -> u32 {
        match self {
            Self::Minute1 => 1,
            Self::Minute5 => 5,
            Self::Minute15 => 15,
            Self::Minute30 => 30,
            Self::Hour1 => 60,
            Self::Hour4 => 240,
            Self::Day1 => 1440,
            Self::Week1 => 10080,
        }
    }

    /// Duration of one bar in seconds.
    pub fn seconds(&self) -> i64 {
        self.minutes() as i64 * 60
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── Timeframe ───────────────────────────────────────────────────────────────

const DAY: i64 = 86_400;

/// Named lookback window used to fetch and filter the series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1H")]
    Hour1,
    #[default]
    #[serde(rename = "1D")]
    Day1,
    #[serde(rename = "1W")]
    Week1,
    #[serde(rename = "1M")]
    Month1,
    #[serde(rename = "3M")]
    Month3,
    #[serde(rename = "6M")]
    Month6,
    #[serde(rename = "1Y")]
    Year1,
    #[serde(rename = "ALL")]
    All,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Self::Hour1,
        Self::Day1,
        Self::Week1,
        Self::Month1,
        Self::Month3,
        Self::Month6,
        Self::Year1,
        Self::All,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour1 => "1H",
            Self::Day1 => "1D",
            Self::Week1 => "1W",
            Self::Month1 => "1M",
            Self::Month3 => "3M",
            Self::Month6 => "6M",
            Self::Year1 => "1Y",
            Self::All => "ALL",
        }
    }

    /// Lookback in seconds. `None` for the unbounded timeframe.
    pub fn window_seconds(&self) -> Option<i64> {
        match self {
            Self::Hour1 => Some(3_600),
            Self::Day1 => Some(DAY),
            Self::Week1 => Some(7 * DAY),
            Self::Month1 => Some(30 * DAY),
            Self::Month3 => Some(90 * DAY),
            Self::Month6 => Some(182 * DAY),
            Self::Year1 => Some(365 * DAY),
            Self::All => None,
        }
    }

    /// Sampling granularity for history: fine for short windows, daily for long ones.
    pub fn interval(&self) -> Interval {
        match self {
            Self::Hour1 => Interval::Minute1,
            Self::Day1 => Interval::Minute5,
            Self::Week1 => Interval::Minute15,
            Self::Month1 => Interval::Hour1,
            Self::Month3 => Interval::Hour4,
            Self::Month6 | Self::Year1 | Self::All => Interval::Day1,
        }
    }

    /// Oldest unix second still inside the window at `now`.
    pub fn cutoff(&self, now: i64) -> Option<i64> {
        self.window_seconds().map(|w| now - w)
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown timeframe: {}", s))
    }
}

// ─── TimeframeSelection ──────────────────────────────────────────────────────

/// Caller-owned display configuration, passed on every query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeframeSelection {
    pub orientation: Orientation,
    pub timeframe: Timeframe,
    pub chart_kind: ChartKind,
}

impl TimeframeSelection {
    pub fn new(orientation: Orientation, timeframe: Timeframe, chart_kind: ChartKind) -> Self {
        Self {
            orientation,
            timeframe,
            chart_kind,
        }
    }
}
