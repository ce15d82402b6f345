//! Series domain: OHLC bars, line points, and the aggregator that owns them.

pub mod state;

use crate::shared::Orientation;
use serde::{Deserialize, Serialize};

pub use state::{fold, AggregatorConfig, FoldOutcome, Series, SeriesAggregator, SeriesSnapshot};

/// One OHLC aggregation over a time bucket.
///
/// Invariant: `low <= open, close <= high`, all prices finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bucket start, unix seconds.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    /// Build a bar from raw prices. Returns `None` unless every price is finite
    /// and strictly positive. `high`/`low` are widened to cover `open`/`close`.
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Option<Self> {
        if ![open, high, low, close]
            .iter()
            .all(|p| p.is_finite() && *p > 0.0)
        {
            return None;
        }
        Some(Self {
            time,
            open,
            high: high.max(open).max(close).max(low),
            low: low.min(open).min(close).min(high),
            close,
        })
    }

    /// A bar opened by a single price.
    pub fn flat(time: i64, price: f64) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    /// Reciprocal bar. `high` and `low` trade places since inversion reverses order.
    pub fn inverted(&self) -> Self {
        Self {
            time: self.time,
            open: 1.0 / self.open,
            high: 1.0 / self.low,
            low: 1.0 / self.high,
            close: 1.0 / self.close,
        }
    }

    pub fn oriented(self, orientation: Orientation) -> Self {
        match orientation {
            Orientation::Direct => self,
            Orientation::Inverted => self.inverted(),
        }
    }

    /// Fold a price into this bar as its newest tick.
    pub fn absorb(&mut self, price: f64) {
        self.close = price;
        self.high = self.high.max(price);
        self.low = self.low.min(price);
    }

    pub fn is_consistent(&self) -> bool {
        self.low <= self.high
            && self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
    }

    pub fn line_point(&self) -> LinePoint {
        LinePoint {
            time: self.time,
            value: self.close,
        }
    }
}

/// A single point on the line series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    /// Unix seconds.
    pub time: i64,
    pub value: f64,
}

impl LinePoint {
    pub fn inverted(&self) -> Self {
        Self {
            time: self.time,
            value: 1.0 / self.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_new_rejects_non_positive() {
        assert!(Bar::new(1, 1.0, 1.1, 0.9, 1.05).is_some());
        assert!(Bar::new(1, 0.0, 1.1, 0.9, 1.05).is_none());
        assert!(Bar::new(1, 1.0, f64::NAN, 0.9, 1.05).is_none());
        assert!(Bar::new(1, 1.0, 1.1, -0.9, 1.05).is_none());
    }

    #[test]
    fn test_new_widens_range() {
        let bar = Bar::new(1, 1.2, 1.1, 0.9, 0.8).unwrap();
        assert_eq!(bar.high, 1.2);
        assert_eq!(bar.low, 0.8);
        assert!(bar.is_consistent());
    }

    #[test]
    fn test_inversion_swaps_high_low() {
        let bar = Bar::new(1000, 1.0, 1.25, 0.8, 1.0).unwrap();
        let inv = bar.inverted();
        assert!(close(inv.high, 1.25));
        assert!(close(inv.low, 0.8));
        assert!(inv.is_consistent());
    }

    #[test]
    fn test_double_inversion_is_identity() {
        let bar = Bar::new(1000, 1.0832, 1.0851, 1.0799, 1.0840).unwrap();
        let back = bar.inverted().inverted();
        assert_eq!(back.time, bar.time);
        assert!(close(back.open, bar.open));
        assert!(close(back.high, bar.high));
        assert!(close(back.low, bar.low));
        assert!(close(back.close, bar.close));
        assert!(back.is_consistent());
    }

    #[test]
    fn test_absorb_extends_range() {
        let mut bar = Bar::flat(60, 1.0);
        bar.absorb(1.2);
        bar.absorb(0.9);
        assert_eq!(bar.open, 1.0);
        assert_eq!(bar.high, 1.2);
        assert_eq!(bar.low, 0.9);
        assert_eq!(bar.close, 0.9);
        assert!(bar.is_consistent());
    }
}
