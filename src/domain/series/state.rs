//! Series state: the single owner of the merged bar/line series.
//!
//! History seeds the series; live quotes fold into the newest bucket or open
//! a new one. Both run through `&mut self`, so callers that share an
//! aggregator across tasks must serialize access (the feed driver owns one
//! exclusively and publishes snapshots).

use super::{Bar, LinePoint};
use crate::domain::quote::Quote;
use crate::shared::{Orientation, PriceField};
use std::collections::VecDeque;

/// Aggregator tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregatorConfig {
    /// Width of a live bucket in seconds.
    pub bucket_seconds: i64,
    /// Maximum retained bars and line points.
    pub max_len: usize,
    /// Which quote price feeds the chart.
    pub price_field: PriceField,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            bucket_seconds: 60,
            max_len: 800,
            price_field: PriceField::Mid,
        }
    }
}

/// What a fold did to the bar series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// The newest bar absorbed the price.
    Updated,
    /// A new bar was opened.
    Appended,
}

/// Ordered, bucket-deduplicated bars plus the parallel line, bounded from the front.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    bars: VecDeque<Bar>,
    line: VecDeque<LinePoint>,
    max_len: usize,
}

impl Series {
    pub fn new(max_len: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(max_len.min(1024)),
            line: VecDeque::with_capacity(max_len.min(1024)),
            max_len,
        }
    }

    /// Build from historical bars: sort by time, keep the last bar per
    /// timestamp, and keep only the newest `max_len`.
    pub fn from_bars(mut bars: Vec<Bar>, max_len: usize) -> Self {
        bars.sort_by_key(|b| b.time);

        let mut series = Self::new(max_len);
        for bar in bars {
            match series.bars.back_mut() {
                Some(last) if last.time == bar.time => *last = bar,
                _ => series.bars.push_back(bar),
            }
        }
        series.line = series.bars.iter().map(Bar::line_point).collect();
        series.trim();
        series
    }

    pub fn bars(&self) -> &VecDeque<Bar> {
        &self.bars
    }

    pub fn line(&self) -> &VecDeque<LinePoint> {
        &self.line
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    fn trim(&mut self) {
        while self.bars.len() > self.max_len {
            self.bars.pop_front();
        }
        while self.line.len() > self.max_len {
            self.line.pop_front();
        }
    }

    fn invert(&mut self) {
        for bar in self.bars.iter_mut() {
            *bar = bar.inverted();
        }
        for point in self.line.iter_mut() {
            *point = point.inverted();
        }
    }

    fn fold_in_place(&mut self, time: i64, price: f64, bucket_seconds: i64) -> FoldOutcome {
        let outcome = match self.bars.back_mut() {
            Some(last) if time < last.time + bucket_seconds => {
                last.absorb(price);
                FoldOutcome::Updated
            }
            _ => {
                self.bars.push_back(Bar::flat(time, price));
                FoldOutcome::Appended
            }
        };

        // One line point per tick; a tick at or before the newest point's
        // time replaces its value so line times stay strictly increasing.
        match self.line.back_mut() {
            Some(point) if time <= point.time => point.value = price,
            _ => self.line.push_back(LinePoint { time, value: price }),
        }

        self.trim();
        outcome
    }
}

/// Fold one display-oriented price observed at `time` into `series`.
///
/// If the newest bar's bucket still covers `time`, it absorbs the price
/// (`close = price`, `high`/`low` extended). Otherwise a flat bar opens at
/// `time`. The line gains one point per call.
pub fn fold(mut series: Series, time: i64, price: f64, bucket_seconds: i64) -> Series {
    series.fold_in_place(time, price, bucket_seconds);
    series
}

/// Point-in-time copy of the aggregator, safe to hand to readers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesSnapshot {
    pub bars: Vec<Bar>,
    pub line: Vec<LinePoint>,
    /// Display price of the most recent live quote.
    pub last_quote_price: Option<f64>,
    pub orientation: Orientation,
}

/// Owner of the merged series.
#[derive(Debug, Clone)]
pub struct SeriesAggregator {
    config: AggregatorConfig,
    series: Series,
    orientation: Orientation,
    last_quote_price: Option<f64>,
}

impl Default for SeriesAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

impl SeriesAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            series: Series::new(config.max_len),
            orientation: Orientation::Direct,
            last_quote_price: None,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Replace the series with freshly fetched bars already in `orientation`.
    pub fn seed(&mut self, bars: Vec<Bar>, orientation: Orientation) {
        if orientation != self.orientation {
            self.last_quote_price = self.last_quote_price.map(|p| 1.0 / p);
            self.orientation = orientation;
        }
        self.series = Series::from_bars(bars, self.config.max_len);
        tracing::debug!(bars = self.series.len(), "Seeded series");
    }

    /// Fold a live quote, converting it to `orientation` first.
    pub fn fold_quote(&mut self, quote: &Quote, orientation: Orientation) -> FoldOutcome {
        self.reorient(orientation);
        let price = quote.display_price(self.config.price_field, orientation);
        self.last_quote_price = Some(price);
        self.series
            .fold_in_place(quote.timestamp(), price, self.config.bucket_seconds)
    }

    /// Flip the retained series into `orientation` in place.
    pub fn reorient(&mut self, orientation: Orientation) {
        if orientation == self.orientation {
            return;
        }
        self.series.invert();
        self.last_quote_price = self.last_quote_price.map(|p| 1.0 / p);
        self.orientation = orientation;
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn last_quote_price(&self) -> Option<f64> {
        self.last_quote_price
    }

    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            bars: self.series.bars.iter().copied().collect(),
            line: self.series.line.iter().copied().collect(),
            last_quote_price: self.last_quote_price,
            orientation: self.orientation,
        }
    }

    /// Drop everything, e.g. when the tracked instrument changes.
    pub fn clear(&mut self) {
        self.series = Series::new(self.config.max_len);
        self.last_quote_price = None;
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
