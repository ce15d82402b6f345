//! View domain: windowing the aggregated series for display.

use serde::Serialize;

use crate::domain::series::{Bar, LinePoint, SeriesSnapshot};
use crate::shared::{ChartKind, TimeframeSelection};
use crate::ws::ConnectionState;

/// State of the most recent history fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStatus {
    /// The first fetch for the current selection is in flight.
    pub loading: bool,
    /// Last fetch failure, cleared by the next success.
    pub error: Option<String>,
}

impl HistoryStatus {
    pub fn loading() -> Self {
        Self {
            loading: true,
            error: None,
        }
    }

    pub fn ready() -> Self {
        Self::default()
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            loading: false,
            error: Some(reason.into()),
        }
    }
}

/// What the presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartView {
    pub line: Vec<LinePoint>,
    pub candles: Vec<Bar>,
    pub latest_value: Option<f64>,
    pub connection_status: ConnectionState,
    pub history: HistoryStatus,
}

impl ChartView {
    pub fn is_empty(&self) -> bool {
        self.line.is_empty() && self.candles.is_empty()
    }
}

/// Stateless query over a [`SeriesSnapshot`].
pub struct TimeframeView;

impl TimeframeView {
    /// Window the snapshot for `selection` at unix time `now`.
    ///
    /// Entries with `time >= now - window` are kept; the unbounded timeframe
    /// keeps everything. A snapshot held in the other orientation is inverted
    /// on the way out.
    pub fn query(
        snapshot: &SeriesSnapshot,
        selection: &TimeframeSelection,
        connection_status: ConnectionState,
        history: HistoryStatus,
        now: i64,
    ) -> ChartView {
        let flip = snapshot.orientation != selection.orientation;
        let cutoff = selection.timeframe.cutoff(now);
        let keep = |time: i64| cutoff.map_or(true, |c| time >= c);

        let line: Vec<LinePoint> = snapshot
            .line
            .iter()
            .filter(|p| keep(p.time))
            .map(|p| if flip { p.inverted() } else { *p })
            .collect();
        let candles: Vec<Bar> = snapshot
            .bars
            .iter()
            .filter(|b| keep(b.time))
            .map(|b| if flip { b.inverted() } else { *b })
            .collect();

        let latest_value = match snapshot.last_quote_price {
            Some(price) => Some(if flip { 1.0 / price } else { price }),
            None => match selection.chart_kind {
                ChartKind::Line => line.last().map(|p| p.value),
                ChartKind::Candle => candles.last().map(|b| b.close),
            },
        };

        ChartView {
            line,
            candles,
            latest_value,
            connection_status,
            history,
        }
    }
}
