//! Chart feed: live quotes and periodic history merged into one view.
//!
//! A single background task owns the [`SeriesAggregator`] and is the only
//! writer to it. Quote events, history results, the refresh timer and caller
//! commands are serialized through one `select!` loop; each change publishes a
//! fresh [`ChartView`] on a `watch` channel.
//!
//! History fetches run on their own tasks and report back tagged with a
//! generation number. A selection or pair change bumps the generation, so a
//! slow response for a stale selection is discarded instead of overwriting
//! newer data. A periodic or manual refresh never supersedes a fetch that is
//! still running for the current generation: it is skipped, so a slow fetch
//! always gets to report its result.

use std::time::Duration;

use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::client::RateFeedClient;
use crate::domain::series::{AggregatorConfig, Bar, SeriesAggregator};
use crate::domain::view::{ChartView, HistoryStatus, TimeframeView};
use crate::error::{FeedError, WsError};
use crate::shared::{Pair, TimeframeSelection};
use crate::ws::native::{QuoteConnection, QuoteEvents};
use crate::ws::{ConnectionState, WsEvent};

/// Configuration for a [`ChartFeed`].
#[derive(Debug, Clone, Copy)]
pub struct FeedConfig {
    /// How often history is re-fetched for the current selection.
    pub refresh_interval: Duration,
    pub aggregator: AggregatorConfig,
    /// Selection in effect when the feed starts.
    pub selection: TimeframeSelection,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            aggregator: AggregatorConfig::default(),
            selection: TimeframeSelection::default(),
        }
    }
}

// ─── Commands from public API to the driver ──────────────────────────────────

#[derive(Debug)]
enum FeedCommand {
    Select(TimeframeSelection),
    SetPair(Pair),
    Refresh,
    Shutdown,
}

struct FetchDone {
    generation: u64,
    result: Result<Vec<Bar>, FeedError>,
}

// ─── Public ChartFeed ────────────────────────────────────────────────────────

/// Handle to a running chart feed.
///
/// Dropping the handle aborts the driver; call [`ChartFeed::shutdown`] for an
/// orderly stop that closes the quote connection first.
pub struct ChartFeed {
    cmd_tx: mpsc::Sender<FeedCommand>,
    view_rx: watch::Receiver<ChartView>,
    task_handle: Option<JoinHandle<()>>,
}

impl ChartFeed {
    pub(crate) fn spawn(client: RateFeedClient, config: FeedConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (view_tx, view_rx) = watch::channel(ChartView::default());

        let mut driver = Driver::new(client, config, view_tx);
        let handle = match driver.connection.take_events() {
            Some(events) => tokio::spawn(run_driver(driver, cmd_rx, events)),
            None => tokio::spawn(async {}),
        };

        Self {
            cmd_tx,
            view_rx,
            task_handle: Some(handle),
        }
    }

    /// The latest published view.
    pub fn view(&self) -> ChartView {
        self.view_rx.borrow().clone()
    }

    /// A receiver notified on every published view.
    pub fn subscribe(&self) -> watch::Receiver<ChartView> {
        self.view_rx.clone()
    }

    /// Published views as a stream, starting with the next change.
    ///
    /// Intermediate views are skipped when the consumer falls behind; the
    /// stream ends once the feed has shut down.
    pub fn views(&self) -> impl Stream<Item = ChartView> + Send + 'static {
        let mut rx = self.view_rx.clone();
        async_stream::stream! {
            while rx.changed().await.is_ok() {
                let view = rx.borrow_and_update().clone();
                yield view;
            }
        }
    }

    /// Change orientation, timeframe or chart kind.
    pub fn set_selection(&self, selection: TimeframeSelection) -> Result<(), FeedError> {
        self.send(FeedCommand::Select(selection))
    }

    /// Track another pair. Clears the series and resubscribes.
    pub fn set_pair(&self, pair: impl Into<Pair>) -> Result<(), FeedError> {
        self.send(FeedCommand::SetPair(pair.into()))
    }

    /// Fetch history now instead of waiting for the next refresh.
    pub fn refresh(&self) -> Result<(), FeedError> {
        self.send(FeedCommand::Refresh)
    }

    /// Stop the quote connection and the refresh timer. Idempotent.
    pub async fn shutdown(&mut self) {
        let Some(mut handle) = self.task_handle.take() else {
            return;
        };
        let _ = self.cmd_tx.send(FeedCommand::Shutdown).await;
        if tokio::time::timeout(Duration::from_secs(10), &mut handle)
            .await
            .is_err()
        {
            tracing::warn!("Chart feed did not shut down in time, aborting");
            handle.abort();
        }
    }

    fn send(&self, cmd: FeedCommand) -> Result<(), FeedError> {
        self.cmd_tx.try_send(cmd).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                FeedError::Other("Feed command channel full".into())
            }
            mpsc::error::TrySendError::Closed(_) => FeedError::Ws(WsError::NotConnected),
        })
    }
}

impl Drop for ChartFeed {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Driver ──────────────────────────────────────────────────────────────────

struct Driver {
    client: RateFeedClient,
    refresh_interval: Duration,
    pair: Pair,
    selection: TimeframeSelection,
    aggregator: SeriesAggregator,
    connection: QuoteConnection,
    connection_state: ConnectionState,
    history: HistoryStatus,
    generation: u64,
    fetch_task: Option<JoinHandle<()>>,
    fetch_tx: mpsc::Sender<FetchDone>,
    fetch_rx: Option<mpsc::Receiver<FetchDone>>,
    view_tx: watch::Sender<ChartView>,
}

impl Driver {
    fn new(client: RateFeedClient, config: FeedConfig, view_tx: watch::Sender<ChartView>) -> Self {
        let (fetch_tx, fetch_rx) = mpsc::channel(4);
        let mut aggregator = SeriesAggregator::new(config.aggregator);
        aggregator.reorient(config.selection.orientation);

        Self {
            pair: client.pair().clone(),
            connection: client.quote_connection(),
            client,
            refresh_interval: config.refresh_interval,
            selection: config.selection,
            aggregator,
            connection_state: ConnectionState::Idle,
            history: HistoryStatus::loading(),
            generation: 0,
            fetch_task: None,
            fetch_tx,
            fetch_rx: Some(fetch_rx),
            view_tx,
        }
    }

    // ── History ──────────────────────────────────────────────────────────

    /// A fetch for the current generation is running or its result is
    /// still queued.
    fn fetch_in_flight(&self) -> bool {
        match &self.fetch_task {
            Some(task) => !task.is_finished() || self.fetch_tx.capacity() < self.fetch_tx.max_capacity(),
            None => false,
        }
    }

    /// Periodic or manual refresh. Skipped while the current fetch runs.
    fn refresh_history(&mut self) {
        if self.fetch_in_flight() {
            tracing::debug!(generation = self.generation, "History fetch still running, skipping refresh");
            return;
        }
        self.request_history(false);
    }

    /// Issue a fetch for the current selection, superseding any in flight.
    ///
    /// `fresh` marks the first fetch for a selection, which shows as loading.
    fn request_history(&mut self, fresh: bool) {
        self.generation += 1;
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
        if fresh {
            self.history.loading = true;
        }

        let generation = self.generation;
        let client = self.client.clone();
        let pair = self.pair.clone();
        let timeframe = self.selection.timeframe;
        let orientation = self.selection.orientation;
        let tx = self.fetch_tx.clone();

        tracing::debug!(generation, pair = %pair, timeframe = %timeframe, "Requesting history");
        self.fetch_task = Some(tokio::spawn(async move {
            let result = client.history().fetch(&pair, timeframe, orientation).await;
            let _ = tx.send(FetchDone { generation, result }).await;
        }));
    }

    fn on_history(&mut self, done: FetchDone) {
        if done.generation != self.generation {
            tracing::debug!(
                stale = done.generation,
                current = self.generation,
                "Discarding stale history"
            );
            return;
        }
        self.fetch_task = None;

        match done.result {
            Ok(bars) => {
                self.aggregator.seed(bars, self.selection.orientation);
                self.history = HistoryStatus::ready();
            }
            Err(e) => {
                // The retained series stays on screen.
                tracing::warn!(pair = %self.pair, timeframe = %self.selection.timeframe, "History fetch failed: {}", e);
                self.history = HistoryStatus::failed(e.to_string());
            }
        }
        self.publish();
    }

    // ── Live quotes ──────────────────────────────────────────────────────

    fn on_ws_event(&mut self, event: WsEvent) {
        match event {
            WsEvent::Quote { pair, quote } => {
                // Queued before a pair switch.
                if pair != self.pair {
                    tracing::trace!(pair = %pair, "Dropping quote for previous pair");
                    return;
                }
                self.aggregator.fold_quote(&quote, self.selection.orientation);
            }
            WsEvent::State(state) => {
                self.connection_state = state;
            }
            WsEvent::Error(e) => {
                tracing::debug!("Quote connection reported: {}", e);
                return;
            }
        }
        self.publish();
    }

    /// Catch up with the connection's own state, in case a `State` event
    /// was dropped on a full channel.
    fn sync_connection_state(&mut self) {
        let state = self.connection.state();
        if state != self.connection_state {
            self.connection_state = state;
            self.publish();
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────

    fn on_selection(&mut self, selection: TimeframeSelection) {
        if selection == self.selection {
            return;
        }
        let previous = std::mem::replace(&mut self.selection, selection);

        if previous.orientation != selection.orientation {
            self.aggregator.reorient(selection.orientation);
        }
        if previous.orientation != selection.orientation || previous.timeframe != selection.timeframe {
            self.request_history(true);
        }
        self.publish();
    }

    fn on_pair(&mut self, pair: Pair) {
        if pair == self.pair {
            return;
        }
        tracing::info!(from = %self.pair, to = %pair, "Switching pair");
        if let Err(e) = self.connection.resubscribe(pair.clone()) {
            tracing::warn!("Resubscribe failed: {}", e);
        }
        self.pair = pair;
        self.aggregator.clear();
        self.request_history(true);
        self.publish();
    }

    async fn shutdown(&mut self) {
        self.generation += 1;
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
        self.connection.stop().await;
        self.connection_state = ConnectionState::Idle;
        self.history.loading = false;
        self.publish();
        tracing::info!(pair = %self.pair, "Chart feed stopped");
    }

    fn view(&self) -> ChartView {
        TimeframeView::query(
            &self.aggregator.snapshot(),
            &self.selection,
            self.connection_state,
            self.history.clone(),
            Utc::now().timestamp(),
        )
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }
}

async fn run_driver(mut driver: Driver, mut cmd_rx: mpsc::Receiver<FeedCommand>, mut events: QuoteEvents) {
    let Some(mut fetch_rx) = driver.fetch_rx.take() else {
        return;
    };

    tracing::info!(pair = %driver.pair, selection = ?driver.selection, "Starting chart feed");
    driver.connection.start();
    driver.request_history(true);
    driver.publish();

    let mut refresh = tokio::time::interval(driver.refresh_interval);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    refresh.reset(); // skip immediate first tick

    loop {
        tokio::select! {
            // ── a) Quote connection ──────────────────────────────────────
            Some(event) = events.next() => {
                driver.on_ws_event(event);
                driver.sync_connection_state();
            }

            // ── b) History result ────────────────────────────────────────
            Some(done) = fetch_rx.recv() => driver.on_history(done),

            // ── c) Periodic refresh ──────────────────────────────────────
            _ = refresh.tick() => driver.refresh_history(),

            // ── d) Command from public API ───────────────────────────────
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(FeedCommand::Select(selection)) => driver.on_selection(selection),
                    Some(FeedCommand::SetPair(pair)) => driver.on_pair(pair),
                    Some(FeedCommand::Refresh) => driver.refresh_history(),
                    Some(FeedCommand::Shutdown) | None => {
                        driver.shutdown().await;
                        return;
                    }
                }
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::quote::Quote;
    use crate::http::RetryPolicy;
    use crate::shared::{ChartKind, Orientation, Timeframe};
    use chrono::TimeZone;

    fn offline_client() -> RateFeedClient {
        RateFeedClient::builder()
            .api_url("http://127.0.0.1:1")
            .ws_url("ws://127.0.0.1:1")
            .retry(RetryPolicy::None)
            .build()
            .unwrap()
    }

    fn driver() -> (Driver, watch::Receiver<ChartView>) {
        let (view_tx, view_rx) = watch::channel(ChartView::default());
        let config = FeedConfig {
            selection: TimeframeSelection::new(Orientation::Direct, Timeframe::All, ChartKind::Line),
            ..FeedConfig::default()
        };
        (Driver::new(offline_client(), config, view_tx), view_rx)
    }

    fn quote_for(pair: &str, secs: i64, mid: f64) -> WsEvent {
        let at = Utc.timestamp_opt(secs, 0).unwrap();
        WsEvent::Quote {
            pair: Pair::from(pair),
            quote: Quote::new(mid, mid, mid, at).unwrap(),
        }
    }

    fn quote(secs: i64, mid: f64) -> WsEvent {
        quote_for("USDC/EUR", secs, mid)
    }

    fn bars() -> Vec<Bar> {
        vec![
            Bar::new(1_000, 1.0, 1.1, 0.9, 1.05).unwrap(),
            Bar::new(1_060, 1.05, 1.2, 1.0, 1.1).unwrap(),
        ]
    }

    #[test]
    fn test_default_config() {
        let config = FeedConfig::default();
        assert_eq!(config.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.aggregator.max_len, 800);
        assert_eq!(config.selection.timeframe, Timeframe::Day1);
    }

    #[tokio::test]
    async fn test_history_result_seeds_and_publishes() {
        let (mut d, view_rx) = driver();
        d.request_history(true);
        let generation = d.generation;
        d.on_history(FetchDone {
            generation,
            result: Ok(bars()),
        });

        let view = view_rx.borrow().clone();
        assert_eq!(view.candles.len(), 2);
        assert_eq!(view.latest_value, Some(1.1));
        assert!(!view.history.loading);
        assert_eq!(view.history.error, None);
    }

    #[tokio::test]
    async fn test_stale_history_discarded() {
        let (mut d, view_rx) = driver();
        d.request_history(true);
        let stale = d.generation;
        d.request_history(true);

        d.on_history(FetchDone {
            generation: stale,
            result: Ok(bars()),
        });
        assert!(d.aggregator.is_empty());
        assert!(view_rx.borrow().candles.is_empty());
    }

    #[tokio::test]
    async fn test_failed_history_keeps_series() {
        let (mut d, view_rx) = driver();
        d.request_history(true);
        let generation = d.generation;
        d.on_history(FetchDone {
            generation,
            result: Ok(bars()),
        });

        d.request_history(false);
        let generation = d.generation;
        d.on_history(FetchDone {
            generation,
            result: Err(FeedError::Other("boom".into())),
        });

        let view = view_rx.borrow().clone();
        assert_eq!(view.candles.len(), 2);
        assert_eq!(view.history.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_quotes_and_state_publish() {
        let (mut d, view_rx) = driver();
        d.on_ws_event(WsEvent::State(ConnectionState::Connected));
        d.on_ws_event(quote(2_000, 1.08));
        d.on_ws_event(WsEvent::State(ConnectionState::Live));

        let view = view_rx.borrow().clone();
        assert_eq!(view.connection_status, ConnectionState::Live);
        assert_eq!(view.latest_value, Some(1.08));
        assert_eq!(view.line.len(), 1);
    }

    #[tokio::test]
    async fn test_orientation_change_inverts_and_refetches() {
        let (mut d, view_rx) = driver();
        d.on_ws_event(quote(2_000, 2.0));
        let before = d.generation;

        d.on_selection(TimeframeSelection::new(Orientation::Inverted, Timeframe::All, ChartKind::Line));

        assert_eq!(d.generation, before + 1);
        assert!(d.history.loading);
        let view = view_rx.borrow().clone();
        assert_eq!(view.latest_value, Some(0.5));
        assert_eq!(view.line[0].value, 0.5);
    }

    #[tokio::test]
    async fn test_chart_kind_change_does_not_refetch() {
        let (mut d, _view_rx) = driver();
        let before = d.generation;
        d.on_selection(TimeframeSelection::new(Orientation::Direct, Timeframe::All, ChartKind::Candle));
        assert_eq!(d.generation, before);
        assert_eq!(d.selection.chart_kind, ChartKind::Candle);
    }

    #[tokio::test]
    async fn test_pair_change_clears_series() {
        let (mut d, view_rx) = driver();
        d.on_ws_event(quote(2_000, 1.08));
        d.on_pair(Pair::from("EURC/EUR"));

        assert_eq!(d.pair.as_str(), "EURC/EUR");
        assert_eq!(d.connection.pair().as_str(), "EURC/EUR");
        let view = view_rx.borrow().clone();
        assert!(view.is_empty());
        assert_eq!(view.latest_value, None);
    }

    #[tokio::test]
    async fn test_quote_for_previous_pair_dropped() {
        let (mut d, view_rx) = driver();
        d.on_pair(Pair::from("EURC/EUR"));

        d.on_ws_event(quote_for("USDC/EUR", 2_000, 1.08));
        assert!(d.aggregator.is_empty());

        d.on_ws_event(quote_for("EURC/EUR", 2_001, 0.9992));
        let view = view_rx.borrow().clone();
        assert_eq!(view.line.len(), 1);
        assert_eq!(view.latest_value, Some(0.9992));
    }

    #[tokio::test]
    async fn test_refresh_skipped_while_fetch_running() {
        let (mut d, _view_rx) = driver();
        d.fetch_task = Some(tokio::spawn(std::future::pending::<()>()));
        let before = d.generation;

        d.refresh_history();
        assert_eq!(d.generation, before);
        assert!(d.fetch_task.is_some());

        // A selection change still supersedes it.
        d.on_selection(TimeframeSelection::new(Orientation::Direct, Timeframe::Day1, ChartKind::Line));
        assert_eq!(d.generation, before + 1);
    }

    #[tokio::test]
    async fn test_refresh_runs_once_fetch_reported() {
        let (mut d, _view_rx) = driver();
        d.request_history(true);
        let generation = d.generation;
        d.on_history(FetchDone {
            generation,
            result: Ok(bars()),
        });
        assert!(!d.fetch_in_flight());

        d.refresh_history();
        assert_eq!(d.generation, generation + 1);
        assert!(!d.history.loading);
    }

    #[tokio::test]
    async fn test_connection_state_resynced_from_connection() {
        let (mut d, view_rx) = driver();
        d.on_ws_event(WsEvent::State(ConnectionState::Live));
        assert_eq!(view_rx.borrow().connection_status, ConnectionState::Live);

        // The connection itself was never started.
        d.sync_connection_state();
        assert_eq!(view_rx.borrow().connection_status, ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_feed_is_idempotent() {
        let mut feed = offline_client().chart_feed(FeedConfig::default());
        feed.shutdown().await;
        feed.shutdown().await;
        assert_eq!(feed.view().connection_status, ConnectionState::Idle);
        assert!(feed.set_selection(TimeframeSelection::default()).is_err());
    }
}
