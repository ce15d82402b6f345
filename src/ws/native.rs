//! Native quote connection: `tokio-tungstenite`.
//!
//! - Background tokio task owning the socket and the [`ConnectionMachine`]
//! - Fixed-delay reconnection after every close, cancelled by `stop()`
//! - Pair switching via unsubscribe/subscribe on the open transport
//! - Stream-based event delivery to a single consumer

use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use pin_project_lite::pin_project;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::WsError;
use crate::shared::Pair;
use crate::ws::machine::{AfterClose, ConnectionMachine, FrameOutcome};
use crate::ws::{ConnectionState, MessageOut, WsConfig, WsEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Resubscribe(Pair),
    Stop,
}

/// What the task does after handling a command while no transport is open.
enum Idle {
    Continue,
    Exit,
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: WsConfig,
    machine: ConnectionMachine,
    event_tx: mpsc::Sender<WsEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    state: Arc<AtomicU8>,
}

impl TaskState {
    /// Never blocks the socket loop. A dropped `State` event is still
    /// visible through [`QuoteConnection::state`].
    fn emit(&self, event: WsEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            tracing::debug!("Event channel full, dropping event: {}", e);
        }
    }

    /// Mirror the machine's state into the shared atomic, emitting on change.
    fn publish_state(&self) {
        let next = self.machine.state();
        let prev = ConnectionState::from(self.state.swap(next as u8, Ordering::SeqCst));
        if prev != next {
            tracing::debug!(from = %prev, to = %next, "Quote connection state");
            self.emit(WsEvent::State(next));
        }
    }

    fn handle_idle_command(&mut self, cmd: Option<Command>) -> Idle {
        match cmd {
            Some(Command::Resubscribe(pair)) => {
                // No transport: the next open subscribes to the new pair.
                let _ = self.machine.resubscribe(pair);
                Idle::Continue
            }
            Some(Command::Stop) | None => {
                self.machine.on_stop();
                self.publish_state();
                Idle::Exit
            }
        }
    }
}

// ─── Event stream ────────────────────────────────────────────────────────────

pin_project! {
    /// Events from a [`QuoteConnection`]. Ends when the connection is dropped.
    pub struct QuoteEvents {
        #[pin]
        rx: mpsc::Receiver<WsEvent>,
    }
}

impl Stream for QuoteEvents {
    type Item = WsEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<WsEvent>> {
        self.project().rx.get_mut().poll_recv(cx)
    }
}

// ─── Public QuoteConnection ──────────────────────────────────────────────────

/// Live ticker subscription with automatic reconnection.
///
/// `start` spawns a background task that connects, subscribes to the ticker
/// channel for the configured pair and turns frames into [`WsEvent`]s. After
/// any close it waits `reconnect_delay_ms` and tries again, until `stop`.
pub struct QuoteConnection {
    config: WsConfig,
    cmd_tx: Option<mpsc::Sender<Command>>,
    event_tx: mpsc::Sender<WsEvent>,
    event_rx: Option<mpsc::Receiver<WsEvent>>,
    task_handle: Option<JoinHandle<()>>,
    state: Arc<AtomicU8>,
}

impl QuoteConnection {
    /// Create a connection. Does not connect yet.
    pub fn new(config: WsConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        Self {
            config,
            cmd_tx: None,
            event_tx,
            event_rx: Some(event_rx),
            task_handle: None,
            state: Arc::new(AtomicU8::new(ConnectionState::Idle as u8)),
        }
    }

    /// Open the transport and subscribe. No-op while already running.
    pub fn start(&mut self) {
        if let Some(handle) = &self.task_handle {
            if !handle.is_finished() {
                return;
            }
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        self.cmd_tx = Some(cmd_tx);

        let task = TaskState {
            machine: ConnectionMachine::new(
                self.config.pair.clone(),
                Duration::from_millis(self.config.reconnect_delay_ms),
            ),
            config: self.config.clone(),
            event_tx: self.event_tx.clone(),
            cmd_rx,
            state: Arc::clone(&self.state),
        };

        tracing::info!(url = %self.config.url, pair = %self.config.pair, "Starting quote connection");
        self.task_handle = Some(tokio::spawn(run_task(task)));
    }

    /// Close the transport and cancel any pending reconnect. Idempotent.
    ///
    /// Once this returns no further events are produced by the stopped task.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(Command::Stop).await;
        }

        if let Some(mut handle) = self.task_handle.take() {
            if tokio::time::timeout(Duration::from_secs(5), &mut handle)
                .await
                .is_err()
            {
                tracing::warn!("Quote connection task did not stop in time, aborting");
                handle.abort();
            }
        }

        self.state.store(ConnectionState::Idle as u8, Ordering::SeqCst);
    }

    /// Switch to another pair without reconnecting.
    pub fn resubscribe(&mut self, pair: Pair) -> Result<(), WsError> {
        self.config.pair = pair.clone();
        match &self.cmd_tx {
            Some(tx) => tx.try_send(Command::Resubscribe(pair)).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    WsError::SendFailed("Command channel full".into())
                }
                mpsc::error::TrySendError::Closed(_) => WsError::NotConnected,
            }),
            // Not running: `start` picks up the new pair.
            None => Ok(()),
        }
    }

    pub fn pair(&self) -> &Pair {
        &self.config.pair
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    /// Take the event stream. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<QuoteEvents> {
        self.event_rx.take().map(|rx| QuoteEvents { rx })
    }
}

impl Drop for QuoteConnection {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut task: TaskState) {
    loop {
        if !task.machine.begin_attempt() {
            return;
        }
        task.publish_state();

        // ── 1. Connect, still listening for stop ─────────────────────────
        let url = task.config.url.clone();
        let timeout = Duration::from_millis(task.config.connect_timeout_ms);
        let connect = attempt_connect(&url, timeout);
        tokio::pin!(connect);

        let connected = loop {
            tokio::select! {
                res = &mut connect => break res,
                cmd = task.cmd_rx.recv() => {
                    if let Idle::Exit = task.handle_idle_command(cmd) {
                        // Dropping the pending handshake closes it.
                        return;
                    }
                }
            }
        };

        // ── 2. Run until the transport goes away ─────────────────────────
        let after = match connected {
            Ok((sink, stream)) => run_connected(&mut task, sink, stream).await,
            Err(e) => {
                tracing::warn!("Quote connection failed: {}", e);
                task.emit(WsEvent::Error(e));
                task.machine.on_transport_error()
            }
        };
        task.publish_state();

        // ── 3. Fixed-delay reconnect, cancellable ────────────────────────
        let delay = match after {
            AfterClose::Stop => return,
            AfterClose::Reconnect(_) if !task.config.reconnect => {
                tracing::info!("Reconnect disabled, quote connection task exiting");
                return;
            }
            AfterClose::Reconnect(delay) => delay,
        };

        tracing::info!("Reconnecting quote feed in {}ms", delay.as_millis());
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => break,
                cmd = task.cmd_rx.recv() => {
                    if let Idle::Exit = task.handle_idle_command(cmd) {
                        return;
                    }
                }
            }
        }
    }
}

async fn run_connected(task: &mut TaskState, mut sink: WsSink, mut stream: SplitStream<WsStream>) -> AfterClose {
    let subscribe = task.machine.on_open();
    task.publish_state();

    if let Err(e) = send_msg(&mut sink, &subscribe).await {
        tracing::warn!("Failed to subscribe: {}", e);
        task.emit(WsEvent::Error(e));
        return task.machine.on_transport_error();
    }

    loop {
        tokio::select! {
            // ── a) Incoming WS message ───────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text_str: &str = text.as_ref();
                        match task.machine.on_frame(text_str, Utc::now()) {
                            FrameOutcome::Quote(quote) => {
                                task.publish_state();
                                let pair = task.machine.pair().clone();
                                task.emit(WsEvent::Quote { pair, quote });
                            }
                            FrameOutcome::Subscribed(id) => {
                                tracing::info!(channel_id = id, pair = %task.machine.pair(), "Ticker subscribed");
                            }
                            FrameOutcome::Failed(reason) => {
                                tracing::warn!("Quote feed error frame: {}", reason);
                                task.publish_state();
                                task.emit(WsEvent::Error(WsError::Subscription(reason)));
                            }
                            FrameOutcome::Ignored => {}
                            FrameOutcome::Dropped(e) => {
                                tracing::trace!("Dropping frame: {} ({})", e, text_str);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        tracing::info!(code, "Quote connection closed: {}", reason);
                        task.emit(WsEvent::Error(WsError::Closed {
                            code: Some(code),
                            reason,
                        }));
                        return task.machine.on_close();
                    }
                    Some(Ok(_)) => {} // Binary, Pong, Frame
                    Some(Err(e)) => {
                        tracing::warn!("Quote connection error: {}", e);
                        task.emit(WsEvent::Error(WsError::ProtocolError(e.to_string())));
                        return task.machine.on_transport_error();
                    }
                    None => {
                        tracing::info!("Quote stream ended");
                        task.emit(WsEvent::Error(WsError::Closed {
                            code: None,
                            reason: "Stream ended".into(),
                        }));
                        return task.machine.on_close();
                    }
                }
            }

            // ── b) Command from public API ───────────────────────────────
            cmd = task.cmd_rx.recv() => {
                match cmd {
                    Some(Command::Resubscribe(pair)) => {
                        tracing::info!(pair = %pair, "Switching ticker subscription");
                        for msg in task.machine.resubscribe(pair) {
                            if let Err(e) = send_msg(&mut sink, &msg).await {
                                tracing::warn!("Send failed: {}", e);
                            }
                        }
                    }
                    Some(Command::Stop) | None => {
                        // Stop reading before closing so no late frame is handled.
                        task.machine.on_stop();
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client stop".into(),
                        }))).await;
                        task.publish_state();
                        return AfterClose::Stop;
                    }
                }
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn attempt_connect(url: &str, timeout: Duration) -> Result<(WsSink, SplitStream<WsStream>), WsError> {
    let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| WsError::ConnectionFailed("Connection timeout".into()))?
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

    Ok(ws_stream.split())
}

async fn send_msg(sink: &mut WsSink, msg: &MessageOut) -> Result<(), WsError> {
    let json = serde_json::to_string(msg).map_err(|e| WsError::ProtocolError(e.to_string()))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| WsError::SendFailed(e.to_string()))
}

fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
