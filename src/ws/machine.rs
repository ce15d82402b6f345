//! Transport-free connection state machine.
//!
//! Every transport event maps to one method. The driver in `native` owns the
//! socket and the timers; this type owns the state, the subscription and the
//! decisions, so the protocol is testable without a network.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{ConnectionState, MessageOut};
use crate::domain::quote::wire::InboundFrame;
use crate::domain::quote::Quote;
use crate::error::QuoteError;
use crate::shared::Pair;

/// What an inbound text frame amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// A validated quote for the subscribed pair.
    Quote(Quote),
    /// Subscription acknowledged with this channel id.
    Subscribed(i64),
    /// An error frame. The transport stays open.
    Failed(String),
    /// Heartbeats, system status and other control traffic.
    Ignored,
    /// Not a usable quote.
    Dropped(QuoteError),
}

/// Decision taken when the transport goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterClose {
    Reconnect(Duration),
    Stop,
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    pair: Pair,
    state: ConnectionState,
    /// At least one quote parsed since the current attempt began.
    has_data: bool,
    channel_id: Option<i64>,
    stopped: bool,
    reconnect_delay: Duration,
}

impl ConnectionMachine {
    pub fn new(pair: Pair, reconnect_delay: Duration) -> Self {
        Self {
            pair,
            state: ConnectionState::Idle,
            has_data: false,
            channel_id: None,
            stopped: false,
            reconnect_delay,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn has_data(&self) -> bool {
        self.has_data
    }

    pub fn channel_id(&self) -> Option<i64> {
        self.channel_id
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Begin a connection attempt. Returns `false` when one is already under
    /// way or the machine was stopped.
    pub fn begin_attempt(&mut self) -> bool {
        if self.stopped || self.state.is_active() {
            return false;
        }
        self.state = ConnectionState::Connecting;
        self.has_data = false;
        self.channel_id = None;
        true
    }

    /// Transport opened. Returns the subscribe frame to send.
    pub fn on_open(&mut self) -> MessageOut {
        self.state = ConnectionState::Connected;
        MessageOut::subscribe_ticker(&self.pair)
    }

    pub fn on_frame(&mut self, text: &str, observed_at: DateTime<Utc>) -> FrameOutcome {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => return FrameOutcome::Dropped(e),
        };

        match frame {
            InboundFrame::Ticker(ticker) => {
                match ticker.to_quote(&self.pair, self.channel_id, observed_at) {
                    Ok(quote) => {
                        self.has_data = true;
                        self.state = ConnectionState::Live;
                        FrameOutcome::Quote(quote)
                    }
                    Err(e) => FrameOutcome::Dropped(e),
                }
            }
            InboundFrame::Control(control) => {
                if let Some(reason) = control.error_indicator() {
                    self.state = ConnectionState::Error;
                    return FrameOutcome::Failed(reason);
                }
                if let Some(id) = control.subscribed_channel() {
                    self.channel_id = Some(id);
                    return FrameOutcome::Subscribed(id);
                }
                FrameOutcome::Ignored
            }
        }
    }

    /// Transport closed, or never opened.
    pub fn on_close(&mut self) -> AfterClose {
        if self.stopped {
            self.state = ConnectionState::Idle;
            return AfterClose::Stop;
        }
        self.state = if self.has_data {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Error
        };
        self.channel_id = None;
        AfterClose::Reconnect(self.reconnect_delay)
    }

    /// Transport errors are followed by a close; both resolve the same way.
    pub fn on_transport_error(&mut self) -> AfterClose {
        self.on_close()
    }

    pub fn on_stop(&mut self) {
        self.stopped = true;
        self.has_data = false;
        self.channel_id = None;
        self.state = ConnectionState::Idle;
    }

    /// Switch instrument. Returns the frames to send when the transport is
    /// open; otherwise the next `on_open` subscribes to the new pair.
    pub fn resubscribe(&mut self, pair: Pair) -> Vec<MessageOut> {
        if pair == self.pair {
            return Vec::new();
        }
        let previous = std::mem::replace(&mut self.pair, pair);
        self.channel_id = None;

        match self.state {
            ConnectionState::Connected | ConnectionState::Live | ConnectionState::Error => vec![
                MessageOut::unsubscribe_ticker(&previous),
                MessageOut::subscribe_ticker(&self.pair),
            ],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKER: &str = r#"[42,{"a":["1.0810","1","1.000"],"b":["1.0800","2","2.000"],"c":["1.0805","0.5"]},"ticker","USDC/EUR"]"#;

    fn machine() -> ConnectionMachine {
        ConnectionMachine::new(Pair::from("USDC/EUR"), Duration::from_millis(3000))
    }

    fn opened() -> ConnectionMachine {
        let mut m = machine();
        assert!(m.begin_attempt());
        m.on_open();
        m
    }

    #[test]
    fn test_open_subscribes_and_connects() {
        let mut m = machine();
        assert!(m.begin_attempt());
        assert_eq!(m.state(), ConnectionState::Connecting);

        let sub = m.on_open();
        assert_eq!(sub, MessageOut::subscribe_ticker(&Pair::from("USDC/EUR")));
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_begin_attempt_is_noop_while_active() {
        let mut m = machine();
        assert!(m.begin_attempt());
        assert!(!m.begin_attempt());
        m.on_open();
        assert!(!m.begin_attempt());
    }

    #[test]
    fn test_first_quote_goes_live() {
        let mut m = opened();
        match m.on_frame(TICKER, Utc::now()) {
            FrameOutcome::Quote(q) => {
                assert_eq!(q.bid(), 1.08);
                assert_eq!(q.ask(), 1.081);
                assert_eq!(q.last(), 1.0805);
            }
            other => panic!("expected quote, got {other:?}"),
        }
        assert_eq!(m.state(), ConnectionState::Live);
        assert!(m.has_data());
    }

    #[test]
    fn test_heartbeat_and_status_ignored() {
        let mut m = opened();
        assert_eq!(m.on_frame(r#"{"event":"heartbeat"}"#, Utc::now()), FrameOutcome::Ignored);
        assert_eq!(
            m.on_frame(r#"{"event":"systemStatus","status":"online"}"#, Utc::now()),
            FrameOutcome::Ignored
        );
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_subscription_ack_records_channel() {
        let mut m = opened();
        let ack = r#"{"event":"subscriptionStatus","status":"subscribed","channelID":42,"pair":"USDC/EUR","subscription":{"name":"ticker"}}"#;
        assert_eq!(m.on_frame(ack, Utc::now()), FrameOutcome::Subscribed(42));
        assert_eq!(m.channel_id(), Some(42));

        let foreign = TICKER.replacen("42", "7", 1);
        assert!(matches!(
            m.on_frame(&foreign, Utc::now()),
            FrameOutcome::Dropped(QuoteError::ChannelMismatch { .. })
        ));
        assert!(matches!(m.on_frame(TICKER, Utc::now()), FrameOutcome::Quote(_)));
    }

    #[test]
    fn test_subscription_error_sets_error_state() {
        let mut m = opened();
        let err = r#"{"event":"subscriptionStatus","status":"error","errorMessage":"Currency pair not supported"}"#;
        assert_eq!(
            m.on_frame(err, Utc::now()),
            FrameOutcome::Failed("Currency pair not supported".into())
        );
        assert_eq!(m.state(), ConnectionState::Error);

        // A later quote recovers without a new attempt.
        assert!(matches!(m.on_frame(TICKER, Utc::now()), FrameOutcome::Quote(_)));
        assert_eq!(m.state(), ConnectionState::Live);
    }

    #[test]
    fn test_error_field_sets_error_state() {
        let mut m = opened();
        assert!(matches!(
            m.on_frame(r#"{"error":"EGeneral:Invalid arguments"}"#, Utc::now()),
            FrameOutcome::Failed(_)
        ));
        assert_eq!(m.state(), ConnectionState::Error);
    }

    #[test]
    fn test_garbage_and_non_positive_dropped() {
        let mut m = opened();
        assert!(matches!(m.on_frame("not json", Utc::now()), FrameOutcome::Dropped(_)));

        let zero_bid = TICKER.replace("\"1.0800\"", "\"0\"");
        assert!(matches!(
            m.on_frame(&zero_bid, Utc::now()),
            FrameOutcome::Dropped(QuoteError::NonPositive { .. })
        ));
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_close_after_data_is_disconnected() {
        let mut m = opened();
        m.on_frame(TICKER, Utc::now());
        assert_eq!(m.on_close(), AfterClose::Reconnect(Duration::from_millis(3000)));
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_close_without_data_is_error() {
        let mut m = opened();
        assert_eq!(m.on_close(), AfterClose::Reconnect(Duration::from_millis(3000)));
        assert_eq!(m.state(), ConnectionState::Error);

        // The next attempt starts fresh.
        assert!(m.begin_attempt());
        assert!(!m.has_data());
    }

    #[test]
    fn test_failed_connect_is_error() {
        let mut m = machine();
        m.begin_attempt();
        assert!(matches!(m.on_transport_error(), AfterClose::Reconnect(_)));
        assert_eq!(m.state(), ConnectionState::Error);
    }

    #[test]
    fn test_stop_prevents_reconnect() {
        let mut m = opened();
        m.on_frame(TICKER, Utc::now());
        m.on_stop();
        assert_eq!(m.state(), ConnectionState::Idle);
        assert_eq!(m.on_close(), AfterClose::Stop);
        assert!(!m.begin_attempt());
    }

    #[test]
    fn test_resubscribe_while_open() {
        let mut m = opened();
        let frames = m.resubscribe(Pair::from("EURC/EUR"));
        assert_eq!(
            frames,
            vec![
                MessageOut::unsubscribe_ticker(&Pair::from("USDC/EUR")),
                MessageOut::subscribe_ticker(&Pair::from("EURC/EUR")),
            ]
        );
        assert_eq!(m.pair().as_str(), "EURC/EUR");

        // Frames labelled with the old pair no longer count.
        assert!(matches!(
            m.on_frame(TICKER, Utc::now()),
            FrameOutcome::Dropped(QuoteError::ChannelMismatch { .. })
        ));
    }

    #[test]
    fn test_resubscribe_same_pair_or_closed() {
        let mut m = opened();
        assert!(m.resubscribe(Pair::from("USDC/EUR")).is_empty());

        let mut idle = machine();
        assert!(idle.resubscribe(Pair::from("EURC/EUR")).is_empty());
        idle.begin_attempt();
        assert_eq!(idle.on_open(), MessageOut::subscribe_ticker(&Pair::from("EURC/EUR")));
    }
}
