//! History fetches against a local HTTP responder and recorded envelopes.

#![cfg(feature = "http")]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use ratefeed::client::RateFeedClient;
use ratefeed::domain::history::normalize_rows;
use ratefeed::domain::history::wire::OhlcEnvelope;
use ratefeed::error::{FeedError, HttpError};
use ratefeed::http::RetryPolicy;
use ratefeed::shared::{Orientation, Pair, Timeframe};

/// Trimmed response from `GET /0/public/OHLC?pair=USDCEUR&interval=5`.
const OHLC_FIXTURE: &str = r#"{
    "error": [],
    "result": {
        "USDCEUR": [
            [1717200000, "0.9201", "0.9206", "0.9199", "0.9204", "0.9203", "15230.11", 41],
            [1717200300, "0.9204", "0.9209", "0.9202", "0.9208", "0.9205", "8412.90", 22],
            [1717200600, "0.9208", "0.9208", "0.9195", "0.9197", "0.9201", "20114.00", 57],
            [1717200900, "0.0000", "0.9200", "0.9190", "0.9195", "0.9196", "12.00", 1]
        ],
        "last": 1717200600
    }
}"#;

/// Serve exactly one request with `status` and `body`; returns the request head.
fn serve_once(listener: TcpListener, status: &'static str, body: String) -> JoinHandle<String> {
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        let n = socket.read(&mut buf).await.unwrap();
        let head = String::from_utf8_lossy(&buf[..n]).to_string();

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        head
    })
}

async fn client_for(listener: &TcpListener) -> RateFeedClient {
    RateFeedClient::builder()
        .api_url(&format!("http://{}", listener.local_addr().unwrap()))
        .retry(RetryPolicy::None)
        .history_cache_ttl(Duration::from_secs(60))
        .build()
        .unwrap()
}

#[test]
fn test_fixture_normalizes_and_drops_bad_row() {
    let envelope: OhlcEnvelope = serde_json::from_str(OHLC_FIXTURE).unwrap();
    let rows = envelope.into_rows("USDCEUR").unwrap();
    assert_eq!(rows.last, Some(1717200600));
    assert_eq!(rows.rows.len(), 4);

    let bars = normalize_rows(&rows.rows, Orientation::Direct);
    assert_eq!(bars.len(), 3);
    assert!(bars.iter().all(|b| b.is_consistent()));
    assert_eq!(bars[0].time, 1717200000);
    assert_eq!(bars[2].low, 0.9195);
}

#[test]
fn test_fixture_inverted_keeps_invariant() {
    let envelope: OhlcEnvelope = serde_json::from_str(OHLC_FIXTURE).unwrap();
    let rows = envelope.into_rows("USDCEUR").unwrap();
    let direct = normalize_rows(&rows.rows, Orientation::Direct);
    let inverted = normalize_rows(&rows.rows, Orientation::Inverted);

    for (d, i) in direct.iter().zip(&inverted) {
        assert!(i.is_consistent());
        assert!((i.high - 1.0 / d.low).abs() < 1e-12);
        assert!((i.low - 1.0 / d.high).abs() < 1e-12);
    }
}

#[test]
fn test_one_week_scenario_drops_malformed_row() {
    let rows: Vec<serde_json::Value> =
        serde_json::from_str(r#"[[1000, 1, 1.1, 0.9, 1.05], ["bad"]]"#).unwrap();
    let bars = normalize_rows(&rows, Orientation::Direct);
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].low, 0.9);
    assert_eq!(bars[0].high, 1.1);
}

#[tokio::test]
async fn test_fetch_requests_interval_and_since() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = client_for(&listener).await;
    let server = serve_once(listener, "200 OK", OHLC_FIXTURE.to_string());

    let bars = client
        .history()
        .fetch(&Pair::from("USDC/EUR"), Timeframe::Day1, Orientation::Direct)
        .await
        .unwrap();
    assert_eq!(bars.len(), 3);

    let head = server.await.unwrap();
    let request_line = head.lines().next().unwrap();
    assert!(
        request_line.starts_with("GET /0/public/OHLC?pair=USDCEUR&interval=5&since="),
        "unexpected request: {request_line}"
    );
}

#[tokio::test]
async fn test_cached_window_reoriented_without_refetch() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = client_for(&listener).await;
    let server = serve_once(listener, "200 OK", OHLC_FIXTURE.to_string());

    let direct = client
        .history()
        .fetch(&Pair::default(), Timeframe::Week1, Orientation::Direct)
        .await
        .unwrap();
    server.await.unwrap();

    // The responder is gone; only the cache can answer.
    let inverted = client
        .history()
        .fetch(&Pair::default(), Timeframe::Week1, Orientation::Inverted)
        .await
        .unwrap();
    assert_eq!(inverted.len(), direct.len());
    assert!((inverted[0].close - 1.0 / direct[0].close).abs() < 1e-12);
}

#[tokio::test]
async fn test_error_envelope_is_api_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = client_for(&listener).await;
    let server = serve_once(
        listener,
        "200 OK",
        r#"{"error":["EQuery:Unknown asset pair"]}"#.to_string(),
    );

    let err = client
        .history()
        .fetch(&Pair::default(), Timeframe::Hour1, Orientation::Direct)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::Http(HttpError::Api(ref m)) if m == "EQuery:Unknown asset pair"));
    server.await.unwrap();
}

#[tokio::test]
async fn test_all_rows_malformed_is_empty_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = client_for(&listener).await;
    let server = serve_once(
        listener,
        "200 OK",
        r#"{"error":[],"result":{"USDCEUR":[["bad"],[1,0,0,0,0]],"last":1}}"#.to_string(),
    );

    let err = client
        .history()
        .fetch(&Pair::default(), Timeframe::Hour1, Orientation::Direct)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::Http(HttpError::EmptyPayload(_))));
    server.await.unwrap();
}

#[tokio::test]
async fn test_server_error_surfaces_status() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let client = client_for(&listener).await;
    let server = serve_once(listener, "503 Service Unavailable", "busy".to_string());

    let err = client
        .history()
        .fetch(&Pair::default(), Timeframe::Month1, Orientation::Direct)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::Http(HttpError::ServerError { status: 503, .. })));
    server.await.unwrap();
}

/// Live venue check.
#[tokio::test]
#[ignore]
async fn test_live_kraken_ohlc() {
    let client = RateFeedClient::builder().build().unwrap();
    let bars = client
        .history()
        .fetch(client.pair(), Timeframe::Day1, Orientation::Direct)
        .await
        .unwrap();
    assert!(!bars.is_empty());
    assert!(bars.iter().all(|b| b.is_consistent()));
}
