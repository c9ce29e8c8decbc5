//! Telemetry feed
//!
//! WebSocket client for the external telemetry producer. Every JSON frame
//! becomes a `telemetry.ingest`; losing the connection reports
//! connectivity `false` and the client reconnects after a fixed delay
//! until cancelled.

use std::time::Duration;

use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::core::config::FeedConfig;
use crate::core::error::Result;
use crate::runtime::RuntimeHandle;

/// Where decoded telemetry goes
pub trait TelemetrySink: Send + Sync + 'static {
    fn ingest(&self, sample: Value) -> Result<()>;

    fn set_connectivity(&self, connected: bool) -> Result<()>;
}

impl TelemetrySink for RuntimeHandle {
    fn ingest(&self, sample: Value) -> Result<()> {
        RuntimeHandle::ingest(self, sample)
    }

    fn set_connectivity(&self, connected: bool) -> Result<()> {
        RuntimeHandle::set_connectivity(self, connected)
    }
}

/// Decode one WebSocket frame into a telemetry sample
///
/// Text and binary frames must carry JSON; control frames and malformed
/// payloads yield `None`.
pub fn decode_frame(message: Message) -> Option<Value> {
    let decoded = match message {
        Message::Text(text) => serde_json::from_str(&text),
        Message::Binary(bytes) => serde_json::from_slice(&bytes),
        _ => return None,
    };
    match decoded {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Ignoring malformed telemetry frame: {}", e);
            None
        }
    }
}

/// Spawn the feed client; `None` when the feed is disabled
pub fn spawn_feed<S: TelemetrySink>(
    config: &FeedConfig,
    sink: S,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("Telemetry feed disabled");
        return None;
    }
    let url = config.url.clone();
    let delay = Duration::from_millis(config.reconnect_delay_ms);
    Some(tokio::spawn(run_feed(url, delay, sink, cancel)))
}

async fn run_feed<S: TelemetrySink>(
    url: String,
    reconnect_delay: Duration,
    sink: S,
    cancel: CancellationToken,
) {
    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connect_async(url.as_str()) => result,
        };

        match connected {
            Ok((mut frames, _)) => {
                tracing::info!("Connected to telemetry producer at {}", url);
                loop {
                    let frame = tokio::select! {
                        _ = cancel.cancelled() => return,
                        frame = frames.next() => frame,
                    };
                    match frame {
                        Some(Ok(message)) => {
                            let Some(sample) = decode_frame(message) else {
                                continue;
                            };
                            if sink.ingest(sample).is_err() {
                                tracing::debug!("Telemetry sink closed, stopping feed");
                                return;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!("Telemetry stream error: {}", e);
                            break;
                        }
                        None => break,
                    }
                }
                tracing::info!("Telemetry producer disconnected");
                if sink.set_connectivity(false).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!("Telemetry producer at {} unreachable: {}", url, e);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
    tracing::debug!("Telemetry feed stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    #[derive(Debug, PartialEq)]
    enum Seen {
        Sample(Value),
        Connectivity(bool),
    }

    struct RecordingSink(mpsc::UnboundedSender<Seen>);

    impl TelemetrySink for RecordingSink {
        fn ingest(&self, sample: Value) -> Result<()> {
            let _ = self.0.send(Seen::Sample(sample));
            Ok(())
        }

        fn set_connectivity(&self, connected: bool) -> Result<()> {
            let _ = self.0.send(Seen::Connectivity(connected));
            Ok(())
        }
    }

    #[test]
    fn test_decode_frame() {
        assert_eq!(
            decode_frame(Message::Text(r#"{"speed":201.5}"#.to_string())),
            Some(json!({ "speed": 201.5 }))
        );
        assert_eq!(
            decode_frame(Message::Binary(br#"[1,2]"#.to_vec())),
            Some(json!([1, 2]))
        );
        assert_eq!(decode_frame(Message::Text("not json".to_string())), None);
        assert_eq!(decode_frame(Message::Ping(Vec::new())), None);
        assert_eq!(decode_frame(Message::Close(None)), None);
    }

    #[test]
    fn test_disabled_feed_spawns_nothing() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let config = FeedConfig {
            enabled: false,
            ..FeedConfig::default()
        };
        assert!(spawn_feed(&config, RecordingSink(tx), CancellationToken::new()).is_none());
    }

    #[tokio::test]
    async fn test_forwards_frames_then_reports_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(Message::Text(r#"{"lap":1}"#.to_string())).await.unwrap();
            ws.send(Message::Text("garbage".to_string())).await.unwrap();
            ws.send(Message::Text(r#"{"lap":2}"#.to_string())).await.unwrap();
            let _ = ws.close(None).await;
            listener
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let config = FeedConfig {
            enabled: true,
            url: format!("ws://{}", address),
            reconnect_delay_ms: 50,
        };
        let feed = spawn_feed(&config, RecordingSink(tx), cancel.clone()).unwrap();

        let mut seen = Vec::new();
        while seen.len() < 3 {
            let next = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("feed event")
                .expect("sink open");
            seen.push(next);
        }
        assert_eq!(
            seen,
            vec![
                Seen::Sample(json!({ "lap": 1 })),
                Seen::Sample(json!({ "lap": 2 })),
                Seen::Connectivity(false),
            ]
        );

        // Keep the listener alive so the reconnect attempt hangs until cancelled
        let _listener = server.await.unwrap();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), feed)
            .await
            .expect("feed stops on cancel")
            .unwrap();
    }
}
