// Adapter for the local tape bridge websocket.
//
// Connects, requests its channel filter, then forwards decoded events into
// the router until the stream drops. Reconnects forever on a fixed delay;
// malformed messages are counted and skipped, never fatal.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use super::tape_feed_types::{WsBookSnapshot, WsBookUpdate, WsEnvelope, WsStatus, WsSubscriptions};
use super::{FeedAdapter, FeedError, FeedEvent};
use crate::tape::health::TransportState;
use crate::tape::types::{BookChange, BookLevel};

pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws";
pub const DEFAULT_RECONNECT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct TapeFeedAdapter {
    pub ws_url: String,
    pub channels: Vec<String>,
    pub reconnect: Duration,
}

impl TapeFeedAdapter {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            channels: vec![
                "trades".into(),
                "ticker".into(),
                "orderbook".into(),
                "heartbeat".into(),
            ],
            reconnect: DEFAULT_RECONNECT,
        }
    }

    pub fn with_reconnect(mut self, reconnect: Duration) -> Self {
        self.reconnect = reconnect;
        self
    }

    // One connection's lifetime: subscribe, then pump messages until the
    // server closes or the socket errors.
    async fn stream(&self, ws: WsStream, tx: &mpsc::Sender<FeedEvent>) -> Result<(), FeedError> {
        let (mut write, mut read) = ws.split();

        let filter_req = serde_json::json!({
            "type": "subscribe",
            "channels": self.channels,
        });
        write.send(Message::Text(filter_req.to_string())).await?;
        debug!(channels = ?self.channels, "channel filter requested");

        while let Some(msg) = read.next().await {
            match msg? {
                Message::Text(text) => match decode_event(&text) {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            // router gone, nothing left to feed
                            return Ok(());
                        }
                    }
                    Ok(None) => {
                        metrics::counter!("livetape_unknown_events_total").increment(1);
                        debug!(raw = %text, "ignoring unrecognized feed message");
                    }
                    Err(e) => {
                        metrics::counter!("livetape_parse_errors_total").increment(1);
                        debug!(error = %e, raw = %text, "dropping malformed feed message");
                    }
                },
                Message::Close(frame) => {
                    info!(?frame, "feed closed the connection");
                    return Ok(());
                }
                other => trace!(?other, "non-text frame"),
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FeedAdapter for TapeFeedAdapter {
    async fn run(&self, tx: mpsc::Sender<FeedEvent>) {
        loop {
            match connect_async(&self.ws_url).await {
                Ok((ws, response)) => {
                    info!(url = %self.ws_url, status = %response.status(), "connected to tape feed");
                    if tx.send(FeedEvent::Transport(TransportState::Connected)).await.is_err() {
                        return;
                    }
                    let outcome = self.stream(ws, &tx).await;
                    let state = match outcome {
                        Ok(()) => TransportState::Disconnected,
                        Err(ref e) => {
                            warn!(error = %e, "feed stream failed");
                            TransportState::Errored
                        }
                    };
                    if tx.send(FeedEvent::Transport(state)).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(url = %self.ws_url, error = %e, "failed to connect to tape feed");
                    if tx.send(FeedEvent::Transport(TransportState::Errored)).await.is_err() {
                        return;
                    }
                }
            }

            // fixed delay, retry forever
            debug!(delay_secs = self.reconnect.as_secs(), "reconnecting after delay");
            tokio::time::sleep(self.reconnect).await;
        }
    }
}

/// Decode one wire message. `Ok(None)` means a structurally valid envelope
/// with a discriminant this consumer does not recognize.
pub fn decode_event(text: &str) -> Result<Option<FeedEvent>, serde_json::Error> {
    let envelope: WsEnvelope = serde_json::from_str(text)?;
    let event = match envelope.kind.as_str() {
        "trade" => Some(FeedEvent::Trade(serde_json::from_value(envelope.data)?)),
        "ticker" => Some(FeedEvent::Ticker(serde_json::from_value(envelope.data)?)),
        "orderbook_snapshot" => {
            let snap: WsBookSnapshot = serde_json::from_value(envelope.data)?;
            Some(FeedEvent::BookSnapshot {
                bids: snap.bids.into_iter().map(into_level).collect(),
                asks: snap.asks.into_iter().map(into_level).collect(),
            })
        }
        "orderbook_update" => {
            let update: WsBookUpdate = serde_json::from_value(envelope.data)?;
            Some(FeedEvent::BookUpdate {
                changes: update
                    .changes
                    .into_iter()
                    .map(|(side, price, size)| BookChange { side, price, size })
                    .collect(),
            })
        }
        "heartbeat" => Some(FeedEvent::Heartbeat),
        "status" => {
            let status: WsStatus = serde_json::from_value(envelope.data)?;
            Some(FeedEvent::Status { message: status.message.unwrap_or_default() })
        }
        "subscriptions" => {
            let ack: WsSubscriptions = serde_json::from_value(envelope.data)?;
            Some(FeedEvent::Subscriptions { channels: ack.channels })
        }
        _ => None,
    };
    Ok(event)
}

fn into_level((price, size): (f64, f64)) -> BookLevel {
    BookLevel { price, size }
}
