// Shared trait + event stream for feed adapters

use thiserror::Error;

use crate::tape::health::TransportState;
use crate::tape::types::{BookChange, BookLevel, Ticker, Trade};

/// One decoded event off the feed, ready for synchronous dispatch.
#[derive(Debug)]
pub enum FeedEvent {
    Trade(Trade),
    Ticker(Ticker),
    BookSnapshot { bids: Vec<BookLevel>, asks: Vec<BookLevel> },
    BookUpdate { changes: Vec<BookChange> },
    Heartbeat,
    Status { message: String },
    // acknowledgment of the channel filter sent at connect time
    Subscriptions { channels: Vec<String> },
    // transport lifecycle, consumed by the health tracker
    Transport(TransportState),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed feed message: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait::async_trait]
pub trait FeedAdapter {
    // Runs until the receiving side goes away; sends events into the router.
    async fn run(&self, tx: tokio::sync::mpsc::Sender<FeedEvent>);
}

pub mod tape_feed;
pub mod tape_feed_types;
